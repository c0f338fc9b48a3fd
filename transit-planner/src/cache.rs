//! Day timeline cache for trip lookups.
//!
//! A day timeline lists, for every position of a pattern, each vehicle run
//! serving that position on one calendar day, sorted by time. Frequency
//! trips are expanded into their individual instances. Timelines depend on
//! the realtime level and calendar restriction but not on the boarding
//! filter or the pick-up/drop-off flags, which are checked while scanning.
//!
//! A cache belongs to one network snapshot. On a miss the caller builds the
//! timeline itself and inserts it, so a query never waits on another.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache as MokaCache;
use serde::Deserialize;
use tracing::trace;

use crate::domain::{
    CalendarId, PatternIdx, Position, RtLevel, SECONDS_PER_DAY, TimeCode, Trip, TripRun, service_day_for,
};
use crate::network::TransitData;
use crate::planner::{Boarding, LookupContext, TripTimeLookup};

/// Cache key: (pattern, calendar day, realtime level, calendar restriction).
type TimelineKey = (PatternIdx, u32, RtLevel, Option<CalendarId>);

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a timeline may stay unused before eviction.
    pub time_to_idle_secs: u64,

    /// Maximum number of cached timelines.
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn time_to_idle(&self) -> Duration {
        Duration::from_secs(self.time_to_idle_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            time_to_idle_secs: 600,
            max_capacity: 10_000,
        }
    }
}

/// A vehicle serving a pattern position at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub time: TimeCode,
    pub run: TripRun,
}

/// Every run serving each position of one pattern on one calendar day.
///
/// Departures are ordered by time with discrete trips first on ties;
/// arrivals are ordered so that scanning them backward also meets discrete
/// trips first.
#[derive(Debug, Clone, Default)]
pub struct DayTimeline {
    departures: Vec<Vec<TimelineEntry>>,
    arrivals: Vec<Vec<TimelineEntry>>,
}

impl DayTimeline {
    /// Build the timeline of `pattern` on calendar `day`.
    pub fn build<D: TransitData + ?Sized>(data: &D, ctx: &LookupContext<'_>, pattern: PatternIdx, day: u32) -> Self {
        let pat = data.pattern(pattern);
        let mut departures = Vec::with_capacity(pat.len());
        let mut arrivals = Vec::with_capacity(pat.len());

        for pos in 0..pat.len() {
            let position = Position(pos);
            let mut deps = Vec::new();
            let mut arrs = Vec::new();

            for timed in pat.departures_at(position) {
                let trip = data.trip(timed.trip);
                let offset = trip.stop_times()[pos].departure;
                if let Some(sd) = service_day_for(day, offset).filter(|&sd| ctx.runs(trip, sd)) {
                    deps.push(TimelineEntry {
                        time: TimeCode::new(day, timed.time_of_day),
                        run: TripRun::discrete(timed.trip, sd),
                    });
                }
            }
            for timed in pat.arrivals_at(position) {
                let trip = data.trip(timed.trip);
                let offset = trip.stop_times()[pos].arrival;
                if let Some(sd) = service_day_for(day, offset).filter(|&sd| ctx.runs(trip, sd)) {
                    arrs.push(TimelineEntry {
                        time: TimeCode::new(day, timed.time_of_day),
                        run: TripRun::discrete(timed.trip, sd),
                    });
                }
            }

            for &idx in pat.frequency_trips() {
                let trip = data.trip(idx);
                let Trip::Frequency(freq) = trip else {
                    continue;
                };
                let st = &freq.stop_times[pos];
                for (offset, out) in [(st.departure, &mut deps), (st.arrival, &mut arrs)] {
                    let (open, close) = freq.window(offset);
                    for sd in day.saturating_sub(freq.span_days(offset))..=day {
                        if !ctx.runs(trip, sd) {
                            continue;
                        }
                        for secs in instances_on_day(day, sd, open, close, freq.headway) {
                            out.push(TimelineEntry {
                                time: TimeCode::new(sd, secs),
                                run: TripRun::frequency(idx, sd, freq.shift_for(secs, offset)),
                            });
                        }
                    }
                }
            }

            deps.sort_by_key(|e| (e.time, is_frequency(data, e.run), e.run));
            arrs.sort_by_key(|e| (e.time, !is_frequency(data, e.run), e.run));
            departures.push(deps);
            arrivals.push(arrs);
        }

        Self { departures, arrivals }
    }

    pub fn departures_at(&self, position: Position) -> &[TimelineEntry] {
        &self.departures[position.0]
    }

    pub fn arrivals_at(&self, position: Position) -> &[TimelineEntry] {
        &self.arrivals[position.0]
    }
}

fn is_frequency<D: TransitData + ?Sized>(data: &D, run: TripRun) -> bool {
    data.trip(run.trip).is_frequency()
}

/// Offsets past `service_day`'s midnight of the grid `[lower, upper]`
/// (clamped to `upper`) that fall on calendar `day`.
fn instances_on_day(day: u32, service_day: u32, lower: u32, upper: u32, headway: u32) -> impl Iterator<Item = u32> {
    let day_start = (day - service_day) * SECONDS_PER_DAY;
    let day_end = day_start + SECONDS_PER_DAY;
    let first_step = day_start.saturating_sub(lower).div_ceil(headway);
    let on_grid = (first_step..)
        .map(move |k| lower + k * headway)
        .take_while(move |&secs| secs <= upper && secs < day_end);
    let tail = ((upper - lower) % headway != 0 && (day_start..day_end).contains(&upper)).then_some(upper);
    on_grid.chain(tail)
}

/// Read-through cache of [`DayTimeline`]s.
pub struct DayTimelineCache {
    timelines: MokaCache<TimelineKey, Arc<DayTimeline>>,
}

impl DayTimelineCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let timelines = MokaCache::builder()
            .time_to_idle(config.time_to_idle())
            .max_capacity(config.max_capacity)
            .build();
        Self { timelines }
    }

    /// Fetch a timeline, building and inserting it on a miss.
    pub fn timeline<D: TransitData + ?Sized>(
        &self,
        data: &D,
        ctx: &LookupContext<'_>,
        pattern: PatternIdx,
        day: u32,
    ) -> Arc<DayTimeline> {
        let key = (pattern, day, ctx.level, ctx.calendar.map(|(id, _)| id.clone()));
        if let Some(hit) = self.timelines.get(&key) {
            return hit;
        }
        let built = Arc::new(DayTimeline::build(data, ctx, pattern, day));
        trace!(%pattern, day, "Cached day timeline");
        self.timelines.insert(key, Arc::clone(&built));
        built
    }

    pub(crate) fn earliest<D: TransitData + ?Sized>(
        &self,
        lookup: &TripTimeLookup<'_, D>,
        pattern: PatternIdx,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let data = lookup.data();
        let ctx = lookup.context();
        let last = instant.day().saturating_add(ctx.lookahead_days);

        for day in instant.day()..=last {
            let timeline = self.timeline(data, ctx, pattern, day);
            let entries = timeline.departures_at(position);
            let start = entries.partition_point(|e| e.time < instant);
            let found = entries[start..].iter().find(|e| {
                let trip = data.trip(e.run.trip);
                ctx.usable(trip, &trip.stop_times()[position.0], need_board, need_alight)
            });
            if let Some(e) = found {
                return Some(Boarding {
                    run: e.run,
                    time: e.time,
                });
            }
        }
        None
    }

    pub(crate) fn tardiest<D: TransitData + ?Sized>(
        &self,
        lookup: &TripTimeLookup<'_, D>,
        pattern: PatternIdx,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let data = lookup.data();
        let ctx = lookup.context();
        let first = instant.day().saturating_sub(ctx.lookahead_days);

        for day in (first..=instant.day()).rev() {
            let timeline = self.timeline(data, ctx, pattern, day);
            let entries = timeline.arrivals_at(position);
            let end = entries.partition_point(|e| e.time <= instant);
            let found = entries[..end].iter().rev().find(|e| {
                let trip = data.trip(e.run.trip);
                ctx.usable(trip, &trip.stop_times()[position.0], need_board, need_alight)
            });
            if let Some(e) = found {
                return Some(Boarding {
                    run: e.run,
                    time: e.time,
                });
            }
        }
        None
    }

    /// Get cache statistics (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.timelines.entry_count()
    }

    /// Invalidate all cached timelines, e.g. after swapping the network.
    pub fn invalidate_all(&self) {
        self.timelines.invalidate_all();
    }
}

impl Default for DayTimelineCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{DiscreteTrip, FrequencyTrip, StopTime, ValidityLevels, ValidityPattern, VehicleProperties};
    use crate::network::Network;
    use crate::planner::AllowAll;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn network(departures: &[(u32, u32)], freqs: &[(u32, u32, u32, u32)]) -> Network {
        let mut b = Network::builder(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let s: Vec<_> = (0..3).map(|i| b.add_stop(format!("S{i}"))).collect();
        let p = b.add_pattern(s).unwrap();
        for &(dep, day) in departures {
            b.add_discrete_trip(
                p,
                DiscreteTrip {
                    validity: ValidityLevels::uniform(ValidityPattern::from_days([day, day + 1])),
                    stop_times: vec![StopTime::at(dep), StopTime::at(dep + 400), StopTime::at(dep + 900)],
                    calendars: vec![],
                    properties: VehicleProperties::default(),
                },
            )
            .unwrap();
        }
        for &(start, len, headway, day) in freqs {
            b.add_frequency_trip(
                p,
                FrequencyTrip {
                    start,
                    end: start + len,
                    headway,
                    validity: ValidityLevels::uniform(ValidityPattern::from_days([day])),
                    stop_times: vec![StopTime::at(0), StopTime::at(400), StopTime::at(900)],
                    calendars: vec![],
                    properties: VehicleProperties::default(),
                },
            )
            .unwrap();
        }
        b.build()
    }

    fn ctx() -> LookupContext<'static> {
        LookupContext {
            level: RtLevel::Base,
            calendar: None,
            filter: &AllowAll,
            lookahead_days: 2,
        }
    }

    proptest! {
        /// Serving lookups from day timelines never changes their result
        #[test]
        fn cached_equals_direct(
            departures in prop::collection::vec((0u32..130_000, 0u32..3), 0..6),
            freqs in prop::collection::vec((0u32..90_000, 0u32..40_000, 1u32..4_000, 0u32..3), 0..3),
            t in 0u64..(5 * 86_400),
            pos in 0usize..3,
        ) {
            let net = network(&departures, &freqs);
            let cache = DayTimelineCache::default();
            let direct = TripTimeLookup::new(&net, ctx());
            let cached = TripTimeLookup::new(&net, ctx()).with_cache(&cache);
            let t = TimeCode::from_total_seconds(t);
            let p = PatternIdx(0);
            prop_assert_eq!(
                direct.earliest(p, Position(pos), t, false, false),
                cached.earliest(p, Position(pos), t, false, false)
            );
            prop_assert_eq!(
                direct.tardiest(p, Position(pos), t, false, false),
                cached.tardiest(p, Position(pos), t, false, false)
            );
        }
    }
}
