//! Earliest/tardiest trip lookup at a pattern stop.
//!
//! Given a pattern position and an instant, find the next vehicle departing
//! (or the last vehicle arriving) there among discrete trips and
//! frequency-generated instances. Misses return `None`: a pattern that
//! offers nothing from a stop at a given time is a routine outcome.
//!
//! Discrete trips are indexed by time of day, so a visit with offset
//! `o >= 86 400` belongs to the run of service day `day - o / 86 400`. A
//! search scans the requested day from the requested second, then whole
//! following (or preceding) days, up to `lookahead_days`.
//!
//! A frequency window `[start, end]` counts both bounds as departures: the
//! grid `start + k * headway` is clamped to `end`.

use tracing::trace;

use crate::cache::DayTimelineCache;
use crate::domain::{
    CalendarId, PatternIdx, Position, RtLevel, SECONDS_PER_DAY, StopTime, TimeCode, Trip, TripRun,
    ValidityPattern, service_day_for,
};
use crate::network::{Pattern, TransitData};

use super::filter::BoardingFilter;

const DAY: u64 = SECONDS_PER_DAY as u64;

/// A vehicle found by a lookup: the run and the instant it serves the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boarding {
    pub run: TripRun,
    pub time: TimeCode,
}

/// Per-query selection of which trips may be used.
#[derive(Clone, Copy)]
pub struct LookupContext<'q> {
    pub level: RtLevel,
    /// Calendar restriction, resolved against the network.
    pub calendar: Option<(&'q CalendarId, &'q ValidityPattern)>,
    pub filter: &'q dyn BoardingFilter,
    pub lookahead_days: u32,
}

impl LookupContext<'_> {
    /// Does `trip` operate on `service_day` under this selection?
    ///
    /// Flags and the boarding filter are checked separately.
    pub fn runs(&self, trip: &Trip, service_day: u32) -> bool {
        if !trip.runs_on(self.level, service_day) {
            return false;
        }
        match self.calendar {
            None => true,
            Some((id, days)) => trip.calendars().contains(id) && days.check(service_day),
        }
    }

    /// Is `stop_time` usable for the requested boarding/alighting?
    pub fn usable(&self, trip: &Trip, stop_time: &StopTime, need_board: bool, need_alight: bool) -> bool {
        stop_time.allows(need_board, need_alight) && self.filter.allows(trip, stop_time)
    }
}

/// Finds trips at pattern stops for one query.
pub struct TripTimeLookup<'a, D: TransitData + ?Sized> {
    data: &'a D,
    ctx: LookupContext<'a>,
    cache: Option<&'a DayTimelineCache>,
}

impl<'a, D: TransitData + ?Sized> TripTimeLookup<'a, D> {
    pub fn new(data: &'a D, ctx: LookupContext<'a>) -> Self {
        Self { data, ctx, cache: None }
    }

    /// Serve lookups through a day-timeline cache built for `data`.
    pub fn with_cache(mut self, cache: &'a DayTimelineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn data(&self) -> &'a D {
        self.data
    }

    pub fn context(&self) -> &LookupContext<'a> {
        &self.ctx
    }

    /// Earliest vehicle departing `position` of `pattern` at or after
    /// `instant`. The pattern's last stop yields `None`.
    pub fn earliest(
        &self,
        pattern: PatternIdx,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let pat = self.data.pattern(pattern);
        if pat.is_last(position) {
            return None;
        }

        let found = match self.cache {
            Some(cache) => cache.earliest(self, pattern, position, instant, need_board, need_alight),
            None => {
                let discrete = self.earliest_discrete(pat, position, instant, need_board, need_alight);
                let frequency = self.earliest_frequency(pat, position, instant, need_board, need_alight);
                match (discrete, frequency) {
                    (Some(d), Some(f)) if f.time < d.time => Some(f),
                    (Some(d), _) => Some(d),
                    (None, f) => f,
                }
            }
        };

        trace!(%pattern, %position, %instant, found = ?found.map(|b| b.time), "earliest");
        found
    }

    /// Latest vehicle arriving at `position` of `pattern` at or before
    /// `instant`. The pattern's first stop yields `None`.
    pub fn tardiest(
        &self,
        pattern: PatternIdx,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        if position.0 == 0 {
            return None;
        }
        let pat = self.data.pattern(pattern);

        let found = match self.cache {
            Some(cache) => cache.tardiest(self, pattern, position, instant, need_board, need_alight),
            None => {
                let discrete = self.tardiest_discrete(pat, position, instant, need_board, need_alight);
                let frequency = self.tardiest_frequency(pat, position, instant, need_board, need_alight);
                match (discrete, frequency) {
                    (Some(d), Some(f)) if f.time > d.time => Some(f),
                    (Some(d), _) => Some(d),
                    (None, f) => f,
                }
            }
        };

        trace!(%pattern, %position, %instant, found = ?found.map(|b| b.time), "tardiest");
        found
    }

    fn earliest_discrete(
        &self,
        pattern: &Pattern,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let list = pattern.departures_at(position);
        debug_assert!(list.is_sorted(), "departures must be sorted by time of day");

        let mut day = instant.day();
        let mut from = instant.seconds();
        for _ in 0..=self.ctx.lookahead_days {
            let start = list.partition_point(|t| t.time_of_day < from);
            for timed in &list[start..] {
                let trip = self.data.trip(timed.trip);
                let st = &trip.stop_times()[position.0];
                let Some(service_day) = service_day_for(day, st.departure) else {
                    continue;
                };
                if self.ctx.runs(trip, service_day) && self.ctx.usable(trip, st, need_board, need_alight) {
                    return Some(Boarding {
                        run: TripRun::discrete(timed.trip, service_day),
                        time: TimeCode::new(day, timed.time_of_day),
                    });
                }
            }
            day = day.checked_add(1)?;
            from = 0;
        }
        None
    }

    fn tardiest_discrete(
        &self,
        pattern: &Pattern,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let list = pattern.arrivals_at(position);
        debug_assert!(list.is_sorted(), "arrivals must be sorted by time of day");

        let mut day = instant.day();
        let mut until = instant.seconds();
        for _ in 0..=self.ctx.lookahead_days {
            let end = list.partition_point(|t| t.time_of_day <= until);
            for timed in list[..end].iter().rev() {
                let trip = self.data.trip(timed.trip);
                let st = &trip.stop_times()[position.0];
                let Some(service_day) = service_day_for(day, st.arrival) else {
                    continue;
                };
                if self.ctx.runs(trip, service_day) && self.ctx.usable(trip, st, need_board, need_alight) {
                    return Some(Boarding {
                        run: TripRun::discrete(timed.trip, service_day),
                        time: TimeCode::new(day, timed.time_of_day),
                    });
                }
            }
            day = day.checked_sub(1)?;
            until = SECONDS_PER_DAY - 1;
        }
        None
    }

    fn earliest_frequency(
        &self,
        pattern: &Pattern,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let t = instant.total_seconds();
        let horizon = (u64::from(instant.day()) + u64::from(self.ctx.lookahead_days) + 1) * DAY;
        let mut best: Option<(u64, TripRun)> = None;

        for &idx in pattern.frequency_trips() {
            let trip = self.data.trip(idx);
            let Trip::Frequency(freq) = trip else {
                continue;
            };
            let st = &freq.stop_times[position.0];
            if !self.ctx.usable(trip, st, need_board, need_alight) {
                continue;
            }
            let offset = st.departure;
            let (open, close) = freq.window(offset);
            let first = instant.day().saturating_sub(freq.span_days(offset));
            let last = instant.day().saturating_add(self.ctx.lookahead_days);

            for service_day in first..=last {
                let base = u64::from(service_day) * DAY;
                let lower = base + u64::from(open);
                if best.is_some_and(|(b, _)| lower >= b) {
                    break;
                }
                if !self.ctx.runs(trip, service_day) {
                    continue;
                }
                let Some(candidate) = next_on_grid(t, lower, base + u64::from(close), freq.headway) else {
                    continue;
                };
                if candidate >= horizon {
                    continue;
                }
                if best.is_none_or(|(b, _)| candidate < b) {
                    let shift = freq.shift_for((candidate - base) as u32, offset);
                    best = Some((candidate, TripRun::frequency(idx, service_day, shift)));
                }
            }
        }

        best.map(|(secs, run)| Boarding {
            run,
            time: TimeCode::from_total_seconds(secs),
        })
    }

    fn tardiest_frequency(
        &self,
        pattern: &Pattern,
        position: Position,
        instant: TimeCode,
        need_board: bool,
        need_alight: bool,
    ) -> Option<Boarding> {
        let t = instant.total_seconds();
        let horizon = u64::from(instant.day().saturating_sub(self.ctx.lookahead_days)) * DAY;
        let mut best: Option<(u64, TripRun)> = None;

        for &idx in pattern.frequency_trips().iter().rev() {
            let trip = self.data.trip(idx);
            let Trip::Frequency(freq) = trip else {
                continue;
            };
            let st = &freq.stop_times[position.0];
            if !self.ctx.usable(trip, st, need_board, need_alight) {
                continue;
            }
            let offset = st.arrival;
            let (open, close) = freq.window(offset);
            let first = instant
                .day()
                .saturating_sub(self.ctx.lookahead_days.saturating_add(freq.span_days(offset)));

            for service_day in (first..=instant.day()).rev() {
                let base = u64::from(service_day) * DAY;
                let upper = base + u64::from(close);
                if best.is_some_and(|(b, _)| upper <= b) {
                    break;
                }
                if !self.ctx.runs(trip, service_day) {
                    continue;
                }
                let Some(candidate) = prev_on_grid(t, base + u64::from(open), upper, freq.headway) else {
                    continue;
                };
                if candidate < horizon {
                    continue;
                }
                if best.is_none_or(|(b, _)| candidate > b) {
                    let shift = freq.shift_for((candidate - base) as u32, offset);
                    best = Some((candidate, TripRun::frequency(idx, service_day, shift)));
                }
            }
        }

        best.map(|(secs, run)| Boarding {
            run,
            time: TimeCode::from_total_seconds(secs),
        })
    }
}

/// First grid point of `[lower, upper]` at or after `t`, the grid being
/// `lower + k * headway` clamped to `upper`.
///
/// ```text
/// lower=6000 upper=7000 headway=300
///   t=6001 -> 6300    t=7000 -> 7000    t=7001 -> none
/// ```
pub(crate) fn next_on_grid(t: u64, lower: u64, upper: u64, headway: u32) -> Option<u64> {
    if t > upper {
        return None;
    }
    if t <= lower {
        return Some(lower);
    }
    let h = u64::from(headway);
    let steps = (t - lower).div_ceil(h);
    Some((lower + steps * h).min(upper))
}

/// Last grid point of `[lower, upper]` at or before `t`.
pub(crate) fn prev_on_grid(t: u64, lower: u64, upper: u64, headway: u32) -> Option<u64> {
    if t < lower {
        return None;
    }
    if t >= upper {
        return Some(upper);
    }
    let h = u64::from(headway);
    Some(lower + (t - lower) / h * h)
}
