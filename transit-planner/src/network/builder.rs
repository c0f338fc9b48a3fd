//! Network construction.
//!
//! The builder only performs the structural normalisation the router relies
//! on: per-position sorting of discrete trips, frequency templates rebased
//! so the first departure is at offset 0, and stop-area footpaths. It does
//! not validate a feed.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{
    CalendarId, DiscreteTrip, FrequencyTrip, PatternIdx, Position, SECONDS_PER_DAY, StopIdx, Trip,
    TripIdx, ValidityPattern,
};

use super::{Network, Pattern, PatternPoint, TimedTrip, Transfer};

/// Errors raised while assembling a network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("unknown stop {0}")]
    UnknownStop(StopIdx),

    #[error("unknown pattern {0}")]
    UnknownPattern(PatternIdx),

    /// A pattern must visit at least one stop
    #[error("pattern has no stops")]
    EmptyPattern,

    /// Trip stop times don't line up with the pattern's stops
    #[error("{pattern} has {expected} stops but the trip has {found} stop times")]
    StopTimeCountMismatch {
        pattern: PatternIdx,
        expected: usize,
        found: usize,
    },

    #[error("frequency trip headway must be positive")]
    ZeroHeadway,
}

/// Incrementally assembles a [`Network`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use transit_planner::domain::{DiscreteTrip, StopTime, ValidityLevels, ValidityPattern};
/// use transit_planner::network::{Network, TransitData};
///
/// let epoch = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let mut builder = Network::builder(epoch);
/// let a = builder.add_stop("A");
/// let b = builder.add_stop("B");
/// let line = builder.add_pattern(vec![a, b]).unwrap();
/// builder
///     .add_discrete_trip(
///         line,
///         DiscreteTrip {
///             validity: ValidityLevels::uniform(ValidityPattern::days(0, 7)),
///             stop_times: vec![StopTime::at(8_000), StopTime::at(8_100)],
///             calendars: vec![],
///             properties: Default::default(),
///         },
///     )
///     .unwrap();
/// let network = builder.build();
///
/// assert_eq!(network.stop_count(), 2);
/// assert_eq!(network.patterns_at(b).len(), 1);
/// ```
#[derive(Debug)]
pub struct NetworkBuilder {
    epoch: NaiveDate,
    stop_names: Vec<String>,
    patterns: Vec<Vec<StopIdx>>,
    trips: Vec<Trip>,
    trip_patterns: Vec<PatternIdx>,
    transfers: HashMap<(StopIdx, StopIdx), u32>,
    calendars: HashMap<CalendarId, ValidityPattern>,
}

impl NetworkBuilder {
    pub fn new(epoch: NaiveDate) -> Self {
        Self {
            epoch,
            stop_names: Vec::new(),
            patterns: Vec::new(),
            trips: Vec::new(),
            trip_patterns: Vec::new(),
            transfers: HashMap::new(),
            calendars: HashMap::new(),
        }
    }

    /// Add a stop and return its index.
    pub fn add_stop(&mut self, name: impl Into<String>) -> StopIdx {
        self.stop_names.push(name.into());
        StopIdx(self.stop_names.len() - 1)
    }

    /// Link every pair of stops in an area with the area's minimum
    /// transfer duration, in both directions.
    pub fn add_stop_area(&mut self, stops: &[StopIdx], min_transfer_secs: u32) -> Result<(), NetworkError> {
        for &from in stops {
            for &to in stops {
                if from != to {
                    self.add_transfer(from, to, min_transfer_secs)?;
                }
            }
        }
        Ok(())
    }

    /// Add a one-way footpath. Repeated footpaths keep the shortest duration.
    pub fn add_transfer(&mut self, from: StopIdx, to: StopIdx, duration_secs: u32) -> Result<(), NetworkError> {
        self.check_stop(from)?;
        self.check_stop(to)?;
        if from == to {
            return Ok(());
        }
        self.transfers
            .entry((from, to))
            .and_modify(|d| *d = (*d).min(duration_secs))
            .or_insert(duration_secs);
        Ok(())
    }

    /// Register a named calendar.
    pub fn add_calendar(&mut self, id: CalendarId, days: ValidityPattern) {
        self.calendars.insert(id, days);
    }

    /// Add a pattern visiting `stops` in order.
    pub fn add_pattern(&mut self, stops: Vec<StopIdx>) -> Result<PatternIdx, NetworkError> {
        if stops.is_empty() {
            return Err(NetworkError::EmptyPattern);
        }
        for &stop in &stops {
            self.check_stop(stop)?;
        }
        self.patterns.push(stops);
        Ok(PatternIdx(self.patterns.len() - 1))
    }

    pub fn add_discrete_trip(&mut self, pattern: PatternIdx, trip: DiscreteTrip) -> Result<TripIdx, NetworkError> {
        self.check_stop_times(pattern, trip.stop_times.len())?;
        Ok(self.push_trip(pattern, Trip::Discrete(trip)))
    }

    /// Add a frequency trip.
    ///
    /// The template is rebased so the first stop departs at offset 0, and a
    /// window whose `end` precedes `start` is read as closing the next day.
    pub fn add_frequency_trip(&mut self, pattern: PatternIdx, mut trip: FrequencyTrip) -> Result<TripIdx, NetworkError> {
        self.check_stop_times(pattern, trip.stop_times.len())?;
        if trip.headway == 0 {
            return Err(NetworkError::ZeroHeadway);
        }

        let base = trip.stop_times[0].departure;
        for st in &mut trip.stop_times {
            st.arrival = st.arrival.saturating_sub(base);
            st.departure = st.departure.saturating_sub(base);
        }
        if trip.end < trip.start {
            trip.end += SECONDS_PER_DAY;
        }

        Ok(self.push_trip(pattern, Trip::Frequency(trip)))
    }

    /// Freeze the builder into an immutable network.
    pub fn build(self) -> Network {
        let stop_count = self.stop_names.len();

        let mut patterns: Vec<Pattern> = self
            .patterns
            .iter()
            .map(|stops| Pattern {
                stops: stops.clone(),
                departures: vec![Vec::new(); stops.len()],
                arrivals: vec![Vec::new(); stops.len()],
                frequency_trips: Vec::new(),
            })
            .collect();

        for (idx, (trip, pattern)) in self.trips.iter().zip(&self.trip_patterns).enumerate() {
            let trip_idx = TripIdx(idx);
            let pattern = &mut patterns[pattern.0];
            match trip {
                Trip::Discrete(t) => {
                    for (pos, st) in t.stop_times.iter().enumerate() {
                        pattern.departures[pos].push(TimedTrip {
                            time_of_day: st.departure % SECONDS_PER_DAY,
                            trip: trip_idx,
                        });
                        pattern.arrivals[pos].push(TimedTrip {
                            time_of_day: st.arrival % SECONDS_PER_DAY,
                            trip: trip_idx,
                        });
                    }
                }
                Trip::Frequency(_) => pattern.frequency_trips.push(trip_idx),
            }
        }

        for pattern in &mut patterns {
            pattern.departures.iter_mut().for_each(|list| list.sort_unstable());
            pattern.arrivals.iter_mut().for_each(|list| list.sort_unstable());
        }

        let mut patterns_at = vec![Vec::new(); stop_count];
        for (idx, pattern) in patterns.iter().enumerate() {
            for (pos, stop) in pattern.stops.iter().enumerate() {
                patterns_at[stop.0].push(PatternPoint {
                    pattern: PatternIdx(idx),
                    position: Position(pos),
                });
            }
        }

        let mut transfers = vec![Vec::new(); stop_count];
        let mut transfers_into = vec![Vec::new(); stop_count];
        for (&(from, to), &duration_secs) in &self.transfers {
            transfers[from.0].push(Transfer { to, duration_secs });
            transfers_into[to.0].push(Transfer { to: from, duration_secs });
        }
        for list in transfers.iter_mut().chain(&mut transfers_into) {
            list.sort_unstable_by_key(|t| (t.duration_secs, t.to));
        }

        debug!(
            stops = stop_count,
            patterns = patterns.len(),
            trips = self.trips.len(),
            transfers = self.transfers.len(),
            "Built network"
        );

        Network {
            epoch: self.epoch,
            stop_names: self.stop_names,
            patterns,
            trips: self.trips,
            patterns_at,
            transfers,
            transfers_into,
            calendars: self.calendars,
        }
    }

    fn push_trip(&mut self, pattern: PatternIdx, trip: Trip) -> TripIdx {
        debug_assert!(
            trip.stop_times()
                .windows(2)
                .all(|w| w[0].departure <= w[1].arrival),
            "stop times must not decrease along a trip"
        );
        self.trips.push(trip);
        self.trip_patterns.push(pattern);
        TripIdx(self.trips.len() - 1)
    }

    fn check_stop(&self, stop: StopIdx) -> Result<(), NetworkError> {
        if stop.0 < self.stop_names.len() {
            Ok(())
        } else {
            Err(NetworkError::UnknownStop(stop))
        }
    }

    fn check_stop_times(&self, pattern: PatternIdx, found: usize) -> Result<(), NetworkError> {
        let stops = self
            .patterns
            .get(pattern.0)
            .ok_or(NetworkError::UnknownPattern(pattern))?;
        if stops.len() != found {
            return Err(NetworkError::StopTimeCountMismatch {
                pattern,
                expected: stops.len(),
                found,
            });
        }
        Ok(())
    }
}
