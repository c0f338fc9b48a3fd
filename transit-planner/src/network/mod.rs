//! Read-only transit network snapshot.
//!
//! The routing engine reads timetable data through the [`TransitData`]
//! trait. [`Network`] is the in-memory implementation, assembled with
//! [`NetworkBuilder`] and shared immutably between concurrent queries.

mod builder;

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{CalendarId, PatternIdx, Position, StopIdx, Trip, TripIdx, ValidityPattern};

pub use builder::{NetworkBuilder, NetworkError};

/// A footpath from one stop to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transfer {
    pub to: StopIdx,
    pub duration_secs: u32,
}

/// A discrete trip's visit at one pattern position, keyed by time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimedTrip {
    /// Offset modulo one day.
    pub time_of_day: u32,
    pub trip: TripIdx,
}

/// Where a pattern serves a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternPoint {
    pub pattern: PatternIdx,
    pub position: Position,
}

/// An ordered stop sequence shared by trips.
///
/// Discrete trips are indexed per position, sorted by departure and
/// separately by arrival time of day (ties broken by trip index).
#[derive(Debug, Clone)]
pub struct Pattern {
    stops: Vec<StopIdx>,
    departures: Vec<Vec<TimedTrip>>,
    arrivals: Vec<Vec<TimedTrip>>,
    frequency_trips: Vec<TripIdx>,
}

impl Pattern {
    /// Returns the stop sequence.
    pub fn stops(&self) -> &[StopIdx] {
        &self.stops
    }

    /// Number of stops on the pattern.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Always false: patterns have at least one stop.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stop_at(&self, position: Position) -> StopIdx {
        self.stops[position.0]
    }

    /// Is `position` the pattern's last stop?
    pub fn is_last(&self, position: Position) -> bool {
        position.0 + 1 >= self.stops.len()
    }

    /// Discrete trips at `position`, sorted by departure time of day.
    pub fn departures_at(&self, position: Position) -> &[TimedTrip] {
        &self.departures[position.0]
    }

    /// Discrete trips at `position`, sorted by arrival time of day.
    pub fn arrivals_at(&self, position: Position) -> &[TimedTrip] {
        &self.arrivals[position.0]
    }

    pub fn frequency_trips(&self) -> &[TripIdx] {
        &self.frequency_trips
    }

    /// Every trip running this pattern.
    pub fn trips(&self) -> impl Iterator<Item = TripIdx> + '_ {
        self.departures
            .first()
            .into_iter()
            .flatten()
            .map(|t| t.trip)
            .chain(self.frequency_trips.iter().copied())
    }
}

/// Read access to a transit network snapshot.
///
/// Implementations must be immutable for the duration of a query and
/// shareable across threads.
pub trait TransitData: Send + Sync {
    /// Date of service day 0.
    fn epoch(&self) -> NaiveDate;

    fn stop_count(&self) -> usize;

    fn pattern_count(&self) -> usize;

    fn pattern(&self, idx: PatternIdx) -> &Pattern;

    fn trip(&self, idx: TripIdx) -> &Trip;

    /// Patterns serving `stop`, with the position at which they serve it.
    fn patterns_at(&self, stop: StopIdx) -> &[PatternPoint];

    /// Footpaths leaving `stop`.
    fn transfers_from(&self, stop: StopIdx) -> &[Transfer];

    /// Footpaths reaching `stop`, reversed: each `to` is the stop the walk
    /// leaves from.
    fn transfers_into(&self, stop: StopIdx) -> &[Transfer];

    /// Validity of a named calendar.
    fn calendar(&self, id: &CalendarId) -> Option<&ValidityPattern>;
}

/// In-memory transit network.
#[derive(Debug, Clone)]
pub struct Network {
    epoch: NaiveDate,
    stop_names: Vec<String>,
    patterns: Vec<Pattern>,
    trips: Vec<Trip>,
    patterns_at: Vec<Vec<PatternPoint>>,
    transfers: Vec<Vec<Transfer>>,
    transfers_into: Vec<Vec<Transfer>>,
    calendars: HashMap<CalendarId, ValidityPattern>,
}

impl Network {
    /// Start building a network whose day 0 is `epoch`.
    pub fn builder(epoch: NaiveDate) -> NetworkBuilder {
        NetworkBuilder::new(epoch)
    }

    pub fn stop_name(&self, stop: StopIdx) -> Option<&str> {
        self.stop_names.get(stop.0).map(String::as_str)
    }

    /// Find a stop by its name.
    pub fn stop_by_name(&self, name: &str) -> Option<StopIdx> {
        self.stop_names.iter().position(|n| n == name).map(StopIdx)
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }
}

impl TransitData for Network {
    fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    fn stop_count(&self) -> usize {
        self.stop_names.len()
    }

    fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    fn pattern(&self, idx: PatternIdx) -> &Pattern {
        &self.patterns[idx.0]
    }

    fn trip(&self, idx: TripIdx) -> &Trip {
        &self.trips[idx.0]
    }

    fn patterns_at(&self, stop: StopIdx) -> &[PatternPoint] {
        self.patterns_at.get(stop.0).map_or(&[], Vec::as_slice)
    }

    fn transfers_from(&self, stop: StopIdx) -> &[Transfer] {
        self.transfers.get(stop.0).map_or(&[], Vec::as_slice)
    }

    fn transfers_into(&self, stop: StopIdx) -> &[Transfer] {
        self.transfers_into.get(stop.0).map_or(&[], Vec::as_slice)
    }

    fn calendar(&self, id: &CalendarId) -> Option<&ValidityPattern> {
        self.calendars.get(id)
    }
}
