//! Route queries and their validation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;

use crate::domain::{CalendarId, PatternIdx, RtLevel, SECONDS_PER_DAY, StopIdx, TimeCode};
use crate::network::TransitData;

use super::filter::{AllowAll, BoardingFilter};
use super::raptor::Direction;

/// Error from a route query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The departure instant can't be placed on the network's day axis
    #[error("invalid departure instant: {0}")]
    InvalidInstant(String),

    /// A stop index outside the network
    #[error("unknown stop {0}")]
    UnknownStop(StopIdx),

    /// Invalid route request
    #[error("invalid route request: {0}")]
    InvalidRequest(String),
}

/// A stop a journey may start or end at, and the walk between it and the
/// traveller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopAccess {
    pub stop: StopIdx,
    pub walk_secs: u32,
}

impl StopAccess {
    pub fn new(stop: StopIdx, walk_secs: u32) -> Self {
        Self { stop, walk_secs }
    }

    /// The stop itself, no walk.
    pub fn at(stop: StopIdx) -> Self {
        Self { stop, walk_secs: 0 }
    }
}

/// Per-query options.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Read the request time as the latest arrival instead of the earliest
    /// departure. Only the single-criterion scan runs backward.
    pub arrive_by: bool,

    /// Seconds since midnight of the request date, possibly past 86 400:
    /// the latest acceptable arrival, or the earliest acceptable departure
    /// for arrive-by queries.
    pub bound_secs: Option<u32>,

    /// Patterns the journey must not ride.
    pub forbidden_patterns: BTreeSet<PatternIdx>,

    /// Keep Pareto sets of labels instead of a single best arrival.
    pub multicriteria: bool,

    /// Stop the journey is rewarded for passing through. Implies
    /// multicriteria search.
    pub via: Option<StopIdx>,

    /// Overrides the configured round cap.
    pub max_rounds: Option<usize>,

    /// Wall-clock budget; checked between rounds.
    pub deadline: Option<Instant>,

    pub rt_level: RtLevel,

    /// Only use trips associated with this calendar, on its days.
    pub calendar: Option<CalendarId>,

    /// Applied to every candidate trip and stop time.
    pub filter: Arc<dyn BoardingFilter>,
}

impl RouteOptions {
    pub fn arrive_by(mut self) -> Self {
        self.arrive_by = true;
        self
    }

    pub fn with_bound(mut self, bound_secs: u32) -> Self {
        self.bound_secs = Some(bound_secs);
        self
    }

    pub fn forbid_pattern(mut self, pattern: PatternIdx) -> Self {
        self.forbidden_patterns.insert(pattern);
        self
    }

    pub fn multicriteria(mut self) -> Self {
        self.multicriteria = true;
        self
    }

    pub fn with_via(mut self, via: StopIdx) -> Self {
        self.via = Some(via);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_rt_level(mut self, level: RtLevel) -> Self {
        self.rt_level = level;
        self
    }

    pub fn with_calendar(mut self, calendar: CalendarId) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_filter(mut self, filter: impl BoardingFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Will this query run the multicriteria scanner?
    pub fn uses_multicriteria(&self) -> bool {
        self.multicriteria || self.via.is_some()
    }

    pub fn direction(&self) -> Direction {
        if self.arrive_by { Direction::Backward } else { Direction::Forward }
    }
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            arrive_by: false,
            bound_secs: None,
            forbidden_patterns: BTreeSet::new(),
            multicriteria: false,
            via: None,
            max_rounds: None,
            deadline: None,
            rt_level: RtLevel::Base,
            calendar: None,
            filter: Arc::new(AllowAll),
        }
    }
}

/// A journey-planning query.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origins: Vec<StopAccess>,
    pub destinations: Vec<StopAccess>,
    /// Service date of the request time.
    pub date: NaiveDate,
    /// Seconds since midnight of `date`: the departure, or the arrival for
    /// arrive-by queries.
    pub time_secs: u32,
    pub options: RouteOptions,
}

impl RouteRequest {
    /// Create a request between two stops with default options.
    pub fn new(origin: StopIdx, destination: StopIdx, date: NaiveDate, time_secs: u32) -> Self {
        Self::between(vec![StopAccess::at(origin)], vec![StopAccess::at(destination)], date, time_secs)
    }

    /// Create a request between sets of stops, each with its walk.
    pub fn between(origins: Vec<StopAccess>, destinations: Vec<StopAccess>, date: NaiveDate, time_secs: u32) -> Self {
        Self {
            origins,
            destinations,
            date,
            time_secs,
            options: RouteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the request against a network and resolve its time.
    ///
    /// # Errors
    ///
    /// - `InvalidInstant` if the date precedes the network epoch or the
    ///   time is not within the day
    /// - `UnknownStop` if an origin, destination or via stop is outside
    ///   the network
    /// - `InvalidRequest` for missing origins or destinations, a stop that
    ///   is both, an unknown calendar or pattern, a zero round cap, a bound
    ///   on the wrong side of the request time, or an arrive-by query that
    ///   asks for multicriteria search
    pub fn validate<D: TransitData + ?Sized>(&self, data: &D) -> Result<TimeCode, RouteError> {
        let days = self.date.signed_duration_since(data.epoch()).num_days();
        let day = u32::try_from(days).map_err(|_| {
            RouteError::InvalidInstant(format!("{} is before the network epoch {}", self.date, data.epoch()))
        })?;
        if self.time_secs >= SECONDS_PER_DAY {
            return Err(RouteError::InvalidInstant(format!(
                "{} seconds is not within a day",
                self.time_secs
            )));
        }

        if self.origins.is_empty() || self.destinations.is_empty() {
            return Err(RouteError::InvalidRequest(
                "at least one origin and one destination are required".to_string(),
            ));
        }
        let stops = self.origins.iter().chain(&self.destinations).map(|a| a.stop);
        for stop in stops.chain(self.options.via) {
            if stop.0 >= data.stop_count() {
                return Err(RouteError::UnknownStop(stop));
            }
        }
        if let Some(shared) = self
            .origins
            .iter()
            .find(|o| self.destinations.iter().any(|d| d.stop == o.stop))
        {
            return Err(RouteError::InvalidRequest(format!(
                "{} is both an origin and a destination",
                shared.stop
            )));
        }

        let options = &self.options;
        if options.max_rounds == Some(0) {
            return Err(RouteError::InvalidRequest("max_rounds must be positive".to_string()));
        }
        if let Some(calendar) = &options.calendar {
            if data.calendar(calendar).is_none() {
                return Err(RouteError::InvalidRequest(format!("unknown calendar {calendar}")));
            }
        }
        if let Some(pattern) = options.forbidden_patterns.iter().find(|p| p.0 >= data.pattern_count()) {
            return Err(RouteError::InvalidRequest(format!("unknown pattern {pattern}")));
        }
        if options.arrive_by && options.uses_multicriteria() {
            return Err(RouteError::InvalidRequest(
                "arrive-by queries use single-criterion search".to_string(),
            ));
        }

        let instant = TimeCode::new(day, self.time_secs);
        if let Some(bound) = self.bound(instant) {
            let wrong_side = match options.direction() {
                Direction::Forward => bound < instant,
                Direction::Backward => bound > instant,
            };
            if wrong_side {
                return Err(RouteError::InvalidRequest(format!(
                    "bound {bound} is on the wrong side of {instant}"
                )));
            }
        }

        Ok(instant)
    }

    /// The bound as an instant, for a request resolved to `instant`.
    pub fn bound(&self, instant: TimeCode) -> Option<TimeCode> {
        let secs = self.options.bound_secs?;
        TimeCode::new(instant.day(), 0).checked_add_seconds(secs)
    }
}
