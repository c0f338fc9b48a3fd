//! Ride leg type.
//!
//! A `Leg` is a single vehicle ride from boarding to alighting, with every
//! stop it passes in between.

use super::{DomainError, PatternIdx, Position, StopIdx, TimeCode, TripRun};

/// A vehicle calling at a stop.
///
/// `time` is the departure for the boarding event and the arrival for every
/// other event of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopEvent {
    pub stop: StopIdx,
    pub position: Position,
    pub time: TimeCode,
}

impl StopEvent {
    pub fn new(stop: StopIdx, position: Position, time: TimeCode) -> Self {
        Self {
            stop,
            position,
            time,
        }
    }
}

/// A leg of a journey (one vehicle).
///
/// # Invariants
///
/// - At least two events: boarding and alighting
/// - Positions strictly increase along the pattern
/// - Times never decrease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pattern: PatternIdx,
    run: TripRun,
    events: Vec<StopEvent>,
}

impl Leg {
    /// Construct a leg from its stop events in travel order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if there are fewer than two events, or if positions
    /// do not strictly increase, or if time runs backward.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::{Leg, PatternIdx, Position, StopEvent, StopIdx, TimeCode, TripIdx, TripRun};
    ///
    /// let run = TripRun::discrete(TripIdx(0), 0);
    /// let leg = Leg::new(
    ///     PatternIdx(0),
    ///     run,
    ///     vec![
    ///         StopEvent::new(StopIdx(0), Position(0), TimeCode::new(0, 8_000)),
    ///         StopEvent::new(StopIdx(1), Position(1), TimeCode::new(0, 8_100)),
    ///         StopEvent::new(StopIdx(2), Position(2), TimeCode::new(0, 8_200)),
    ///     ],
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(leg.board_stop(), StopIdx(0));
    /// assert_eq!(leg.alight_stop(), StopIdx(2));
    /// assert_eq!(leg.intermediate_stops().len(), 1);
    /// assert_eq!(leg.duration_secs(), 200);
    /// ```
    pub fn new(pattern: PatternIdx, run: TripRun, events: Vec<StopEvent>) -> Result<Self, DomainError> {
        if events.len() < 2 {
            return Err(DomainError::InvalidLeg("a leg needs a boarding and an alighting stop"));
        }

        for pair in events.windows(2) {
            if pair[1].position <= pair[0].position {
                return Err(DomainError::InvalidLeg("alight position must be after board position"));
            }
            if pair[1].time < pair[0].time {
                return Err(DomainError::InvalidLeg("stop times must not decrease"));
            }
        }

        Ok(Leg {
            pattern,
            run,
            events,
        })
    }

    pub fn pattern(&self) -> PatternIdx {
        self.pattern
    }

    /// Returns the dated run this leg rides.
    pub fn run(&self) -> TripRun {
        self.run
    }

    /// Returns the boarding event.
    pub fn board(&self) -> &StopEvent {
        // Safe: validated at construction (len >= 2)
        &self.events[0]
    }

    /// Returns the alighting event.
    pub fn alight(&self) -> &StopEvent {
        &self.events[self.events.len() - 1]
    }

    pub fn board_stop(&self) -> StopIdx {
        self.board().stop
    }

    pub fn alight_stop(&self) -> StopIdx {
        self.alight().stop
    }

    pub fn departure_time(&self) -> TimeCode {
        self.board().time
    }

    pub fn arrival_time(&self) -> TimeCode {
        self.alight().time
    }

    /// Stops passed between boarding and alighting.
    pub fn intermediate_stops(&self) -> &[StopEvent] {
        &self.events[1..self.events.len() - 1]
    }

    /// All events from boarding to alighting.
    pub fn events(&self) -> &[StopEvent] {
        &self.events
    }

    /// Time spent on board, in seconds.
    pub fn duration_secs(&self) -> u32 {
        // Safe: arrival >= departure at construction
        self.arrival_time().seconds_since(self.departure_time()) as u32
    }

    /// Does the vehicle call at `stop` anywhere on this leg?
    pub fn calls_at(&self, stop: StopIdx) -> bool {
        self.events.iter().any(|e| e.stop == stop)
    }
}
