//! Journey types.
//!
//! A `Journey` represents a complete trip from origin to destination,
//! made of vehicle legs and footpath walks between stops, plus the walks
//! between the traveller and the first and last stops.

use super::{DomainError, Leg, StopIdx, TimeCode};

/// A footpath between two nearby stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    /// Origin stop
    pub from: StopIdx,
    /// Destination stop
    pub to: StopIdx,
    /// Instant the walk starts
    pub departure: TimeCode,
    /// Walking duration in seconds
    pub duration_secs: u32,
}

impl Walk {
    /// Creates a new walk between stops.
    pub fn new(from: StopIdx, to: StopIdx, departure: TimeCode, duration_secs: u32) -> Self {
        Self {
            from,
            to,
            departure,
            duration_secs,
        }
    }

    /// Instant the walk reaches `to`.
    pub fn arrival(&self) -> TimeCode {
        self.departure.add_seconds(self.duration_secs)
    }
}

/// A segment of a journey: either a ride or a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A vehicle ride
    Ride(Leg),
    /// A walk between stops
    Walk(Walk),
}

impl Segment {
    /// Returns the origin stop of this segment.
    pub fn origin(&self) -> StopIdx {
        match self {
            Segment::Ride(leg) => leg.board_stop(),
            Segment::Walk(walk) => walk.from,
        }
    }

    /// Returns the destination stop of this segment.
    pub fn destination(&self) -> StopIdx {
        match self {
            Segment::Ride(leg) => leg.alight_stop(),
            Segment::Walk(walk) => walk.to,
        }
    }

    pub fn departure(&self) -> TimeCode {
        match self {
            Segment::Ride(leg) => leg.departure_time(),
            Segment::Walk(walk) => walk.departure,
        }
    }

    pub fn arrival(&self) -> TimeCode {
        match self {
            Segment::Ride(leg) => leg.arrival_time(),
            Segment::Walk(walk) => walk.arrival(),
        }
    }

    /// Returns the duration of this segment in seconds.
    pub fn duration_secs(&self) -> u32 {
        match self {
            Segment::Ride(leg) => leg.duration_secs(),
            Segment::Walk(walk) => walk.duration_secs,
        }
    }

    /// Returns the leg if this is a ride segment.
    pub fn as_leg(&self) -> Option<&Leg> {
        match self {
            Segment::Ride(leg) => Some(leg),
            Segment::Walk(_) => None,
        }
    }

    /// Returns the walk if this is a walk segment.
    pub fn as_walk(&self) -> Option<&Walk> {
        match self {
            Segment::Ride(_) => None,
            Segment::Walk(walk) => Some(walk),
        }
    }
}

/// A complete journey from origin to destination.
///
/// # Invariants
///
/// - At least one segment
/// - Consecutive segments connect (destination of one = origin of next)
/// - A segment never starts before the previous one ends
/// - The access and egress walks stay on the time axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journey {
    segments: Vec<Segment>,
    access_secs: u32,
    egress_secs: u32,
    departure: TimeCode,
    arrival: TimeCode,
}

impl Journey {
    /// Constructs a journey from segments in travel order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the list is empty, if consecutive segments don't
    /// share a stop, or if a segment departs before its predecessor arrives.
    pub fn new(segments: Vec<Segment>) -> Result<Self, DomainError> {
        if segments.is_empty() {
            return Err(DomainError::EmptyJourney);
        }

        for window in segments.windows(2) {
            let prev_dest = window[0].destination();
            let next_origin = window[1].origin();
            if prev_dest != next_origin {
                return Err(DomainError::StopsNotConnected(prev_dest, next_origin));
            }
            if window[1].departure() < window[0].arrival() {
                return Err(DomainError::MissedConnection(next_origin));
            }
        }

        let departure = segments[0].departure();
        let arrival = segments[segments.len() - 1].arrival();
        Ok(Journey {
            segments,
            access_secs: 0,
            egress_secs: 0,
            departure,
            arrival,
        })
    }

    /// Add the walk from the traveller to the first stop and from the last
    /// stop to the traveller's destination.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the access walk would start before the epoch or the
    /// egress walk end past the last representable instant.
    pub fn with_street_walks(mut self, access_secs: u32, egress_secs: u32) -> Result<Self, DomainError> {
        let first = &self.segments[0];
        self.departure = first
            .departure()
            .checked_sub_seconds(access_secs)
            .ok_or(DomainError::StreetWalkOutOfRange(first.origin()))?;
        let last = &self.segments[self.segments.len() - 1];
        self.arrival = last
            .arrival()
            .checked_add_seconds(egress_secs)
            .ok_or(DomainError::StreetWalkOutOfRange(last.destination()))?;
        self.access_secs = access_secs;
        self.egress_secs = egress_secs;
        Ok(self)
    }

    /// Returns all segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns all legs in order.
    pub fn legs(&self) -> impl Iterator<Item = &Leg> {
        self.segments.iter().filter_map(|s| s.as_leg())
    }

    /// Returns all walks in order.
    pub fn walks(&self) -> impl Iterator<Item = &Walk> {
        self.segments.iter().filter_map(|s| s.as_walk())
    }

    /// Returns the number of vehicle legs.
    pub fn leg_count(&self) -> usize {
        self.legs().count()
    }

    /// Returns the number of changes (legs - 1, or 0 for direct).
    pub fn change_count(&self) -> usize {
        self.leg_count().saturating_sub(1)
    }

    pub fn origin(&self) -> StopIdx {
        self.segments[0].origin()
    }

    pub fn destination(&self) -> StopIdx {
        self.segments[self.segments.len() - 1].destination()
    }

    /// Instant the traveller sets off, access walk included.
    pub fn departure_time(&self) -> TimeCode {
        self.departure
    }

    /// Instant the traveller arrives, egress walk included.
    pub fn arrival_time(&self) -> TimeCode {
        self.arrival
    }

    /// Walk from the traveller to the first stop.
    pub fn access_secs(&self) -> u32 {
        self.access_secs
    }

    /// Walk from the last stop to the traveller's destination.
    pub fn egress_secs(&self) -> u32 {
        self.egress_secs
    }

    /// Seconds from first departure to final arrival, waits included.
    pub fn total_duration_secs(&self) -> u64 {
        self.arrival_time().seconds_since(self.departure_time()).max(0) as u64
    }

    /// Seconds spent riding or walking, waits excluded.
    pub fn travel_time_secs(&self) -> u64 {
        let street = u64::from(self.access_secs) + u64::from(self.egress_secs);
        street + self.segments.iter().map(|s| u64::from(s.duration_secs())).sum::<u64>()
    }

    /// Total walking time in seconds, street walks included.
    pub fn walk_secs(&self) -> u64 {
        let street = u64::from(self.access_secs) + u64::from(self.egress_secs);
        street + self.walks().map(|w| u64::from(w.duration_secs)).sum::<u64>()
    }

    /// Does the journey pass through `stop`, on a vehicle or on foot?
    pub fn passes_through(&self, stop: StopIdx) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Ride(leg) => leg.calls_at(stop),
            Segment::Walk(walk) => walk.from == stop || walk.to == stop,
        })
    }
}
