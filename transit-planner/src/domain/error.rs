//! Domain error types.
//!
//! These errors represent validation failures when assembling journeys.
//! They are distinct from query and network-construction errors.

use super::StopIdx;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Invalid leg construction (e.g., alight before board)
    #[error("invalid leg: {0}")]
    InvalidLeg(&'static str),

    /// Consecutive segments don't share a stop
    #[error("stops {0} and {1} are not connected")]
    StopsNotConnected(StopIdx, StopIdx),

    /// A segment departs before the previous one arrives
    #[error("connection at {0} departs before the previous segment arrives")]
    MissedConnection(StopIdx),

    /// Journey has no segments
    #[error("journey must have at least one segment")]
    EmptyJourney,

    /// A walk to or from the street leaves the representable time range
    #[error("street walk at {0} leaves the time range")]
    StreetWalkOutOfRange(StopIdx),
}
