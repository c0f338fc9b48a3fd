//! Index types for timetable entities.
//!
//! The network stores stops, patterns and trips in flat arrays; these
//! newtypes keep the different index spaces from being mixed up.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Returns the raw array index.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                $name(value)
            }
        }
    };
}

index_type!(
    /// Index of a stop (a boarding location).
    StopIdx,
    "stop#"
);

index_type!(
    /// Index of a pattern (an ordered stop sequence shared by trips).
    PatternIdx,
    "pattern#"
);

index_type!(
    /// Index of a trip.
    TripIdx,
    "trip#"
);

/// Position of a stop within a pattern's stop sequence.
///
/// Used instead of `StopIdx` to disambiguate patterns that visit the same
/// stop twice (loops).
///
/// # Examples
///
/// ```
/// use transit_planner::domain::Position;
///
/// let p = Position(2);
/// assert_eq!(p.next(), Position(3));
/// assert_eq!(p.prev(), Some(Position(1)));
/// assert_eq!(Position(0).prev(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub usize);

impl Position {
    /// Returns the next position.
    pub fn next(self) -> Self {
        Position(self.0 + 1)
    }

    /// Returns the previous position, if any.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Position)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
