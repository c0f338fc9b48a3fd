//! Domain types for the transit planner.
//!
//! This module contains the value types shared by the network and the
//! routing engine. Types that carry invariants enforce them at construction
//! time, so code that receives them can trust their validity.

mod calendar;
mod error;
mod ids;
mod journey;
mod leg;
mod time;
mod trip;

pub use calendar::{CalendarId, RtLevel, ValidityLevels, ValidityPattern};
pub use error::DomainError;
pub use ids::{PatternIdx, Position, StopIdx, TripIdx};
pub use journey::{Journey, Segment, Walk};
pub use leg::{Leg, StopEvent};
pub use time::{SECONDS_PER_DAY, TimeCode, normalize};
pub use trip::{DiscreteTrip, FrequencyTrip, StopTime, Trip, TripRun, VehicleProperties};

pub(crate) use trip::service_day_for;
