//! Public-transit journey planner.
//!
//! Answers "how do I get from these stops to those, leaving at this
//! instant (or arriving by it)?" over a timetable of scheduled and
//! frequency-based trips, using round-based (RAPTOR) search with an
//! optional multicriteria extension.

pub mod cache;
pub mod domain;
pub mod network;
pub mod planner;
