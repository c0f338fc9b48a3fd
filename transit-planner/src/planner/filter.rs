//! Boarding eligibility predicates.
//!
//! A [`BoardingFilter`] is consulted for every candidate trip and stop time
//! the lookup considers, so a rejected trip is skipped exactly as if it did
//! not run.

use std::fmt;

use crate::domain::{StopTime, Trip, VehicleProperties};

/// Decides whether a trip may be used at a given stop time.
pub trait BoardingFilter: Send + Sync {
    fn allows(&self, trip: &Trip, stop_time: &StopTime) -> bool;
}

impl<F> BoardingFilter for F
where
    F: Fn(&Trip, &StopTime) -> bool + Send + Sync,
{
    fn allows(&self, trip: &Trip, stop_time: &StopTime) -> bool {
        self(trip, stop_time)
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl BoardingFilter for AllowAll {
    fn allows(&self, _trip: &Trip, _stop_time: &StopTime) -> bool {
        true
    }
}

/// Only accepts trips whose vehicle offers the listed properties.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::VehicleProperties;
/// use transit_planner::planner::RequiredProperties;
///
/// let wheelchair = RequiredProperties(VehicleProperties {
///     wheelchair_accessible: true,
///     bike_accepted: false,
/// });
/// assert!(wheelchair.0.wheelchair_accessible);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredProperties(pub VehicleProperties);

impl BoardingFilter for RequiredProperties {
    fn allows(&self, trip: &Trip, _stop_time: &StopTime) -> bool {
        trip.properties().satisfies(&self.0)
    }
}

impl fmt::Debug for dyn BoardingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoardingFilter")
    }
}
