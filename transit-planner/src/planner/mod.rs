//! Journey planner using round-based search.
//!
//! This module answers: "leaving these stops at this instant, how do I reach
//! those stops?" and its arrive-by twin, "to be there by this instant, when
//! do I leave?"
//!
//! Round `k` of a search knows the best ways to reach every stop with at
//! most `k` vehicles. The single-criterion scan keeps one earliest arrival
//! per stop and round; the multicriteria scan keeps Pareto sets over
//! arrival, travel time and passing a via stop. Journeys are rebuilt from
//! the labels and ranked.

mod bag;
mod config;
mod filter;
mod journey_builder;
mod lookup;
mod mc_raptor;
mod rank;
mod raptor;
mod request;
mod router;

#[cfg(test)]
mod router_tests;

pub use bag::{Bag, Criteria, LabelArena, LabelId, McLabel, McStep};
pub use config::SearchConfig;
pub use filter::{AllowAll, BoardingFilter, RequiredProperties};
pub use journey_builder::{BuildError, JourneyBuilder};
pub use lookup::{Boarding, LookupContext, TripTimeLookup};
pub use mc_raptor::{BagTable, McResult, McScanner};
pub use rank::{JourneyScore, deduplicate, rank_journeys, remove_dominated};
pub use raptor::{
    Direction, LabelOrigin, RaptorResult, RoundScanner, RoundTable, ScanLimits, ScanQuery, SearchOutcome, StopLabel,
};
pub use request::{RouteError, RouteOptions, RouteRequest, StopAccess};
pub use router::{RouteResponse, Router};
