//! Query facade over the scanners.
//!
//! The router validates a request, builds the per-query trip selection,
//! runs the single-criterion or multicriteria scan, and turns the labels at
//! the targets into ranked journeys. Arrive-by requests run the
//! single-criterion scan backward from the destinations.

use tracing::debug;

use crate::cache::DayTimelineCache;
use crate::domain::{Journey, TimeCode};
use crate::network::TransitData;

use super::config::SearchConfig;
use super::journey_builder::{BuildError, JourneyBuilder};
use super::lookup::{LookupContext, TripTimeLookup};
use super::mc_raptor::{McResult, McScanner};
use super::rank::{deduplicate, rank_journeys, remove_dominated};
use super::raptor::{Direction, RaptorResult, RoundScanner, ScanLimits, ScanQuery, SearchOutcome};
use super::request::{RouteError, RouteRequest};

/// Journeys found for a request.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    /// Best first, at most `max_results`.
    pub journeys: Vec<Journey>,
    pub outcome: SearchOutcome,
    /// Rounds computed, round 0 included.
    pub rounds: usize,
}

/// Answers route requests over one network snapshot.
///
/// A router holds no per-query state, so one instance can serve queries
/// from many threads at once.
pub struct Router<'a, D: TransitData + ?Sized> {
    data: &'a D,
    config: SearchConfig,
    cache: Option<&'a DayTimelineCache>,
}

impl<'a, D: TransitData + ?Sized> Router<'a, D> {
    pub fn new(data: &'a D, config: SearchConfig) -> Self {
        Self {
            data,
            config,
            cache: None,
        }
    }

    /// Serve trip lookups through `cache`, which must belong to this
    /// router's network.
    pub fn with_cache(mut self, cache: &'a DayTimelineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Find journeys for `request`.
    ///
    /// An unreachable destination is not an error: the response is empty
    /// with a [`SearchOutcome::Complete`] outcome.
    pub fn route(&self, request: &RouteRequest) -> Result<RouteResponse, RouteError> {
        let instant = request.validate(self.data)?;
        let ctx = self.context(request)?;
        let builder = JourneyBuilder::new(self.data, ctx, self.config.min_connection_secs);
        let via = request.options.via;
        let direction = request.options.direction();

        let (journeys, outcome, rounds) = if request.options.uses_multicriteria() {
            let result = self.run_bags(ctx, request, instant);
            let journeys: Vec<Journey> = result
                .table
                .destination_labels()
                .filter_map(|(round, id)| rebuilt(builder.from_label(&result.table, id), round))
                .collect();
            (journeys, result.outcome, result.table.round_count())
        } else {
            let result = self.run_rounds(ctx, request, instant);
            let journeys: Vec<Journey> = result
                .table
                .target_labels()
                .filter_map(|(round, stop)| rebuilt(builder.from_rounds(&result.table, round, stop), round))
                .collect();
            (journeys, result.outcome, result.table.round_count())
        };

        let bound = request.bound(instant);
        let journeys: Vec<Journey> = journeys
            .into_iter()
            .filter(|j| respects_bound(j, direction, bound))
            .collect();
        let found = journeys.len();
        let mut journeys = rank_journeys(deduplicate(remove_dominated(journeys, via, direction)), via, direction);
        journeys.truncate(self.config.max_results);

        let epoch = self.data.epoch();
        debug!(
            origins = request.origins.len(),
            destinations = request.destinations.len(),
            ?direction,
            found,
            returned = journeys.len(),
            rounds,
            ?outcome,
            best_departure = ?journeys.first().and_then(|j| j.departure_time().to_datetime(epoch)),
            best_arrival = ?journeys.first().and_then(|j| j.arrival_time().to_datetime(epoch)),
            "Route query answered"
        );

        Ok(RouteResponse {
            journeys,
            outcome,
            rounds,
        })
    }

    /// Run the single-criterion scan for `request` and return its raw
    /// round table.
    pub fn round_table(&self, request: &RouteRequest) -> Result<RaptorResult, RouteError> {
        let departure = request.validate(self.data)?;
        let ctx = self.context(request)?;
        Ok(self.run_rounds(ctx, request, departure))
    }

    /// Run the multicriteria scan for `request` and return its raw bags.
    /// The scan only runs forward.
    pub fn bag_table(&self, request: &RouteRequest) -> Result<McResult, RouteError> {
        let departure = request.validate(self.data)?;
        if request.options.direction() == Direction::Backward {
            return Err(RouteError::InvalidRequest(
                "the multicriteria scan does not search arrive-by".to_string(),
            ));
        }
        let ctx = self.context(request)?;
        Ok(self.run_bags(ctx, request, departure))
    }

    fn context<'q>(&'q self, request: &'q RouteRequest) -> Result<LookupContext<'q>, RouteError> {
        let options = &request.options;
        let calendar = match &options.calendar {
            None => None,
            Some(id) => {
                let days = self
                    .data
                    .calendar(id)
                    .ok_or_else(|| RouteError::InvalidRequest(format!("unknown calendar {id}")))?;
                Some((id, days))
            }
        };
        Ok(LookupContext {
            level: options.rt_level,
            calendar,
            filter: options.filter.as_ref(),
            lookahead_days: self.config.lookahead_days,
        })
    }

    fn lookup<'q>(&'q self, ctx: LookupContext<'q>) -> TripTimeLookup<'q, D> {
        let lookup = TripTimeLookup::new(self.data, ctx);
        match self.cache {
            Some(cache) => lookup.with_cache(cache),
            None => lookup,
        }
    }

    fn limits(&self, request: &RouteRequest) -> ScanLimits {
        ScanLimits {
            max_rounds: request.options.max_rounds.unwrap_or(self.config.max_rounds),
            deadline: request.options.deadline,
        }
    }

    fn run_rounds(&self, ctx: LookupContext<'_>, request: &RouteRequest, instant: TimeCode) -> RaptorResult {
        let direction = request.options.direction();
        let (sources, targets) = match direction {
            Direction::Forward => (&request.origins, &request.destinations),
            Direction::Backward => (&request.destinations, &request.origins),
        };
        let query = ScanQuery {
            sources: sources.as_slice(),
            targets: targets.as_slice(),
            instant,
            bound: request.bound(instant),
            forbidden: &request.options.forbidden_patterns,
        };
        RoundScanner::new(self.lookup(ctx), self.config.min_connection_secs, self.limits(request))
            .with_direction(direction)
            .scan(&query)
    }

    fn run_bags(&self, ctx: LookupContext<'_>, request: &RouteRequest, departure: TimeCode) -> McResult {
        let query = ScanQuery {
            sources: request.origins.as_slice(),
            targets: request.destinations.as_slice(),
            instant: departure,
            bound: request.bound(departure),
            forbidden: &request.options.forbidden_patterns,
        };
        McScanner::new(
            self.lookup(ctx),
            self.config.min_connection_secs,
            request.options.via,
            self.limits(request),
        )
        .scan(&query)
    }
}

/// Is the journey's timing inside the bound: arriving no later going
/// forward, leaving no earlier going backward?
fn respects_bound(journey: &Journey, direction: Direction, bound: Option<TimeCode>) -> bool {
    bound.is_none_or(|b| match direction {
        Direction::Forward => journey.arrival_time() <= b,
        Direction::Backward => journey.departure_time() >= b,
    })
}

fn rebuilt(built: Result<Journey, BuildError>, round: usize) -> Option<Journey> {
    match built {
        Ok(journey) => Some(journey),
        Err(error) => {
            debug!(round, %error, "Skipping label that could not be rebuilt");
            None
        }
    }
}
