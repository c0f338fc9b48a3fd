//! Round-based multicriteria search.
//!
//! Same round structure as [`RoundScanner`](super::raptor::RoundScanner),
//! but each (round, stop) keeps a Pareto bag of labels over arrival, travel
//! time and via score instead of a single best arrival. Transfer count is
//! the round index.
//!
//! Pruning rules:
//!
//! - A label is rejected if the best-ever bag of its stop weakly dominates it.
//! - A label is rejected if a complete journey, egress walk included, that
//!   has passed the via stop (every one, when no via stop is requested) is
//!   no later and no longer. Arrival and travel time only grow along a
//!   journey and the via score only falls to 0, so no extension of the
//!   rejected label could do better.
//! - A label arriving after the time bound is rejected.
//!
//! The scan always runs forward.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::domain::{PatternIdx, Position, StopIdx, TimeCode, TripRun};
use crate::network::TransitData;

use super::bag::{Bag, Criteria, LabelArena, LabelId, McLabel, McStep};
use super::lookup::TripTimeLookup;
use super::raptor::{Direction, ScanLimits, ScanQuery, SearchOutcome, frontier};
use super::request::StopAccess;

/// Bags of every round, best-ever bags per stop, and the label arena.
#[derive(Debug, Clone)]
pub struct BagTable {
    rounds: Vec<Vec<Bag>>,
    best: Vec<Bag>,
    arena: LabelArena,
    target_walks: Vec<Option<u32>>,
    target_stops: Vec<StopIdx>,
    arrived: Bag,
    bound: Option<TimeCode>,
}

impl BagTable {
    fn new(stop_count: usize, targets: &[StopAccess], bound: Option<TimeCode>) -> Self {
        let mut target_walks: Vec<Option<u32>> = vec![None; stop_count];
        let mut target_stops = Vec::new();
        for access in targets {
            let walk = &mut target_walks[access.stop.0];
            if walk.is_none() {
                target_stops.push(access.stop);
            }
            *walk = Some(walk.map_or(access.walk_secs, |w| w.min(access.walk_secs)));
        }
        Self {
            rounds: Vec::new(),
            best: vec![Bag::new(); stop_count],
            arena: LabelArena::new(),
            target_walks,
            target_stops,
            arrived: Bag::new(),
            bound,
        }
    }

    fn push_round(&mut self) -> usize {
        self.rounds.push(vec![Bag::new(); self.best.len()]);
        self.rounds.len() - 1
    }

    /// Number of rounds computed, round 0 included.
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Labels `round` added at `stop` and still non-dominated there.
    pub fn bag(&self, round: usize, stop: StopIdx) -> Option<&Bag> {
        self.rounds.get(round)?.get(stop.0)
    }

    /// Pareto set of every label admitted at `stop`.
    pub fn best(&self, stop: StopIdx) -> Option<&Bag> {
        self.best.get(stop.0)
    }

    pub fn arena(&self) -> &LabelArena {
        &self.arena
    }

    pub fn label(&self, id: LabelId) -> &McLabel {
        self.arena.get(id)
    }

    /// Walk from `stop` to the traveller's destination, if `stop` is a target.
    pub fn target_walk(&self, stop: StopIdx) -> Option<u32> {
        self.target_walks.get(stop.0).copied().flatten()
    }

    /// Pareto set of complete journeys, egress walks included.
    pub fn arrived(&self) -> &Bag {
        &self.arrived
    }

    /// Every label left in a target bag, with its round.
    pub fn destination_labels(&self) -> impl Iterator<Item = (usize, LabelId)> + '_ {
        self.rounds.iter().enumerate().flat_map(move |(round, bags)| {
            self.target_stops
                .iter()
                .flat_map(move |stop| bags[stop.0].iter().map(move |(_, id)| (round, *id)))
        })
    }

    fn admits(&self, stop: StopIdx, criteria: &Criteria) -> bool {
        if self.bound.is_some_and(|b| criteria.arrival > b) {
            return false;
        }
        if self.best[stop.0].weakly_dominates(criteria) {
            return false;
        }
        !self
            .arrived
            .iter()
            .any(|(d, _)| d.via == 0 && d.arrival <= criteria.arrival && d.travel_secs <= criteria.travel_secs)
    }

    /// Admit `label` into `round`; returns its id if it survived pruning.
    fn insert(&mut self, round: usize, label: McLabel) -> Option<LabelId> {
        if !self.admits(label.stop, &label.criteria) {
            return None;
        }
        let id = self.arena.push(label);
        self.rounds[round][label.stop.0].add(label.criteria, id);
        self.best[label.stop.0].add(label.criteria, id);

        if let Some(walk) = self.target_walks[label.stop.0] {
            let complete = label.criteria.arrival.checked_add_seconds(walk).map(|arrival| Criteria {
                arrival,
                travel_secs: label.criteria.travel_secs.saturating_add(walk),
                via: label.criteria.via,
            });
            if let Some(complete) = complete.filter(|c| self.bound.is_none_or(|b| c.arrival <= b)) {
                self.arrived.add(complete, id);
            }
        }
        Some(id)
    }
}

/// Output of a multicriteria scan.
#[derive(Debug, Clone)]
pub struct McResult {
    pub table: BagTable,
    pub outcome: SearchOutcome,
}

/// A label riding a run while a pattern is scanned.
#[derive(Debug, Clone, Copy)]
struct Boarded {
    parent: LabelId,
    run: TripRun,
    board: Position,
    board_departure: TimeCode,
    base_travel: u32,
}

/// Multicriteria RAPTOR.
pub struct McScanner<'a, D: TransitData + ?Sized> {
    lookup: TripTimeLookup<'a, D>,
    min_connection_secs: u32,
    via: Option<StopIdx>,
    limits: ScanLimits,
}

impl<'a, D: TransitData + ?Sized> McScanner<'a, D> {
    pub fn new(
        lookup: TripTimeLookup<'a, D>,
        min_connection_secs: u32,
        via: Option<StopIdx>,
        limits: ScanLimits,
    ) -> Self {
        Self {
            lookup,
            min_connection_secs,
            via,
            limits,
        }
    }

    pub fn lookup(&self) -> &TripTimeLookup<'a, D> {
        &self.lookup
    }

    fn via_score(&self, stop: StopIdx, previous: u8) -> u8 {
        if self.via == Some(stop) { 0 } else { previous }
    }

    /// Search from `origin` leaving at `departure`.
    pub fn run(&self, origin: StopIdx, destination: StopIdx, departure: TimeCode) -> McResult {
        let forbidden = BTreeSet::new();
        self.scan(&ScanQuery {
            sources: &[StopAccess::at(origin)],
            targets: &[StopAccess::at(destination)],
            instant: departure,
            bound: None,
            forbidden: &forbidden,
        })
    }

    pub fn scan(&self, query: &ScanQuery<'_>) -> McResult {
        let data = self.lookup.data();
        let mut table = BagTable::new(data.stop_count(), query.targets, query.bound);

        let round = table.push_round();
        let initial = u8::from(self.via.is_some());
        let mut marked = Vec::new();
        for access in query.sources {
            let Some(arrival) = query.instant.checked_add_seconds(access.walk_secs) else {
                continue;
            };
            let start = McLabel {
                stop: access.stop,
                criteria: Criteria {
                    arrival,
                    travel_secs: access.walk_secs,
                    via: self.via_score(access.stop, initial),
                },
                parent: None,
                step: McStep::Access {
                    walk_secs: access.walk_secs,
                },
            };
            let was_empty = table.rounds[round][access.stop.0].is_empty();
            if table.insert(round, start).is_some() && was_empty {
                marked.push(access.stop);
            }
        }
        let sources = marked.clone();
        marked.extend(self.relax_transfers(&mut table, round, &sources));

        debug!(
            sources = query.sources.len(),
            targets = query.targets.len(),
            instant = %query.instant,
            via = ?self.via,
            "Starting multicriteria search"
        );

        let mut outcome = SearchOutcome::Complete;
        while !marked.is_empty() {
            if table.round_count() > self.limits.max_rounds || self.limits.expired() {
                outcome = SearchOutcome::Truncated;
                break;
            }
            let round = table.push_round();
            let ridden = self.scan_round(&mut table, round, &marked, query.forbidden);
            let walked = self.relax_transfers(&mut table, round, &ridden);

            trace!(
                round,
                ridden = ridden.len(),
                walked = walked.len(),
                labels = table.arena.len(),
                "Multicriteria round finished"
            );
            marked = ridden;
            marked.extend(walked);
        }

        debug!(
            rounds = table.round_count(),
            labels = table.arena.len(),
            ?outcome,
            arrived = table.arrived.len(),
            "Multicriteria search finished"
        );
        McResult { table, outcome }
    }

    /// Scan every frontier pattern; returns the stops given a ride label.
    fn scan_round(
        &self,
        table: &mut BagTable,
        round: usize,
        marked: &[StopIdx],
        forbidden: &BTreeSet<PatternIdx>,
    ) -> Vec<StopIdx> {
        let data = self.lookup.data();
        let ctx = self.lookup.context();
        let mut improved = Vec::new();

        for (pattern_idx, start) in frontier(data, marked, Direction::Forward, forbidden) {
            let pattern = data.pattern(pattern_idx);
            let mut route: Bag<Boarded> = Bag::new();

            for pos in start.0..pattern.len() {
                let position = Position(pos);
                let stop = pattern.stop_at(position);

                if !route.is_empty() {
                    route = route.remap(|criteria, boarded| {
                        let st = &data.trip(boarded.run.trip).stop_times()[pos];
                        let arrival = boarded.run.arrival(st);
                        let ridden = u32::try_from(arrival.seconds_since(boarded.board_departure)).unwrap_or(0);
                        let advanced = Criteria {
                            arrival,
                            travel_secs: boarded.base_travel.saturating_add(ridden),
                            via: self.via_score(stop, criteria.via),
                        };
                        Some((advanced, *boarded))
                    });

                    let riders: Vec<(Criteria, Boarded)> = route.iter().copied().collect();
                    for (criteria, boarded) in riders {
                        let trip = data.trip(boarded.run.trip);
                        if !ctx.usable(trip, &trip.stop_times()[pos], false, true) {
                            continue;
                        }
                        let was_empty = table.rounds[round][stop.0].is_empty();
                        let label = McLabel {
                            stop,
                            criteria,
                            parent: Some(boarded.parent),
                            step: McStep::Ride {
                                pattern: pattern_idx,
                                run: boarded.run,
                                board: boarded.board,
                                alight: position,
                            },
                        };
                        if table.insert(round, label).is_some() && was_empty {
                            improved.push(stop);
                        }
                    }
                }

                let boarders: Vec<LabelId> = table.rounds[round - 1][stop.0].iter().map(|(_, id)| *id).collect();
                for id in boarders {
                    let label = table.label(id);
                    let ready = label.ready_time(self.min_connection_secs);
                    let Some(boarding) = self.lookup.earliest(pattern_idx, position, ready, true, false) else {
                        continue;
                    };
                    let criteria = Criteria {
                        arrival: boarding.time,
                        travel_secs: label.criteria.travel_secs,
                        via: label.criteria.via,
                    };
                    route.add(
                        criteria,
                        Boarded {
                            parent: id,
                            run: boarding.run,
                            board: position,
                            board_departure: boarding.time,
                            base_travel: label.criteria.travel_secs,
                        },
                    );
                }
            }
        }

        improved
    }

    /// Relax one footpath hop from the non-walking labels of `round` at
    /// `sources`; returns the stops reached.
    fn relax_transfers(&self, table: &mut BagTable, round: usize, sources: &[StopIdx]) -> Vec<StopIdx> {
        let data = self.lookup.data();
        let starts: Vec<(StopIdx, LabelId, Criteria)> = sources
            .iter()
            .flat_map(|&s| table.rounds[round][s.0].iter().map(move |(c, id)| (s, *id, *c)))
            .filter(|(_, id, _)| !matches!(table.label(*id).step, McStep::Transfer { .. }))
            .collect();

        let mut reached = Vec::new();
        for (from, parent, criteria) in starts {
            for transfer in data.transfers_from(from) {
                let Some(arrival) = criteria.arrival.checked_add_seconds(transfer.duration_secs) else {
                    continue;
                };
                let walked = Criteria {
                    arrival,
                    travel_secs: criteria.travel_secs.saturating_add(transfer.duration_secs),
                    via: self.via_score(transfer.to, criteria.via),
                };
                let was_empty = table.rounds[round][transfer.to.0].is_empty();
                let label = McLabel {
                    stop: transfer.to,
                    criteria: walked,
                    parent: Some(parent),
                    step: McStep::Transfer {
                        from,
                        duration_secs: transfer.duration_secs,
                    },
                };
                if table.insert(round, label).is_some() && was_empty {
                    reached.push(transfer.to);
                }
            }
        }
        reached
    }
}
