//! Round-based single-criterion search.
//!
//! Round `k` holds the best instant at each stop using at most `k` rides.
//! A forward scan computes earliest arrivals leaving the sources at the
//! query instant. A backward scan computes latest departures that still
//! reach the sources by the query instant: it rides patterns against their
//! stop order and looks runs up with `tardiest`.
//!
//! Each round scans every pattern touched by the previous round from its
//! first touched position in scan order, then relaxes one hop of
//! footpaths. A round that improves no stop ends the search.
//!
//! A round keeps two labels per stop: the best one, and the best one not
//! ending in a walk. Footpaths only start from the latter, so a walk label
//! never hides the label another walk of the same round came from.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, trace};

use crate::domain::{PatternIdx, Position, StopIdx, StopTime, TimeCode, Trip, TripRun};
use crate::network::{Transfer, TransitData};

use super::lookup::{Boarding, TripTimeLookup};
use super::request::StopAccess;

/// Which way a scan moves along the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Leave at or after the query instant; earlier arrivals win.
    Forward,
    /// Arrive at or before the query instant; later departures win.
    Backward,
}

impl Direction {
    /// Is `candidate` strictly better than `incumbent`?
    pub fn improves(self, candidate: TimeCode, incumbent: TimeCode) -> bool {
        match self {
            Direction::Forward => candidate < incumbent,
            Direction::Backward => candidate > incumbent,
        }
    }

    /// Move `secs` in the scan direction; `None` off the time axis.
    pub fn advance(self, instant: TimeCode, secs: u32) -> Option<TimeCode> {
        match self {
            Direction::Forward => instant.checked_add_seconds(secs),
            Direction::Backward => instant.checked_sub_seconds(secs),
        }
    }

    /// Is `instant` on the near side of `bound`, or on it?
    pub fn within(self, instant: TimeCode, bound: TimeCode) -> bool {
        !self.improves(bound, instant)
    }

    /// Positions of a pattern of `len` stops in scan order from `start`.
    fn positions(self, start: Position, len: usize) -> impl Iterator<Item = Position> {
        let steps = match self {
            Direction::Forward => len.saturating_sub(start.0),
            Direction::Backward => start.0 + 1,
        };
        (0..steps).map(move |i| match self {
            Direction::Forward => Position(start.0 + i),
            Direction::Backward => Position(start.0 - i),
        })
    }

    fn footpaths<D: TransitData + ?Sized>(self, data: &D, stop: StopIdx) -> &[Transfer] {
        match self {
            Direction::Forward => data.transfers_from(stop),
            Direction::Backward => data.transfers_into(stop),
        }
    }

    /// Instant a ridden run gives the stop at `st`, and whether that needs
    /// (pick-up, drop-off).
    fn leave(self, run: TripRun, st: &StopTime) -> (TimeCode, bool, bool) {
        match self {
            Direction::Forward => (run.arrival(st), false, true),
            Direction::Backward => (run.departure(st), true, false),
        }
    }

    /// Instant a run must be caught at to continue from the stop at `st`.
    fn catch_time(self, run: TripRun, st: &StopTime) -> TimeCode {
        match self {
            Direction::Forward => run.departure(st),
            Direction::Backward => run.arrival(st),
        }
    }
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The last round improved nothing; the labels are optimal.
    Complete,
    /// The round cap or deadline stopped the search early. Labels are
    /// valid but may not be optimal.
    Truncated,
}

/// Cooperative cancellation for a scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub max_rounds: usize,
    pub deadline: Option<Instant>,
}

impl ScanLimits {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds,
            deadline: None,
        }
    }

    /// Has the wall-clock budget run out?
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// What a scan searches between.
#[derive(Debug, Clone, Copy)]
pub struct ScanQuery<'q> {
    /// Where labels start: the origins forward, the destinations backward.
    pub sources: &'q [StopAccess],
    /// Where the scan heads: the destinations forward, the origins backward.
    pub targets: &'q [StopAccess],
    /// Departure instant forward, arrival instant backward.
    pub instant: TimeCode,
    /// Labels past this instant in scan direction are dropped.
    pub bound: Option<TimeCode>,
    pub forbidden: &'q BTreeSet<PatternIdx>,
}

/// Where a label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOrigin {
    /// A scan source, `walk_secs` away from the traveller.
    Access { walk_secs: u32 },
    /// Riding `run` of `pattern`: left at `position` going forward,
    /// boarded there going backward.
    Ride {
        pattern: PatternIdx,
        run: TripRun,
        position: Position,
    },
    /// Walking from `from`, in scan order.
    Transfer { from: StopIdx, duration_secs: u32 },
}

/// Best instant at a stop within one round: an arrival forward, a
/// departure backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLabel {
    pub time: TimeCode,
    pub origin: LabelOrigin,
}

impl StopLabel {
    /// Instant from which the next vehicle may be caught. A label set by a
    /// ride moves by the minimum connection; the others don't.
    pub fn ready_time(&self, direction: Direction, min_connection_secs: u32) -> Option<TimeCode> {
        match self.origin {
            LabelOrigin::Ride { .. } => direction.advance(self.time, min_connection_secs),
            LabelOrigin::Access { .. } | LabelOrigin::Transfer { .. } => Some(self.time),
        }
    }
}

/// Labels of every round plus the best instant per stop.
///
/// A round only stores labels for the stops it improved.
#[derive(Debug, Clone)]
pub struct RoundTable {
    direction: Direction,
    rounds: Vec<Vec<Option<StopLabel>>>,
    walk_starts: Vec<Vec<Option<StopLabel>>>,
    best: Vec<Option<TimeCode>>,
    target_walks: Vec<Option<u32>>,
    target_stops: Vec<StopIdx>,
    target: Option<TimeCode>,
    bound: Option<TimeCode>,
}

impl RoundTable {
    fn new(stop_count: usize, direction: Direction, targets: &[StopAccess], bound: Option<TimeCode>) -> Self {
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
            direction,
            rounds: Vec::new(),
            walk_starts: Vec::new(),
            best: vec![None; stop_count],
            target_walks,
            target_stops,
            target: None,
            bound,
        }
    }

    fn push_round(&mut self) -> usize {
        self.rounds.push(vec![None; self.best.len()]);
        self.walk_starts.push(vec![None; self.best.len()]);
        self.rounds.len() - 1
    }

    /// Record a ride or source label.
    fn set(&mut self, round: usize, stop: StopIdx, label: StopLabel) {
        self.walk_starts[round][stop.0] = Some(label);
        self.set_walk(round, stop, label);
    }

    /// Record a label; footpaths of this round won't start from it.
    fn set_walk(&mut self, round: usize, stop: StopIdx, label: StopLabel) {
        self.rounds[round][stop.0] = Some(label);
        self.best[stop.0] = Some(label.time);

        let total = self.target_walks[stop.0].and_then(|w| self.direction.advance(label.time, w));
        if let Some(total) = total {
            if self.within_bound(total) && self.target.is_none_or(|t| self.direction.improves(total, t)) {
                self.target = Some(total);
            }
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of rounds computed, round 0 included.
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Label set at `stop` by `round`, if that round improved it.
    pub fn label(&self, round: usize, stop: StopIdx) -> Option<&StopLabel> {
        self.rounds.get(round)?.get(stop.0)?.as_ref()
    }

    /// Label a footpath of `round` out of `stop` starts from: the round's
    /// ride or source label there, never a walk.
    pub fn walk_start(&self, round: usize, stop: StopIdx) -> Option<&StopLabel> {
        self.walk_starts.get(round)?.get(stop.0)?.as_ref()
    }

    /// Best instant at `stop` over all rounds.
    pub fn best(&self, stop: StopIdx) -> Option<TimeCode> {
        self.best.get(stop.0).copied().flatten()
    }

    /// Best instant at the traveller's end, street walk included.
    pub fn target(&self) -> Option<TimeCode> {
        self.target
    }

    /// Walk between `stop` and the traveller's end, if `stop` is a target.
    pub fn target_walk(&self, stop: StopIdx) -> Option<u32> {
        self.target_walks.get(stop.0).copied().flatten()
    }

    /// Every (round, target stop) holding a label, in round order.
    pub fn target_labels(&self) -> impl Iterator<Item = (usize, StopIdx)> + '_ {
        (0..self.rounds.len()).flat_map(move |round| {
            self.target_stops
                .iter()
                .filter(move |&&stop| self.label(round, stop).is_some())
                .map(move |&stop| (round, stop))
        })
    }

    /// Best label at `stop` using at most `round` rides, with the round
    /// that set it.
    pub fn latest_up_to(&self, round: usize, stop: StopIdx) -> Option<(usize, &StopLabel)> {
        (0..=round.min(self.rounds.len().saturating_sub(1)))
            .rev()
            .find_map(|r| self.label(r, stop).map(|l| (r, l)))
    }

    fn within_bound(&self, time: TimeCode) -> bool {
        self.bound.is_none_or(|b| self.direction.within(time, b))
    }

    fn admits(&self, stop: StopIdx, time: TimeCode) -> bool {
        let direction = self.direction;
        self.within_bound(time)
            && self.best(stop).is_none_or(|b| direction.improves(time, b))
            && self.target.is_none_or(|t| direction.improves(time, t))
    }
}

/// Output of a single-criterion scan.
#[derive(Debug, Clone)]
pub struct RaptorResult {
    pub table: RoundTable,
    pub outcome: SearchOutcome,
}

/// First touched position, in scan order, of every allowed pattern serving
/// a marked stop.
pub(crate) fn frontier<D: TransitData + ?Sized>(
    data: &D,
    marked: &[StopIdx],
    direction: Direction,
    forbidden: &BTreeSet<PatternIdx>,
) -> BTreeMap<PatternIdx, Position> {
    let mut frontier = BTreeMap::new();
    for &stop in marked {
        for point in data.patterns_at(stop) {
            if forbidden.contains(&point.pattern) {
                continue;
            }
            frontier
                .entry(point.pattern)
                .and_modify(|p: &mut Position| {
                    *p = match direction {
                        Direction::Forward => (*p).min(point.position),
                        Direction::Backward => (*p).max(point.position),
                    }
                })
                .or_insert(point.position);
        }
    }
    frontier
}

/// The run currently ridden while scanning a pattern.
#[derive(Clone, Copy)]
struct Riding<'a> {
    run: TripRun,
    trip: &'a Trip,
}

impl Riding<'_> {
    fn stop_time(&self, position: Position) -> &StopTime {
        &self.trip.stop_times()[position.0]
    }
}

/// Single-criterion RAPTOR.
pub struct RoundScanner<'a, D: TransitData + ?Sized> {
    lookup: TripTimeLookup<'a, D>,
    min_connection_secs: u32,
    limits: ScanLimits,
    direction: Direction,
}

impl<'a, D: TransitData + ?Sized> RoundScanner<'a, D> {
    pub fn new(lookup: TripTimeLookup<'a, D>, min_connection_secs: u32, limits: ScanLimits) -> Self {
        Self {
            lookup,
            min_connection_secs,
            limits,
            direction: Direction::Forward,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn lookup(&self) -> &TripTimeLookup<'a, D> {
        &self.lookup
    }

    /// Scan from stop `from` towards stop `to`, starting at `instant`.
    pub fn run(&self, from: StopIdx, to: StopIdx, instant: TimeCode) -> RaptorResult {
        let sources = [StopAccess::at(from)];
        let targets = [StopAccess::at(to)];
        let forbidden = BTreeSet::new();
        self.scan(&ScanQuery {
            sources: &sources,
            targets: &targets,
            instant,
            bound: None,
            forbidden: &forbidden,
        })
    }

    pub fn scan(&self, query: &ScanQuery<'_>) -> RaptorResult {
        let data = self.lookup.data();
        let mut table = RoundTable::new(data.stop_count(), self.direction, query.targets, query.bound);

        let round = table.push_round();
        let mut marked = Vec::new();
        for access in query.sources {
            let Some(time) = self.direction.advance(query.instant, access.walk_secs) else {
                continue;
            };
            if !table.admits(access.stop, time) {
                continue;
            }
            if table.label(round, access.stop).is_none() {
                marked.push(access.stop);
            }
            let origin = LabelOrigin::Access {
                walk_secs: access.walk_secs,
            };
            table.set(round, access.stop, StopLabel { time, origin });
        }
        let sources = marked.clone();
        marked.extend(self.relax_transfers(&mut table, round, &sources));

        debug!(
            sources = query.sources.len(),
            targets = query.targets.len(),
            instant = %query.instant,
            direction = ?self.direction,
            "Starting round-based search"
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

            trace!(round, ridden = ridden.len(), walked = walked.len(), "Round finished");
            marked = ridden;
            marked.extend(walked);
        }

        debug!(
            rounds = table.round_count(),
            ?outcome,
            target = ?table.target(),
            "Round-based search finished"
        );
        RaptorResult { table, outcome }
    }

    fn catch(&self, pattern: PatternIdx, position: Position, ready: TimeCode) -> Option<Boarding> {
        match self.direction {
            Direction::Forward => self.lookup.earliest(pattern, position, ready, true, false),
            Direction::Backward => self.lookup.tardiest(pattern, position, ready, false, true),
        }
    }

    /// Scan every frontier pattern; returns the stops improved by a ride.
    fn scan_round(
        &self,
        table: &mut RoundTable,
        round: usize,
        marked: &[StopIdx],
        forbidden: &BTreeSet<PatternIdx>,
    ) -> Vec<StopIdx> {
        let data = self.lookup.data();
        let ctx = self.lookup.context();
        let direction = self.direction;
        let mut improved = Vec::new();

        for (pattern_idx, start) in frontier(data, marked, direction, forbidden) {
            let pattern = data.pattern(pattern_idx);
            let mut riding: Option<Riding<'_>> = None;

            for position in direction.positions(start, pattern.len()) {
                let stop = pattern.stop_at(position);

                if let Some(r) = riding {
                    let st = r.stop_time(position);
                    let (time, need_board, need_alight) = direction.leave(r.run, st);
                    if ctx.usable(r.trip, st, need_board, need_alight) && table.admits(stop, time) {
                        if table.label(round, stop).is_none() {
                            improved.push(stop);
                        }
                        let origin = LabelOrigin::Ride {
                            pattern: pattern_idx,
                            run: r.run,
                            position,
                        };
                        table.set(round, stop, StopLabel { time, origin });
                    }
                }

                let Some((_, previous)) = table.latest_up_to(round - 1, stop) else {
                    continue;
                };
                let Some(ready) = previous.ready_time(direction, self.min_connection_secs) else {
                    continue;
                };
                let current = riding.map(|r| direction.catch_time(r.run, r.stop_time(position)));
                if current.is_some_and(|c| !direction.improves(ready, c)) {
                    continue;
                }
                if let Some(caught) = self.catch(pattern_idx, position, ready) {
                    if current.is_none_or(|c| direction.improves(caught.time, c)) {
                        riding = Some(Riding {
                            run: caught.run,
                            trip: data.trip(caught.run.trip),
                        });
                    }
                }
            }
        }

        improved
    }

    /// Relax one footpath hop from the ride or source labels of `round` at
    /// `sources`; returns the stops reached.
    fn relax_transfers(&self, table: &mut RoundTable, round: usize, sources: &[StopIdx]) -> Vec<StopIdx> {
        let data = self.lookup.data();
        let direction = self.direction;
        let starts: Vec<(StopIdx, TimeCode)> = sources
            .iter()
            .filter_map(|&s| table.walk_start(round, s).map(|l| (s, l.time)))
            .collect();

        let mut reached = Vec::new();
        for (from, time) in starts {
            for transfer in direction.footpaths(data, from) {
                let Some(at) = direction.advance(time, transfer.duration_secs) else {
                    continue;
                };
                if !table.admits(transfer.to, at) {
                    continue;
                }
                if table.label(round, transfer.to).is_none() {
                    reached.push(transfer.to);
                }
                let origin = LabelOrigin::Transfer {
                    from,
                    duration_secs: transfer.duration_secs,
                };
                table.set_walk(round, transfer.to, StopLabel { time: at, origin });
            }
        }
        reached
    }
}
