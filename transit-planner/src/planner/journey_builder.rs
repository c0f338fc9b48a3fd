//! Reconstruct journeys from finished label tables.
//!
//! Single-criterion labels only remember one end of a ride. After a forward
//! scan the boarding point is recovered by stepping back along the pattern
//! until the previous round reached a stop in time for the run; after a
//! backward scan the alighting point is found the same way, stepping
//! forward. Multicriteria labels carry both ends and their parent, so they
//! are followed directly.

use crate::domain::{
    DomainError, Journey, Leg, PatternIdx, Position, Segment, StopEvent, StopIdx, TimeCode, TripRun, Walk,
};
use crate::network::TransitData;

use super::bag::{LabelId, McStep};
use super::lookup::LookupContext;
use super::mc_raptor::BagTable;
use super::raptor::{Direction, LabelOrigin, RoundTable, StopLabel};

/// Error from reconstructing a journey.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The rebuild reached a stop the round never labelled
    #[error("no label at {stop} in round {round}")]
    MissingLabel { round: usize, stop: StopIdx },

    /// No earlier stop of the pattern connects to the run
    #[error("no boarding point on {pattern} before {alight:?}")]
    NoBoardingPoint { pattern: PatternIdx, alight: Position },

    /// No later stop of the pattern connects from the run
    #[error("no alighting point on {pattern} after {board:?}")]
    NoAlightingPoint { pattern: PatternIdx, board: Position },

    /// The reconstructed segments don't form a journey
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Turns labels into [`Journey`]s.
pub struct JourneyBuilder<'a, D: TransitData + ?Sized> {
    data: &'a D,
    ctx: LookupContext<'a>,
    min_connection_secs: u32,
}

impl<'a, D: TransitData + ?Sized> JourneyBuilder<'a, D> {
    pub fn new(data: &'a D, ctx: LookupContext<'a>, min_connection_secs: u32) -> Self {
        Self {
            data,
            ctx,
            min_connection_secs,
        }
    }

    /// The journey through `round`'s label at target `stop`: ending there
    /// after a forward scan, starting there after a backward one.
    pub fn from_rounds(&self, table: &RoundTable, round: usize, stop: StopIdx) -> Result<Journey, BuildError> {
        match table.direction() {
            Direction::Forward => self.walk_back(table, round, stop),
            Direction::Backward => self.walk_forward(table, round, stop),
        }
    }

    fn walk_back(&self, table: &RoundTable, round: usize, destination: StopIdx) -> Result<Journey, BuildError> {
        let egress = table.target_walk(destination).unwrap_or(0);
        let mut segments = Vec::new();
        let (mut round, mut stop) = (round, destination);
        let mut label = *table.label(round, stop).ok_or(BuildError::MissingLabel { round, stop })?;

        let access = loop {
            match label.origin {
                LabelOrigin::Access { walk_secs } => break walk_secs,
                LabelOrigin::Transfer { from, duration_secs } => {
                    segments.push(Segment::Walk(walk_into(from, stop, label.time, duration_secs)?));
                    stop = from;
                    label = *table.walk_start(round, stop).ok_or(BuildError::MissingLabel { round, stop })?;
                }
                LabelOrigin::Ride { pattern, run, position } => {
                    let (board, board_round, previous) = self.boarding_point(table, round, pattern, run, position)?;
                    let leg = self.leg(pattern, run, board, position)?;
                    stop = leg.board_stop();
                    round = board_round;
                    label = previous;
                    segments.push(Segment::Ride(leg));
                }
            }
        };

        segments.reverse();
        Ok(Journey::new(segments)?.with_street_walks(access, egress)?)
    }

    fn walk_forward(&self, table: &RoundTable, round: usize, origin: StopIdx) -> Result<Journey, BuildError> {
        let access = table.target_walk(origin).unwrap_or(0);
        let mut segments = Vec::new();
        let (mut round, mut stop) = (round, origin);
        let mut label = *table.label(round, stop).ok_or(BuildError::MissingLabel { round, stop })?;

        let egress = loop {
            match label.origin {
                LabelOrigin::Access { walk_secs } => break walk_secs,
                LabelOrigin::Transfer { from, duration_secs } => {
                    segments.push(Segment::Walk(Walk::new(stop, from, label.time, duration_secs)));
                    stop = from;
                    label = *table.walk_start(round, stop).ok_or(BuildError::MissingLabel { round, stop })?;
                }
                LabelOrigin::Ride { pattern, run, position } => {
                    let (alight, alight_round, next) = self.alighting_point(table, round, pattern, run, position)?;
                    let leg = self.leg(pattern, run, position, alight)?;
                    stop = leg.alight_stop();
                    round = alight_round;
                    label = next;
                    segments.push(Segment::Ride(leg));
                }
            }
        };

        Ok(Journey::new(segments)?.with_street_walks(access, egress)?)
    }

    /// Latest position before `alight` where a label of an earlier round
    /// was ready for `run`, with that label and its round.
    fn boarding_point(
        &self,
        table: &RoundTable,
        round: usize,
        pattern: PatternIdx,
        run: TripRun,
        alight: Position,
    ) -> Result<(Position, usize, StopLabel), BuildError> {
        let stops = self.data.pattern(pattern).stops();
        let trip = self.data.trip(run.trip);

        for pos in (0..alight.0).rev() {
            let Some((found, previous)) = table.latest_up_to(round - 1, stops[pos]) else {
                continue;
            };
            let st = &trip.stop_times()[pos];
            let ready = previous.ready_time(Direction::Forward, self.min_connection_secs);
            if ready.is_some_and(|r| r <= run.departure(st)) && self.ctx.usable(trip, st, true, false) {
                return Ok((Position(pos), found, *previous));
            }
        }
        Err(BuildError::NoBoardingPoint { pattern, alight })
    }

    /// Earliest position after `board` where `run` reaches a label of an
    /// earlier round in time, with that label and its round.
    fn alighting_point(
        &self,
        table: &RoundTable,
        round: usize,
        pattern: PatternIdx,
        run: TripRun,
        board: Position,
    ) -> Result<(Position, usize, StopLabel), BuildError> {
        let stops = self.data.pattern(pattern).stops();
        let trip = self.data.trip(run.trip);

        for pos in board.0 + 1..stops.len() {
            let Some((found, next)) = table.latest_up_to(round - 1, stops[pos]) else {
                continue;
            };
            let st = &trip.stop_times()[pos];
            let ready = next.ready_time(Direction::Backward, self.min_connection_secs);
            if ready.is_some_and(|r| run.arrival(st) <= r) && self.ctx.usable(trip, st, false, true) {
                return Ok((Position(pos), found, *next));
            }
        }
        Err(BuildError::NoAlightingPoint { pattern, board })
    }

    /// The journey ending at arena label `id`.
    pub fn from_label(&self, table: &BagTable, id: LabelId) -> Result<Journey, BuildError> {
        let destination = table.arena().get(id).stop;
        let egress = table.target_walk(destination).unwrap_or(0);
        let mut segments = Vec::new();
        let mut access = 0;

        for (_, label) in table.arena().ancestry(id) {
            match label.step {
                McStep::Access { walk_secs } => {
                    access = walk_secs;
                    break;
                }
                McStep::Transfer { from, duration_secs } => {
                    segments.push(Segment::Walk(walk_into(
                        from,
                        label.stop,
                        label.criteria.arrival,
                        duration_secs,
                    )?));
                }
                McStep::Ride {
                    pattern,
                    run,
                    board,
                    alight,
                } => segments.push(Segment::Ride(self.leg(pattern, run, board, alight)?)),
            }
        }

        segments.reverse();
        Ok(Journey::new(segments)?.with_street_walks(access, egress)?)
    }

    fn leg(&self, pattern: PatternIdx, run: TripRun, board: Position, alight: Position) -> Result<Leg, BuildError> {
        let stops = self.data.pattern(pattern).stops();
        let stop_times = self.data.trip(run.trip).stop_times();
        let events = (board.0..=alight.0)
            .map(|pos| {
                let st = &stop_times[pos];
                let time = if pos == board.0 { run.departure(st) } else { run.arrival(st) };
                StopEvent::new(stops[pos], Position(pos), time)
            })
            .collect();
        Ok(Leg::new(pattern, run, events)?)
    }
}

fn walk_into(from: StopIdx, to: StopIdx, arrival: TimeCode, duration_secs: u32) -> Result<Walk, BuildError> {
    let departure = arrival
        .checked_sub_seconds(duration_secs)
        .ok_or(DomainError::MissedConnection(from))?;
    Ok(Walk::new(from, to, departure, duration_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DiscreteTrip, RtLevel, StopTime, TripIdx, ValidityLevels, ValidityPattern, VehicleProperties,
    };
    use crate::network::Network;
    use crate::planner::filter::AllowAll;
    use crate::planner::lookup::TripTimeLookup;
    use crate::planner::mc_raptor::McScanner;
    use crate::planner::raptor::{RoundScanner, ScanLimits, ScanQuery};
    use crate::planner::request::StopAccess;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn ctx() -> LookupContext<'static> {
        LookupContext {
            level: RtLevel::Base,
            calendar: None,
            filter: &AllowAll,
            lookahead_days: 7,
        }
    }

    fn trip(stop_times: Vec<StopTime>) -> DiscreteTrip {
        DiscreteTrip {
            validity: ValidityLevels::uniform(ValidityPattern::days(0, 10)),
            stop_times,
            calendars: vec![],
            properties: VehicleProperties::default(),
        }
    }

    fn at(times: &[u32]) -> Vec<StopTime> {
        times.iter().map(|&t| StopTime::at(t)).collect()
    }

    /// Line 1 A -> B -> C, line 2 C -> D, footpath D -> E.
    fn network() -> (Network, Vec<StopIdx>) {
        let mut b = Network::builder(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let s: Vec<_> = ["A", "B", "C", "D", "E"].into_iter().map(|n| b.add_stop(n)).collect();
        let line1 = b.add_pattern(vec![s[0], s[1], s[2]]).unwrap();
        b.add_discrete_trip(line1, trip(at(&[8_000, 8_100, 8_200]))).unwrap();
        let line2 = b.add_pattern(vec![s[2], s[3]]).unwrap();
        b.add_discrete_trip(line2, trip(at(&[8_400, 8_700]))).unwrap();
        b.add_transfer(s[3], s[4], 60).unwrap();
        (b.build(), s)
    }

    fn scanner(net: &Network) -> RoundScanner<'_, Network> {
        RoundScanner::new(TripTimeLookup::new(net, ctx()), 120, ScanLimits::new(5))
    }

    fn builder(net: &Network) -> JourneyBuilder<'_, Network> {
        JourneyBuilder::new(net, ctx(), 120)
    }

    fn last_round(table: &RoundTable, stop: StopIdx) -> usize {
        (0..table.round_count())
            .rev()
            .find(|&r| table.label(r, stop).is_some())
            .unwrap()
    }

    fn single(net: &Network, from: StopIdx, to: StopIdx, at: u32) -> (RoundTable, Journey) {
        let result = scanner(net).run(from, to, TimeCode::new(0, at));
        let journey = builder(net)
            .from_rounds(&result.table, last_round(&result.table, to), to)
            .unwrap();
        (result.table, journey)
    }

    #[test]
    fn three_stop_direct_journey() {
        let (net, s) = network();
        let (_, journey) = single(&net, s[0], s[2], 7_999);

        assert_eq!(journey.leg_count(), 1);
        let leg = journey.legs().next().unwrap();
        assert_eq!(leg.board_stop(), s[0]);
        assert_eq!(leg.alight_stop(), s[2]);
        assert_eq!(leg.departure_time(), TimeCode::new(0, 8_000));
        assert_eq!(leg.arrival_time(), TimeCode::new(0, 8_200));
        assert_eq!(leg.intermediate_stops().len(), 1);
        assert_eq!(leg.run().trip, TripIdx(0));
    }

    #[test]
    fn boards_at_latest_connecting_stop() {
        let (net, s) = network();
        // Departing from B: the run is joined at B, not A
        let (_, journey) = single(&net, s[1], s[2], 8_000);
        let leg = journey.legs().next().unwrap();
        assert_eq!(leg.board_stop(), s[1]);
        assert_eq!(leg.board().position, Position(1));
    }

    #[test]
    fn change_then_walk_in_order() {
        let (net, s) = network();
        let (_, journey) = single(&net, s[0], s[4], 7_999);

        assert_eq!(journey.leg_count(), 2);
        assert_eq!(journey.change_count(), 1);
        assert_eq!(journey.origin(), s[0]);
        assert_eq!(journey.destination(), s[4]);
        assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_760));
        assert!(matches!(&journey.segments()[2], Segment::Walk(w) if w.from == s[3] && w.duration_secs == 60));
        assert!(journey.passes_through(s[1]));
    }

    #[test]
    fn respects_pick_up_flags_when_stepping_back() {
        let mut b = Network::builder(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let s: Vec<_> = ["A", "B", "C"].into_iter().map(|n| b.add_stop(n)).collect();
        let line = b.add_pattern(vec![s[0], s[1], s[2]]).unwrap();
        let mut times = at(&[8_000, 8_100, 8_200]);
        times[1] = times[1].no_pick_up();
        b.add_discrete_trip(line, trip(times)).unwrap();
        b.add_transfer(s[0], s[1], 30).unwrap();
        let net = b.build();

        // B is reached on foot in time, but the run can't be boarded there
        let (_, journey) = single(&net, s[0], s[2], 7_999);
        assert_eq!(journey.legs().next().unwrap().board_stop(), s[0]);
    }

    #[test]
    fn missing_label_is_an_error() {
        let (net, s) = network();
        let result = scanner(&net).run(s[0], s[2], TimeCode::new(0, 7_999));
        let err = builder(&net)
            .from_rounds(&result.table, 1, s[3])
            .unwrap_err();
        assert_eq!(err, BuildError::MissingLabel { round: 1, stop: s[3] });
    }

    #[test]
    fn multicriteria_follows_parents() {
        let (net, s) = network();
        let lookup = TripTimeLookup::new(&net, ctx());
        let result = McScanner::new(lookup, 120, None, ScanLimits::new(5)).run(s[0], s[4], TimeCode::new(0, 7_999));
        let (_, id) = result.table.destination_labels().next().unwrap();

        let journey = JourneyBuilder::new(&net, ctx(), 120)
            .from_label(&result.table, id)
            .unwrap();
        assert_eq!(journey.leg_count(), 2);
        assert_eq!(journey.departure_time(), TimeCode::new(0, 8_000));
        assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_760));
        assert_eq!(journey.travel_time_secs(), 200 + 300 + 60);
    }

    #[test]
    fn walk_leaves_from_the_ridden_stop() {
        // O -> Z by 100 then Z -> X on foot beats the ride to X at 200, but
        // Y is only reached by walking from the ride to X
        let mut b = Network::builder(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let s: Vec<_> = ["O", "X", "Y", "Z"].into_iter().map(|n| b.add_stop(n)).collect();
        let to_z = b.add_pattern(vec![s[0], s[3]]).unwrap();
        b.add_discrete_trip(to_z, trip(at(&[50, 100]))).unwrap();
        let to_x = b.add_pattern(vec![s[0], s[1]]).unwrap();
        b.add_discrete_trip(to_x, trip(at(&[60, 200]))).unwrap();
        b.add_transfer(s[3], s[1], 50).unwrap();
        b.add_transfer(s[1], s[2], 10).unwrap();
        let net = b.build();

        let (_, journey) = single(&net, s[0], s[2], 0);
        assert_eq!(journey.segments().len(), 2);
        let leg = journey.legs().next().unwrap();
        assert_eq!((leg.board_stop(), leg.alight_stop()), (s[0], s[1]));
        assert!(matches!(&journey.segments()[1], Segment::Walk(w) if w.from == s[1] && w.to == s[2]));
        assert_eq!(journey.arrival_time(), TimeCode::new(0, 210));
    }

    #[test]
    fn street_walks_wrap_the_journey() {
        let (net, s) = network();
        let result = scanner(&net).scan(&ScanQuery {
            sources: &[StopAccess::new(s[0], 45)],
            targets: &[StopAccess::new(s[2], 30)],
            instant: TimeCode::new(0, 7_900),
            bound: None,
            forbidden: &BTreeSet::new(),
        });
        let journey = builder(&net).from_rounds(&result.table, 1, s[2]).unwrap();

        assert_eq!(journey.access_secs(), 45);
        assert_eq!(journey.egress_secs(), 30);
        assert_eq!(journey.departure_time(), TimeCode::new(0, 7_955));
        assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_230));
    }

    #[test]
    fn backward_scan_rebuilds_in_travel_order() {
        let (net, s) = network();
        let result = scanner(&net)
            .with_direction(Direction::Backward)
            .run(s[4], s[0], TimeCode::new(0, 8_800));
        let table = &result.table;
        let journey = builder(&net)
            .from_rounds(table, last_round(table, s[0]), s[0])
            .unwrap();

        assert_eq!(journey.origin(), s[0]);
        assert_eq!(journey.destination(), s[4]);
        assert_eq!(journey.leg_count(), 2);
        let legs: Vec<_> = journey.legs().map(|l| (l.board_stop(), l.alight_stop())).collect();
        assert_eq!(legs, vec![(s[0], s[2]), (s[2], s[3])]);
        assert_eq!(journey.departure_time(), TimeCode::new(0, 8_000));
        // The walk to E is taken as late as the deadline allows
        assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_800));
    }

    #[test]
    fn backward_scan_alights_where_the_next_label_is_met() {
        let (net, s) = network();
        let result = scanner(&net)
            .with_direction(Direction::Backward)
            .run(s[1], s[0], TimeCode::new(0, 8_150));
        let journey = builder(&net).from_rounds(&result.table, 1, s[0]).unwrap();

        let leg = journey.legs().next().unwrap();
        assert_eq!(leg.alight_stop(), s[1]);
        assert_eq!(leg.alight().position, Position(1));
    }
}
