//! Journey ranking for search results.
//!
//! Built journeys are filtered to the Pareto-optimal ones, de-duplicated,
//! and ordered to present the most useful options first. Depart-at queries
//! judge a journey by its arrival; arrive-by queries by its departure.

use std::cmp::Ordering;

use crate::domain::{Journey, StopIdx, TimeCode};

use super::raptor::Direction;

/// What a journey is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JourneyScore {
    pub direction: Direction,
    /// Minimized going forward.
    pub arrival: TimeCode,
    /// Maximized going backward.
    pub departure: TimeCode,
    pub changes: usize,
    /// Riding and walking time, waits excluded.
    pub travel_secs: u64,
    /// Set when a via stop was requested and the journey doesn't pass it.
    pub misses_via: bool,
}

impl JourneyScore {
    pub fn of(journey: &Journey, via: Option<StopIdx>, direction: Direction) -> Self {
        Self {
            direction,
            arrival: journey.arrival_time(),
            departure: journey.departure_time(),
            changes: journey.change_count(),
            travel_secs: journey.travel_time_secs(),
            misses_via: via.is_some_and(|v| !journey.passes_through(v)),
        }
    }

    /// `Less` when `self` has the better time.
    fn timing(&self, other: &JourneyScore) -> Ordering {
        match self.direction {
            Direction::Forward => self.arrival.cmp(&other.arrival),
            Direction::Backward => other.departure.cmp(&self.departure),
        }
    }

    /// At least as good everywhere and strictly better somewhere.
    pub fn dominates(&self, other: &JourneyScore) -> bool {
        let timing = self.timing(other);
        let no_worse = timing != Ordering::Greater
            && self.changes <= other.changes
            && self.travel_secs <= other.travel_secs
            && self.misses_via <= other.misses_via;
        let better = timing == Ordering::Less
            || self.changes < other.changes
            || self.travel_secs < other.travel_secs
            || self.misses_via < other.misses_via;
        no_worse && better
    }

    fn preference(&self, other: &JourneyScore) -> Ordering {
        self.timing(other)
            .then(self.changes.cmp(&other.changes))
            .then(self.misses_via.cmp(&other.misses_via))
            .then(self.travel_secs.cmp(&other.travel_secs))
    }
}

/// Rank journeys by preference.
///
/// Journeys are ranked by:
/// 1. Arrival time, earlier first (departure time, later first, when
///    searching backward)
/// 2. Number of changes (fewer is better)
/// 3. Passing the via stop, if one was requested
/// 4. Travel time (shorter is better)
///
/// Returns journeys sorted best-first.
pub fn rank_journeys(mut journeys: Vec<Journey>, via: Option<StopIdx>, direction: Direction) -> Vec<Journey> {
    journeys.sort_by(|a, b| JourneyScore::of(a, via, direction).preference(&JourneyScore::of(b, via, direction)));
    journeys
}

/// Remove dominated journeys.
///
/// A journey is dominated if another journey is no worse on every field of
/// its [`JourneyScore`] and strictly better on one.
pub fn remove_dominated(journeys: Vec<Journey>, via: Option<StopIdx>, direction: Direction) -> Vec<Journey> {
    if journeys.len() <= 1 {
        return journeys;
    }

    let mut result: Vec<(JourneyScore, Journey)> = Vec::with_capacity(journeys.len());

    for journey in journeys {
        let score = JourneyScore::of(&journey, via, direction);
        if result.iter().any(|(existing, _)| existing.dominates(&score)) {
            continue;
        }
        result.retain(|(existing, _)| !score.dominates(existing));
        result.push((score, journey));
    }

    result.into_iter().map(|(_, journey)| journey).collect()
}

/// Deduplicate journeys that are effectively identical.
///
/// Two journeys are duplicates if they depart and arrive at the same
/// instants with the same number of changes. The one with the shortest
/// travel time is kept.
pub fn deduplicate(mut journeys: Vec<Journey>) -> Vec<Journey> {
    if journeys.len() <= 1 {
        return journeys;
    }

    journeys.sort_by_key(|j| (j.arrival_time(), j.departure_time(), j.change_count(), j.travel_time_secs()));

    let mut result = Vec::with_capacity(journeys.len());
    let mut last_key = None;

    for journey in journeys {
        let key = (journey.arrival_time(), journey.departure_time(), journey.change_count());
        if last_key != Some(key) {
            result.push(journey);
            last_key = Some(key);
        }
    }

    result
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{Leg, PatternIdx, Position, Segment, StopEvent, TripIdx, TripRun};
    use proptest::prelude::*;

    fn leg(id: usize, from: usize, to: usize, dep: u32, arr: u32) -> Segment {
        let events = vec![
            StopEvent::new(StopIdx(from), Position(0), TimeCode::new(0, dep)),
            StopEvent::new(StopIdx(to), Position(1), TimeCode::new(0, arr)),
        ];
        Segment::Ride(Leg::new(PatternIdx(id), TripRun::discrete(TripIdx(id), 0), events).unwrap())
    }

    /// Strategy for a direct journey 0 -> 2 in whole minutes
    fn direct_strategy() -> impl Strategy<Value = Journey> {
        (0usize..1000, 0u32..1380, 10u32..120).prop_map(|(id, dep, duration)| {
            Journey::new(vec![leg(id, 0, 2, dep * 60, (dep + duration) * 60)]).unwrap()
        })
    }

    /// Strategy for a journey 0 -> 1 -> 2 with one change
    fn change_strategy() -> impl Strategy<Value = Journey> {
        (0usize..1000, 0u32..1200, 15u32..60, 5u32..30, 15u32..60).prop_map(|(id, dep, d1, wait, d2)| {
            let arr1 = dep + d1;
            let dep2 = arr1 + wait;
            Journey::new(vec![
                leg(id, 0, 1, dep * 60, arr1 * 60),
                leg(id + 1000, 1, 2, dep2 * 60, (dep2 + d2) * 60),
            ])
            .unwrap()
        })
    }

    fn journey_with_changes_strategy(change_bias: f64) -> impl Strategy<Value = Journey> {
        prop::bool::weighted(change_bias).prop_flat_map(|has_change| {
            if has_change {
                change_strategy().boxed()
            } else {
                direct_strategy().boxed()
            }
        })
    }

    /// Lists of journeys, fuzzing over the share of changes
    fn journeys_strategy() -> impl Strategy<Value = Vec<Journey>> {
        (0.0f64..1.0).prop_flat_map(|change_bias| {
            prop::collection::vec(journey_with_changes_strategy(change_bias), 0..15)
        })
    }

    fn via_strategy() -> impl Strategy<Value = Option<StopIdx>> {
        prop::option::of((0usize..3).prop_map(StopIdx))
    }

    proptest! {
        #[test]
        fn rank_journeys_is_sorted(journeys in journeys_strategy(), via in via_strategy()) {
            let ranked = rank_journeys(journeys, via, Direction::Forward);

            for window in ranked.windows(2) {
                let a = JourneyScore::of(&window[0], via, Direction::Forward);
                let b = JourneyScore::of(&window[1], via, Direction::Forward);
                let a_key = (a.arrival, a.changes, a.misses_via, a.travel_secs);
                let b_key = (b.arrival, b.changes, b.misses_via, b.travel_secs);
                prop_assert!(a_key <= b_key, "Not sorted: {:?} should come before {:?}", a_key, b_key);
            }
        }

        #[test]
        fn rank_journeys_preserves_elements(journeys in journeys_strategy()) {
            let original_len = journeys.len();
            let ranked = rank_journeys(journeys, None, Direction::Forward);

            prop_assert_eq!(ranked.len(), original_len);
        }

        #[test]
        fn remove_dominated_no_internal_domination(journeys in journeys_strategy(), via in via_strategy()) {
            let result = remove_dominated(journeys, via, Direction::Forward);

            for (i, a) in result.iter().enumerate() {
                for (j, b) in result.iter().enumerate() {
                    if i != j {
                        prop_assert!(
                            !JourneyScore::of(a, via, Direction::Forward).dominates(&JourneyScore::of(b, via, Direction::Forward)),
                            "Journey {} dominates journey {} in result",
                            i,
                            j
                        );
                    }
                }
            }
        }

        #[test]
        fn remove_dominated_keeps_every_undominated(journeys in journeys_strategy()) {
            let scores: Vec<_> = journeys.iter().map(|j| JourneyScore::of(j, None, Direction::Forward)).collect();
            let result = remove_dominated(journeys.clone(), None, Direction::Forward);

            for (journey, score) in journeys.iter().zip(&scores) {
                if !scores.iter().any(|other| other.dominates(score)) {
                    prop_assert!(result.iter().any(|kept| JourneyScore::of(kept, None, Direction::Forward) == *score));
                } else {
                    prop_assert!(!result.contains(journey));
                }
            }
        }

        #[test]
        fn deduplicate_leaves_unique_keys(journeys in journeys_strategy()) {
            let result = deduplicate(journeys);
            let mut keys: Vec<_> = result
                .iter()
                .map(|j| (j.arrival_time(), j.departure_time(), j.change_count()))
                .collect();
            let before = keys.len();
            keys.dedup();
            prop_assert_eq!(keys.len(), before);
        }
    }

    // Test with instrumentation to verify we hit dominated cases
    #[test]
    fn remove_dominated_distribution() {
        use proptest::test_runner::{Config, TestRunner};
        use std::cell::Cell;

        let mut runner = TestRunner::new(Config::with_cases(500));
        let dominated_removed_count = Cell::new(0u32);
        let total_tests = Cell::new(0u32);

        let _ = runner.run(&journeys_strategy(), |journeys| {
            let original_len = journeys.len();
            let result = remove_dominated(journeys, None, Direction::Forward);

            if result.len() < original_len {
                dominated_removed_count.set(dominated_removed_count.get() + 1);
            }
            total_tests.set(total_tests.get() + 1);
            Ok(())
        });

        assert!(
            dominated_removed_count.get() > 0 || total_tests.get() < 10,
            "Never removed dominated journeys in {} tests",
            total_tests.get()
        );
    }
}
