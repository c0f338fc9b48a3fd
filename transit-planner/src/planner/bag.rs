//! Pareto label sets for multicriteria search.
//!
//! A label is compared on arrival instant, accumulated travel time and a
//! via score (0 once the required via stop has been passed). Labels live in
//! a query-scoped [`LabelArena`] and point at their parent by [`LabelId`].

use crate::domain::{PatternIdx, Position, StopIdx, TimeCode, TripRun};

/// Criteria of a multicriteria label, all minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Criteria {
    pub arrival: TimeCode,
    /// Seconds spent riding or walking.
    pub travel_secs: u32,
    /// 0 once the via stop is passed (always 0 without a via stop).
    pub via: u8,
}

impl Criteria {
    /// At least as good everywhere.
    pub fn weakly_dominates(&self, other: &Criteria) -> bool {
        self.arrival <= other.arrival && self.travel_secs <= other.travel_secs && self.via <= other.via
    }

    /// At least as good everywhere and strictly better somewhere.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::TimeCode;
    /// use transit_planner::planner::Criteria;
    ///
    /// let passed = Criteria { arrival: TimeCode::new(0, 100), travel_secs: 50, via: 0 };
    /// let missed = Criteria { via: 1, ..passed };
    /// assert!(passed.dominates(&missed));
    /// assert!(!missed.dominates(&passed));
    /// assert!(!passed.dominates(&passed));
    /// ```
    pub fn dominates(&self, other: &Criteria) -> bool {
        self.weakly_dominates(other) && self != other
    }

    /// Strictly better than `other` on some criterion.
    fn beats_somewhere(&self, other: &Criteria) -> bool {
        self.arrival < other.arrival || self.travel_secs < other.travel_secs || self.via < other.via
    }

    fn component_min(&self, other: &Criteria) -> Criteria {
        Criteria {
            arrival: self.arrival.min(other.arrival),
            travel_secs: self.travel_secs.min(other.travel_secs),
            via: self.via.min(other.via),
        }
    }
}

/// Index of a label in a [`LabelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub usize);

/// How a label's stop was reached from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McStep {
    /// Scan source, `walk_secs` from the traveller.
    Access { walk_secs: u32 },
    Ride {
        pattern: PatternIdx,
        run: TripRun,
        board: Position,
        alight: Position,
    },
    Transfer {
        from: StopIdx,
        duration_secs: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McLabel {
    pub stop: StopIdx,
    pub criteria: Criteria,
    pub parent: Option<LabelId>,
    pub step: McStep,
}

impl McLabel {
    /// Earliest instant a vehicle may be boarded from this label.
    pub fn ready_time(&self, min_connection_secs: u32) -> TimeCode {
        match self.step {
            McStep::Ride { .. } => self.criteria.arrival.add_seconds(min_connection_secs),
            McStep::Access { .. } | McStep::Transfer { .. } => self.criteria.arrival,
        }
    }
}

/// Append-only label storage for one query.
#[derive(Debug, Clone, Default)]
pub struct LabelArena {
    labels: Vec<McLabel>,
}

impl LabelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: McLabel) -> LabelId {
        self.labels.push(label);
        LabelId(self.labels.len() - 1)
    }

    pub fn get(&self, id: LabelId) -> &McLabel {
        &self.labels[id.0]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels from `id` back to the query origin.
    pub fn ancestry(&self, id: LabelId) -> impl Iterator<Item = (LabelId, &McLabel)> {
        std::iter::successors(Some(id), |&cur| self.get(cur).parent).map(|cur| (cur, self.get(cur)))
    }
}

/// A set of mutually non-dominated entries.
///
/// Adding an entry never filters the list it is iterating: surviving
/// entries are collected first, then the list is rebuilt.
#[derive(Debug, Clone)]
pub struct Bag<T = LabelId> {
    entries: Vec<(Criteria, T)>,
    envelope: Option<Criteria>,
}

impl<T> Default for Bag<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            envelope: None,
        }
    }
}

impl<T: Copy> Bag<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Criteria, T)> {
        self.entries.iter()
    }

    /// Componentwise minimum of every entry.
    pub fn envelope(&self) -> Option<Criteria> {
        self.envelope
    }

    /// Is some entry at least as good as `candidate` everywhere?
    pub fn weakly_dominates(&self, candidate: &Criteria) -> bool {
        match self.envelope {
            Some(env) if !candidate.beats_somewhere(&env) => {
                self.entries.iter().any(|(c, _)| c.weakly_dominates(candidate))
            }
            // Better than the envelope somewhere: nothing can dominate it
            _ => false,
        }
    }

    /// Insert `item` unless an entry weakly dominates it; drop the entries
    /// it dominates. Returns whether the bag changed.
    pub fn add(&mut self, criteria: Criteria, item: T) -> bool {
        if self.weakly_dominates(&criteria) {
            return false;
        }

        let mut retained: Vec<(Criteria, T)> = self
            .entries
            .iter()
            .filter(|(c, _)| !criteria.dominates(c))
            .copied()
            .collect();
        retained.push((criteria, item));

        self.envelope = retained
            .iter()
            .map(|(c, _)| *c)
            .reduce(|a, b| a.component_min(&b));
        self.entries = retained;
        true
    }

    /// Add every entry of `other`. Returns whether the bag changed.
    pub fn merge(&mut self, other: &Bag<T>) -> bool {
        let mut changed = false;
        for &(criteria, item) in &other.entries {
            changed |= self.add(criteria, item);
        }
        changed
    }

    /// Rebuild the bag with every entry mapped to new criteria.
    pub fn remap(&self, mut f: impl FnMut(&Criteria, &T) -> Option<(Criteria, T)>) -> Bag<T> {
        let mut rebuilt = Bag::new();
        for (criteria, item) in &self.entries {
            if let Some((c, t)) = f(criteria, item) {
                rebuilt.add(c, t);
            }
        }
        rebuilt
    }
}
