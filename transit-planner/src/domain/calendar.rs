//! Service-day validity.
//!
//! Each trip runs on a set of days counted from the network epoch. The set is
//! stored as a bitset, and a trip carries one bitset per realtime level so a
//! query can choose between the published schedule and its adapted or
//! realtime variants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which precomputed validity a query consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtLevel {
    /// The published schedule.
    #[default]
    Base,
    /// The schedule with planned disruptions applied.
    Adapted,
    /// The schedule with realtime updates applied.
    RealTime,
}

impl RtLevel {
    /// All levels, in storage order.
    pub const ALL: [RtLevel; 3] = [RtLevel::Base, RtLevel::Adapted, RtLevel::RealTime];

    fn slot(self) -> usize {
        match self {
            RtLevel::Base => 0,
            RtLevel::Adapted => 1,
            RtLevel::RealTime => 2,
        }
    }
}

/// A set of service days.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::ValidityPattern;
///
/// let mut vp = ValidityPattern::new();
/// vp.set(0);
/// vp.set(70);
/// assert!(vp.check(0));
/// assert!(!vp.check(1));
/// assert!(vp.check(70));
/// assert!(!vp.check(1_000));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityPattern {
    words: Vec<u64>,
}

impl ValidityPattern {
    /// An empty pattern (valid on no day).
    pub fn new() -> Self {
        Self::default()
    }

    /// A pattern valid on every day of `[first, first + count)`.
    pub fn days(first: u32, count: u32) -> Self {
        let mut vp = Self::new();
        for day in first..first.saturating_add(count) {
            vp.set(day);
        }
        vp
    }

    /// A pattern valid on each listed day.
    pub fn from_days(days: impl IntoIterator<Item = u32>) -> Self {
        let mut vp = Self::new();
        for day in days {
            vp.set(day);
        }
        vp
    }

    /// Mark `day` as valid.
    pub fn set(&mut self, day: u32) {
        let (word, bit) = Self::locate(day);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    /// Mark `day` as not valid.
    pub fn clear(&mut self, day: u32) {
        let (word, bit) = Self::locate(day);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1 << bit);
        }
    }

    /// Is the pattern valid on `day`?
    pub fn check(&self, day: u32) -> bool {
        let (word, bit) = Self::locate(day);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    /// Is the pattern valid on no day at all?
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    fn locate(day: u32) -> (usize, u32) {
        ((day / 64) as usize, day % 64)
    }
}

impl fmt::Debug for ValidityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<usize> = self
            .words
            .iter()
            .enumerate()
            .flat_map(|(i, w)| (0..64).filter(move |b| w & (1u64 << b) != 0).map(move |b| i * 64 + b))
            .collect();
        f.debug_tuple("ValidityPattern").field(&days).finish()
    }
}

/// One validity pattern per realtime level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityLevels {
    levels: [ValidityPattern; 3],
}

impl ValidityLevels {
    /// Use the same pattern on every level.
    pub fn uniform(pattern: ValidityPattern) -> Self {
        Self {
            levels: [pattern.clone(), pattern.clone(), pattern],
        }
    }

    /// Pattern consulted at `level`.
    pub fn get(&self, level: RtLevel) -> &ValidityPattern {
        &self.levels[level.slot()]
    }

    /// Replace the pattern for one level.
    pub fn set(&mut self, level: RtLevel, pattern: ValidityPattern) {
        self.levels[level.slot()] = pattern;
    }

    /// Is the trip valid on `day` at `level`?
    pub fn check(&self, level: RtLevel, day: u32) -> bool {
        self.get(level).check(day)
    }
}

/// Name of a calendar a query may restrict itself to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarId(pub String);

impl CalendarId {
    /// Create a calendar id.
    pub fn new(id: impl Into<String>) -> Self {
        CalendarId(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
