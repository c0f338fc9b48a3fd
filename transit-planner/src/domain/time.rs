//! Absolute instants for timetable routing.
//!
//! Timetables express stop times as seconds since the service day's midnight,
//! and those offsets routinely run past 24:00 for overnight trips. A `TimeCode`
//! pins an instant to a day index (relative to the network epoch) plus a
//! normalized second within that day, so instants on different days compare
//! correctly.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Number of seconds in a service day.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Fold a `(day, seconds)` pair so that `seconds < SECONDS_PER_DAY`.
///
/// Any number of whole days held in `seconds` is carried into `day`. A day
/// past `u32::MAX` is a caller bug: debug builds panic, release builds
/// saturate. Use [`TimeCode::checked_add_seconds`] where that can happen.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::normalize;
///
/// assert_eq!(normalize(0, 8_000), (0, 8_000));
/// assert_eq!(normalize(0, 86_400), (1, 0));
/// assert_eq!(normalize(2, 3 * 86_400 + 5), (5, 5));
/// ```
pub fn normalize(day: u32, seconds: u64) -> (u32, u32) {
    let per_day = u64::from(SECONDS_PER_DAY);
    let carried = seconds / per_day;
    let day = u64::from(day) + carried;
    debug_assert!(day <= u64::from(u32::MAX), "day {day} overflows the time axis");
    let day = u32::try_from(day).unwrap_or(u32::MAX);
    (day, (seconds % per_day) as u32)
}

/// An absolute instant: a day offset from the network epoch and a
/// second within that day.
///
/// Every constructor normalizes, so `seconds()` is always below
/// [`SECONDS_PER_DAY`] and the derived ordering is lexicographic on
/// `(day, seconds)`.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::TimeCode;
///
/// let t = TimeCode::new(0, 90_000);
/// assert_eq!(t.day(), 1);
/// assert_eq!(t.seconds(), 3_600);
/// assert!(TimeCode::new(0, 86_399) < t);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeCode {
    day: u32,
    seconds: u32,
}

impl TimeCode {
    /// The largest representable instant.
    pub const MAX: TimeCode = TimeCode {
        day: u32::MAX,
        seconds: SECONDS_PER_DAY - 1,
    };

    /// Create an instant, folding surplus seconds into the day.
    pub fn new(day: u32, seconds: u32) -> Self {
        let (day, seconds) = normalize(day, u64::from(seconds));
        Self { day, seconds }
    }

    /// Create an instant from seconds elapsed since the epoch's midnight.
    pub fn from_total_seconds(total: u64) -> Self {
        let (day, seconds) = normalize(0, total);
        Self { day, seconds }
    }

    /// Day offset from the network epoch.
    pub fn day(&self) -> u32 {
        self.day
    }

    /// Second within the day (always below 86 400).
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Seconds elapsed since the epoch's midnight.
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.day) * u64::from(SECONDS_PER_DAY) + u64::from(self.seconds)
    }

    /// Add a number of seconds, rolling over midnight as often as needed.
    pub fn add_seconds(&self, secs: u32) -> Self {
        let (day, seconds) = normalize(self.day, u64::from(self.seconds) + u64::from(secs));
        Self { day, seconds }
    }

    /// Add a number of seconds; `None` if the result is past [`TimeCode::MAX`].
    pub fn checked_add_seconds(&self, secs: u32) -> Option<Self> {
        let total = self.total_seconds() + u64::from(secs);
        (total <= TimeCode::MAX.total_seconds()).then(|| Self::from_total_seconds(total))
    }

    /// Subtract a number of seconds; `None` if the result precedes the epoch.
    pub fn checked_sub_seconds(&self, secs: u32) -> Option<Self> {
        self.total_seconds()
            .checked_sub(u64::from(secs))
            .map(Self::from_total_seconds)
    }

    /// Signed number of seconds from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: TimeCode) -> i64 {
        self.total_seconds() as i64 - earlier.total_seconds() as i64
    }

    /// Converts to a calendar date-time given the date of day 0.
    pub fn to_datetime(&self, epoch: NaiveDate) -> Option<NaiveDateTime> {
        let date = epoch.checked_add_signed(Duration::days(i64::from(self.day)))?;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(self.seconds, 0)?;
        Some(date.and_time(time))
    }
}

impl fmt::Debug for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeCode(d{} {})", self.day, Hms(self.seconds))
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}+{}", self.day, Hms(self.seconds))
    }
}

struct Hms(u32);

impl fmt::Display for Hms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 / 60) % 60;
        let s = self.0 % 60;
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}
