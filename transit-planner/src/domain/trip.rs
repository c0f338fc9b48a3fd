//! Trip types.
//!
//! A trip is either a discrete scheduled run with one stop time per pattern
//! stop, or a frequency-based service that repeats a template every
//! `headway` seconds inside a departure window.

use serde::{Deserialize, Serialize};

use super::{CalendarId, RtLevel, SECONDS_PER_DAY, TimeCode, TripIdx, ValidityLevels};

/// Arrival and departure offsets at one pattern stop.
///
/// For a discrete trip the offsets are seconds since the service day's
/// midnight and may exceed 86 400 for overnight runs. For a frequency trip
/// they are relative to the trip's departure from its first stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTime {
    pub arrival: u32,
    pub departure: u32,
    /// Passengers may board here.
    pub pick_up: bool,
    /// Passengers may alight here.
    pub drop_off: bool,
}

impl StopTime {
    /// A stop time allowing both boarding and alighting.
    pub fn new(arrival: u32, departure: u32) -> Self {
        Self {
            arrival,
            departure,
            pick_up: true,
            drop_off: true,
        }
    }

    /// A stop time where arrival and departure coincide.
    pub fn at(time: u32) -> Self {
        Self::new(time, time)
    }

    /// Forbid boarding at this stop.
    pub fn no_pick_up(mut self) -> Self {
        self.pick_up = false;
        self
    }

    /// Forbid alighting at this stop.
    pub fn no_drop_off(mut self) -> Self {
        self.drop_off = false;
        self
    }

    /// Does this stop time satisfy the requested boarding/alighting flags?
    pub fn allows(&self, need_board: bool, need_alight: bool) -> bool {
        (!need_board || self.pick_up) && (!need_alight || self.drop_off)
    }
}

/// Accessibility properties of the vehicle running a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleProperties {
    pub wheelchair_accessible: bool,
    pub bike_accepted: bool,
}

impl VehicleProperties {
    /// Does this vehicle offer everything `required` asks for?
    pub fn satisfies(&self, required: &VehicleProperties) -> bool {
        (!required.wheelchair_accessible || self.wheelchair_accessible)
            && (!required.bike_accepted || self.bike_accepted)
    }
}

/// A trip with fixed stop times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteTrip {
    pub validity: ValidityLevels,
    pub stop_times: Vec<StopTime>,
    pub calendars: Vec<CalendarId>,
    pub properties: VehicleProperties,
}

/// A trip repeated every `headway` seconds.
///
/// `start` and `end` bound the departures from the first stop, both
/// inclusive, in seconds since the service day's midnight. `end` may exceed
/// 86 400 when the window runs past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTrip {
    pub start: u32,
    pub end: u32,
    pub headway: u32,
    pub validity: ValidityLevels,
    /// Offsets relative to the departure from the first stop.
    pub stop_times: Vec<StopTime>,
    pub calendars: Vec<CalendarId>,
    pub properties: VehicleProperties,
}

impl FrequencyTrip {
    /// Inclusive window of visits at a stop whose template offset is
    /// `offset`, in seconds since the service day's midnight.
    pub fn window(&self, offset: u32) -> (u32, u32) {
        (self.start + offset, self.end + offset)
    }

    /// Whole days past the service day that the window at `offset` reaches.
    pub fn span_days(&self, offset: u32) -> u32 {
        (self.end + offset) / SECONDS_PER_DAY
    }

    /// First-stop departure of the instance visiting a stop (template
    /// offset `offset`) at `seconds` since the service midnight.
    pub fn shift_for(&self, seconds: u32, offset: u32) -> u32 {
        seconds - offset
    }
}

/// A scheduled or frequency-based trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trip {
    Discrete(DiscreteTrip),
    Frequency(FrequencyTrip),
}

impl Trip {
    /// Stop times, one per pattern stop.
    pub fn stop_times(&self) -> &[StopTime] {
        match self {
            Trip::Discrete(t) => &t.stop_times,
            Trip::Frequency(t) => &t.stop_times,
        }
    }

    /// Validity patterns for every realtime level.
    pub fn validity(&self) -> &ValidityLevels {
        match self {
            Trip::Discrete(t) => &t.validity,
            Trip::Frequency(t) => &t.validity,
        }
    }

    /// Calendars this trip is associated with.
    pub fn calendars(&self) -> &[CalendarId] {
        match self {
            Trip::Discrete(t) => &t.calendars,
            Trip::Frequency(t) => &t.calendars,
        }
    }

    pub fn properties(&self) -> &VehicleProperties {
        match self {
            Trip::Discrete(t) => &t.properties,
            Trip::Frequency(t) => &t.properties,
        }
    }

    pub fn is_frequency(&self) -> bool {
        matches!(self, Trip::Frequency(_))
    }

    /// Does the trip run on service day `day` at `level`?
    pub fn runs_on(&self, level: RtLevel, day: u32) -> bool {
        self.validity().check(level, day)
    }
}

/// A concrete run of a trip: the trip, the service day it belongs to, and
/// the first-stop departure shift of a frequency instance (0 for discrete
/// trips).
///
/// # Examples
///
/// ```
/// use transit_planner::domain::{StopTime, TimeCode, TripIdx, TripRun};
///
/// let run = TripRun::discrete(TripIdx(0), 3);
/// let st = StopTime::at(90_000);
/// assert_eq!(run.departure(&st), TimeCode::new(4, 3_600));
///
/// let freq = TripRun::frequency(TripIdx(1), 0, 6_300);
/// assert_eq!(freq.arrival(&StopTime::at(120)), TimeCode::new(0, 6_420));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripRun {
    pub trip: TripIdx,
    pub service_day: u32,
    pub shift: u32,
}

impl TripRun {
    pub fn discrete(trip: TripIdx, service_day: u32) -> Self {
        Self {
            trip,
            service_day,
            shift: 0,
        }
    }

    pub fn frequency(trip: TripIdx, service_day: u32, shift: u32) -> Self {
        Self {
            trip,
            service_day,
            shift,
        }
    }

    /// Absolute instant of an offset along this run.
    pub fn at_offset(&self, offset: u32) -> TimeCode {
        TimeCode::new(self.service_day, self.shift + offset)
    }

    pub fn departure(&self, st: &StopTime) -> TimeCode {
        self.at_offset(st.departure)
    }

    pub fn arrival(&self, st: &StopTime) -> TimeCode {
        self.at_offset(st.arrival)
    }
}

/// Service day on which a run must operate for one of its stop times to
/// fall on `day`, given the offset `offset` past its service midnight.
pub(crate) fn service_day_for(day: u32, offset: u32) -> Option<u32> {
    day.checked_sub(offset / SECONDS_PER_DAY)
}
