//! Shared fixtures for integration tests.

use chrono::NaiveDate;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use transit_planner::domain::{
    DiscreteTrip, FrequencyTrip, StopIdx, StopTime, ValidityLevels, ValidityPattern, VehicleProperties,
};
use transit_planner::network::Network;

/// Route this test's events to the test output, filtered by `RUST_LOG`.
#[must_use]
pub fn init_test_logger() -> DefaultGuard {
    let default_level = LevelFilter::DEBUG;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_level.to_string());
    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(filter)
        .set_default()
}

pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

pub fn trip(times: &[u32]) -> DiscreteTrip {
    DiscreteTrip {
        validity: ValidityLevels::uniform(ValidityPattern::days(0, 60)),
        stop_times: times.iter().map(|&t| StopTime::at(t)).collect(),
        calendars: vec![],
        properties: VehicleProperties::default(),
    }
}

/// A small city: two crossing lines, a shuttle every 10 minutes and a
/// footpath between the two central platforms.
///
/// ```text
/// West - Centre-1 - East          (line 1, every 30 min from 07:00)
/// North - Centre-2 - South        (line 2, every 30 min from 07:10)
/// Centre-2 <-> Centre-1           (120 s footpath)
/// East - Airport                  (shuttle 06:00-23:00 every 600 s)
/// ```
pub struct City {
    pub network: Network,
    pub west: StopIdx,
    pub centre1: StopIdx,
    pub east: StopIdx,
    pub north: StopIdx,
    pub centre2: StopIdx,
    pub south: StopIdx,
    pub airport: StopIdx,
}

pub fn city() -> City {
    let mut b = Network::builder(epoch());
    let west = b.add_stop("West");
    let centre1 = b.add_stop("Centre-1");
    let east = b.add_stop("East");
    let north = b.add_stop("North");
    let centre2 = b.add_stop("Centre-2");
    let south = b.add_stop("South");
    let airport = b.add_stop("Airport");

    let line1 = b.add_pattern(vec![west, centre1, east]).unwrap();
    let line2 = b.add_pattern(vec![north, centre2, south]).unwrap();
    for k in 0..30 {
        let t = 25_200 + k * 1_800;
        b.add_discrete_trip(line1, trip(&[t, t + 600, t + 1_200])).unwrap();
        let t = t + 600;
        b.add_discrete_trip(line2, trip(&[t, t + 900, t + 1_500])).unwrap();
    }

    let shuttle = b.add_pattern(vec![east, airport]).unwrap();
    b.add_frequency_trip(
        shuttle,
        FrequencyTrip {
            start: 21_600,
            end: 82_800,
            headway: 600,
            validity: ValidityLevels::uniform(ValidityPattern::days(0, 60)),
            stop_times: vec![StopTime::at(0), StopTime::at(900)],
            calendars: vec![],
            properties: VehicleProperties::default(),
        },
    )
    .unwrap();

    b.add_stop_area(&[centre1, centre2], 120).unwrap();

    City {
        network: b.build(),
        west,
        centre1,
        east,
        north,
        centre2,
        south,
        airport,
    }
}
