//! End-to-end tests of the router over small networks.

use super::*;
use crate::cache::DayTimelineCache;
use crate::domain::{
    CalendarId, DiscreteTrip, FrequencyTrip, Journey, Leg, RtLevel, Segment, StopIdx, StopTime, TimeCode, Trip,
    ValidityLevels, ValidityPattern, VehicleProperties,
};
use crate::network::{Network, NetworkBuilder, TransitData};
use chrono::NaiveDate;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn every_day() -> ValidityLevels {
    ValidityLevels::uniform(ValidityPattern::days(0, 30))
}

fn trip(times: &[u32]) -> DiscreteTrip {
    DiscreteTrip {
        validity: every_day(),
        stop_times: times.iter().map(|&t| StopTime::at(t)).collect(),
        calendars: vec![],
        properties: VehicleProperties::default(),
    }
}

fn stops(b: &mut NetworkBuilder, names: &[&str]) -> Vec<StopIdx> {
    names.iter().map(|n| b.add_stop(*n)).collect()
}

fn route(net: &Network, from: StopIdx, to: StopIdx, secs: u32, options: RouteOptions) -> RouteResponse {
    Router::new(net, SearchConfig::default())
        .route(&RouteRequest::new(from, to, epoch(), secs).with_options(options))
        .unwrap()
}

fn only_leg(journey: &Journey) -> &Leg {
    assert_eq!(journey.leg_count(), 1);
    journey.legs().next().unwrap()
}

#[test]
fn three_stop_line_end_to_end() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B", "C"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_100, 8_200])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[2], 7_999, RouteOptions::default());

    assert_eq!(response.outcome, SearchOutcome::Complete);
    assert_eq!(response.journeys.len(), 1);
    let journey = &response.journeys[0];
    assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_200));
    let leg = only_leg(journey);
    assert_eq!(leg.departure_time(), TimeCode::new(0, 8_000));
    assert_eq!(leg.intermediate_stops()[0].stop, s[1]);
    assert_eq!(leg.intermediate_stops()[0].time, TimeCode::new(0, 8_100));
}

#[test]
fn departure_after_last_trip_rolls_to_next_day() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_200])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[1], 8_001, RouteOptions::default());
    let leg = only_leg(&response.journeys[0]);
    assert_eq!(leg.departure_time(), TimeCode::new(1, 8_000));
    assert_eq!(leg.run().service_day, 1);
}

#[test]
fn frequency_trip_boards_next_grid_departure() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["F", "G"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_frequency_trip(
        line,
        FrequencyTrip {
            start: 6_000,
            end: 7_000,
            headway: 300,
            validity: every_day(),
            stop_times: vec![StopTime::at(0), StopTime::at(600)],
            calendars: vec![],
            properties: VehicleProperties::default(),
        },
    )
    .unwrap();
    let net = b.build();

    let leg_at = |secs| {
        let response = route(&net, s[0], s[1], secs, RouteOptions::default());
        *only_leg(&response.journeys[0]).board()
    };

    assert_eq!(leg_at(6_001).time, TimeCode::new(0, 6_300));
    assert_eq!(leg_at(7_000).time, TimeCode::new(0, 7_000));
    assert_eq!(leg_at(7_001).time, TimeCode::new(1, 6_000));

    let response = route(&net, s[0], s[1], 6_001, RouteOptions::default());
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(0, 6_900));
}

#[test]
fn overnight_trip_arrives_next_day() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["Night", "Dawn"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[85_000, 90_000])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[1], 84_000, RouteOptions::default());
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(1, 3_600));
}

#[test]
fn boards_overnight_run_of_previous_service_day() {
    // Service day 0's run reaches B at 25:00; querying day 1 at 00:30 from B
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B", "C"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[85_000, 90_000, 91_000])).unwrap();
    let net = b.build();

    let date = epoch().succ_opt().unwrap();
    let response = Router::new(&net, SearchConfig::default())
        .route(&RouteRequest::new(s[1], s[2], date, 1_800))
        .unwrap();
    let leg = only_leg(&response.journeys[0]);
    assert_eq!(leg.departure_time(), TimeCode::new(1, 3_600));
    assert_eq!(leg.run().service_day, 0);
}

#[test]
fn journey_may_start_and_end_on_foot() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["Home", "A", "B", "Work"]);
    let line = b.add_pattern(vec![s[1], s[2]]).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_300])).unwrap();
    b.add_transfer(s[0], s[1], 240).unwrap();
    b.add_transfer(s[2], s[3], 180).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[3], 7_700, RouteOptions::default());
    let journey = &response.journeys[0];
    assert!(matches!(journey.segments()[0], Segment::Walk(_)));
    assert!(matches!(journey.segments()[2], Segment::Walk(_)));
    assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_480));
    assert_eq!(journey.change_count(), 0);
    assert_eq!(journey.walk_secs(), 420);
}

#[test]
fn stop_area_links_platforms() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "Hub-1", "Hub-2", "D"]);
    let first = b.add_pattern(vec![s[0], s[1]]).unwrap();
    b.add_discrete_trip(first, trip(&[8_000, 8_300])).unwrap();
    let second = b.add_pattern(vec![s[2], s[3]]).unwrap();
    b.add_discrete_trip(second, trip(&[8_500, 8_900])).unwrap();
    b.add_stop_area(&[s[1], s[2]], 120).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[3], 7_900, RouteOptions::default());
    let journey = &response.journeys[0];
    assert_eq!(journey.leg_count(), 2);
    assert_eq!(journey.walks().next().unwrap().duration_secs, 120);
    assert_eq!(journey.arrival_time(), TimeCode::new(0, 8_900));
}

#[test]
fn via_stop_is_preferred_in_multicriteria() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B", "V", "D"]);
    let plain = b.add_pattern(vec![s[0], s[1], s[3]]).unwrap();
    b.add_discrete_trip(plain, trip(&[8_000, 8_500, 9_000])).unwrap();
    let scenic = b.add_pattern(vec![s[0], s[2], s[3]]).unwrap();
    b.add_discrete_trip(scenic, trip(&[8_000, 8_500, 9_000])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[3], 7_999, RouteOptions::default().with_via(s[2]));
    assert_eq!(response.journeys.len(), 1);
    assert!(response.journeys[0].passes_through(s[2]));
}

#[test]
fn via_route_survives_faster_direct_route() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "V", "D"]);
    let direct = b.add_pattern(vec![s[0], s[2]]).unwrap();
    b.add_discrete_trip(direct, trip(&[8_000, 8_600])).unwrap();
    let around = b.add_pattern(vec![s[0], s[1], s[2]]).unwrap();
    b.add_discrete_trip(around, trip(&[8_000, 8_800, 9_000])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[2], 7_999, RouteOptions::default().with_via(s[1]));
    let passes: Vec<_> = response.journeys.iter().map(|j| j.passes_through(s[1])).collect();
    assert_eq!(passes, vec![false, true]);
}

#[test]
fn calendar_restricts_trips() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_200])).unwrap();
    let mut school = trip(&[9_000, 9_200]);
    school.calendars = vec![CalendarId::new("school")];
    b.add_discrete_trip(line, school).unwrap();
    b.add_calendar(CalendarId::new("school"), ValidityPattern::days(0, 30));
    let net = b.build();

    let options = RouteOptions::default().with_calendar(CalendarId::new("school"));
    let response = route(&net, s[0], s[1], 7_000, options);
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(0, 9_200));

    let response = route(&net, s[0], s[1], 7_000, RouteOptions::default());
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(0, 8_200));
}

#[test]
fn realtime_level_skips_cancelled_trip() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B"]);
    let line = b.add_pattern(s.clone()).unwrap();
    let mut cancelled = trip(&[8_000, 8_200]);
    cancelled.validity.set(RtLevel::RealTime, ValidityPattern::new());
    b.add_discrete_trip(line, cancelled).unwrap();
    b.add_discrete_trip(line, trip(&[8_600, 8_800])).unwrap();
    let net = b.build();

    let base = route(&net, s[0], s[1], 7_999, RouteOptions::default());
    assert_eq!(base.journeys[0].arrival_time(), TimeCode::new(0, 8_200));

    let live = route(&net, s[0], s[1], 7_999, RouteOptions::default().with_rt_level(RtLevel::RealTime));
    assert_eq!(live.journeys[0].arrival_time(), TimeCode::new(0, 8_800));
}

#[test]
fn boarding_filter_skips_inaccessible_trips() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_200])).unwrap();
    let mut accessible = trip(&[8_400, 8_600]);
    accessible.properties.wheelchair_accessible = true;
    b.add_discrete_trip(line, accessible).unwrap();
    let net = b.build();

    let wheelchair = RequiredProperties(VehicleProperties {
        wheelchair_accessible: true,
        bike_accepted: false,
    });
    let response = route(&net, s[0], s[1], 7_999, RouteOptions::default().with_filter(wheelchair));
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(0, 8_600));

    let closure = |_: &Trip, st: &StopTime| st.departure >= 8_400;
    let response = route(&net, s[0], s[1], 7_999, RouteOptions::default().with_filter(closure));
    assert_eq!(response.journeys[0].arrival_time(), TimeCode::new(0, 8_600));
}

#[test]
fn round_cap_truncates_and_keeps_partial_results() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B", "C"]);
    let first = b.add_pattern(vec![s[0], s[1]]).unwrap();
    b.add_discrete_trip(first, trip(&[8_000, 8_100])).unwrap();
    let second = b.add_pattern(vec![s[1], s[2]]).unwrap();
    b.add_discrete_trip(second, trip(&[8_300, 8_400])).unwrap();
    let net = b.build();

    let response = route(&net, s[0], s[2], 7_999, RouteOptions::default().with_max_rounds(1));
    assert_eq!(response.outcome, SearchOutcome::Truncated);
    assert!(response.journeys.is_empty());

    let response = route(&net, s[0], s[2], 7_999, RouteOptions::default().with_max_rounds(2));
    assert_eq!(response.journeys.len(), 1);
}

#[test]
fn works_through_trait_object() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B"]);
    let line = b.add_pattern(s.clone()).unwrap();
    b.add_discrete_trip(line, trip(&[8_000, 8_200])).unwrap();
    let net = b.build();
    let data: &dyn TransitData = &net;

    let router = Router::new(data, SearchConfig::default());
    let response = router.route(&RouteRequest::new(s[0], s[1], epoch(), 0)).unwrap();
    assert_eq!(response.journeys.len(), 1);
}

#[test]
fn concurrent_queries_share_network_and_cache() {
    let mut b = Network::builder(epoch());
    let s = stops(&mut b, &["A", "B", "C", "D"]);
    let line = b.add_pattern(s.clone()).unwrap();
    for k in 0..20 {
        let t = 6_000 + k * 600;
        b.add_discrete_trip(line, trip(&[t, t + 300, t + 600, t + 900])).unwrap();
    }
    let net = b.build();
    let cache = DayTimelineCache::default();
    let router = Router::new(&net, SearchConfig::default()).with_cache(&cache);

    let expected: Vec<_> = (0..8u32)
        .map(|i| route(&net, s[0], s[3], 5_000 + i * 700, RouteOptions::default()).journeys)
        .collect();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let router = &router;
                let origin = s[0];
                let destination = s[3];
                scope.spawn(move || {
                    router
                        .route(&RouteRequest::new(origin, destination, epoch(), 5_000 + i * 700))
                        .unwrap()
                        .journeys
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, expected);
    assert!(cache.entry_count() <= 2);
}
