//! Matching live public transport data against a booked trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Departure, Journey, JourneySection, Line, Location, Mode, Route, SectionMode};

/// Kind of a booked trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripKind {
    #[default]
    Train,
    Bus,
    Flight,
    Boat,
}

/// A booked trip as found on a ticket or reservation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripQuery {
    #[serde(default)]
    pub kind: TripKind,
    /// Product or operator prefix, e.g. "ICE".
    #[serde(default)]
    pub line_name: String,
    #[serde(default)]
    pub line_number: String,
    #[serde(default)]
    pub departure_location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<DateTime<Utc>>,
}

#[must_use]
pub fn is_same_mode(kind: TripKind, mode: Mode) -> bool {
    match kind {
        TripKind::Train => mode.is_rail_bound(),
        TripKind::Bus => mode.is_bus(),
        TripKind::Flight => mode == Mode::Air,
        TripKind::Boat => matches!(mode, Mode::Boat | Mode::Ferry),
    }
}

/// Whether `route` serves the booked line `line_name` + `line_number`.
///
/// Besides the line itself, a route-specific name of at least three
/// characters (typically the train number) is checked against the
/// combined booking.
#[must_use]
pub fn is_same_route(route: &Route, line_name: &str, line_number: &str) -> bool {
    let booked = Line {
        name: line_number.to_string(),
        mode_string: line_name.to_string(),
        ..Line::default()
    };
    if Line::is_same(&route.line, &booked) {
        return true;
    }

    if route.name.chars().count() < 3 {
        return false;
    }
    let by_route_name = Line {
        name: route.name.clone(),
        mode: route.line.mode,
        ..Line::default()
    };
    let combined = Line::new(format!("{line_name} {line_number}").trim(), Mode::Unknown);
    Line::is_same(&by_route_name, &combined)
}

fn matches_time(booked: Option<DateTime<Utc>>, actual: Option<DateTime<Utc>>) -> bool {
    match (booked, actual) {
        (Some(b), Some(a)) => a == b,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

fn matches_location(booked: &Location, actual: &Location) -> bool {
    booked.is_empty() || Location::is_same(booked, actual)
}

fn is_trip_departure(trip: &TripQuery, stop: &Departure) -> bool {
    matches_time(trip.departure_time, stop.scheduled_departure_time)
        && matches_location(&trip.departure_location, &stop.stop_point)
}

fn is_trip_arrival(trip: &TripQuery, stop: &Departure) -> bool {
    matches_time(trip.arrival_time, stop.scheduled_arrival_time)
        && matches_location(&trip.arrival_location, &stop.stop_point)
}

fn serves_trip(trip: &TripQuery, route: &Route) -> bool {
    is_same_mode(trip.kind, route.line.mode) && is_same_route(route, &trip.line_name, &trip.line_number)
}

/// Whether `dep` is the boarding event of the booked trip.
#[must_use]
pub fn is_departure_for_trip(trip: &TripQuery, dep: &Departure) -> bool {
    serves_trip(trip, &dep.route) && matches_time(trip.departure_time, dep.scheduled_departure_time)
}

/// Whether `arr` is the alighting event of the booked trip.
#[must_use]
pub fn is_arrival_for_trip(trip: &TripQuery, arr: &Departure) -> bool {
    serves_trip(trip, &arr.route) && matches_time(trip.arrival_time, arr.scheduled_arrival_time)
}

/// Whether `journey` consists of exactly the booked trip.
#[must_use]
pub fn is_journey_for_trip(trip: &TripQuery, journey: &Journey) -> bool {
    let mut transit = journey
        .sections
        .iter()
        .filter(|s| s.mode == SectionMode::PublicTransport);
    let (Some(section), None) = (transit.next(), transit.next()) else {
        return false;
    };
    serves_trip(trip, &section.route)
        && is_trip_departure(trip, &section.departure())
        && is_trip_arrival(trip, &section.arrival())
}

/// The part of `section` between the booked boarding and alighting stops.
///
/// Boarding and alighting stops are looked up among the section ends and its
/// intermediate stops. Returns `None` if the section does not serve the
/// booked line or either stop cannot be found.
#[must_use]
pub fn sub_journey_for_trip(trip: &TripQuery, section: &JourneySection) -> Option<JourneySection> {
    if section.mode != SectionMode::PublicTransport || !serves_trip(trip, &section.route) {
        return None;
    }

    let boards_at_start = is_trip_departure(trip, &section.departure());
    let alights_at_end = is_trip_arrival(trip, &section.arrival());
    if boards_at_start && alights_at_end {
        return Some(section.clone());
    }

    let mut sub = section.clone();
    let stops = std::mem::take(&mut sub.intermediate_stops);

    let mut first = 0;
    if !boards_at_start {
        let idx = stops.iter().position(|s| is_trip_departure(trip, s))?;
        sub.set_departure(&stops[idx]);
        first = idx + 1;
    }

    let mut last = stops.len();
    if !alights_at_end {
        let idx = first + stops[first..].iter().position(|s| is_trip_arrival(trip, s))?;
        sub.set_arrival(&stops[idx]);
        last = idx;
    }

    sub.intermediate_stops = stops[first..last].to_vec();
    Some(sub)
}
