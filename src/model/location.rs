//! Stop and station locations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::merge::fill_string;
use crate::matcher::is_same_location_name;

/// Beyond this distance (in metres) two coordinates never denote the same stop.
pub const MAX_SAME_LOCATION_DISTANCE: f64 = 1000.0;

/// Below this distance (in metres) two coordinates are the same spot on their own.
pub const COINCIDENT_DISTANCE: f64 = 10.0;

const EARTH_RADIUS: f64 = 6_371_000.0;

fn unset_coordinate() -> f64 {
    f64::NAN
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_unset(value: &f64) -> bool {
    value.is_nan()
}

/// A stop, station or address as reported by one data source.
///
/// Coordinates use NaN for "unknown". Identifiers are keyed by namespace
/// (e.g. `uic`, `ibnr`) and are authoritative when both sides share one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default = "unset_coordinate", skip_serializing_if = "is_unset")]
    pub latitude: f64,

    #[serde(default = "unset_coordinate", skip_serializing_if = "is_unset")]
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, String>,

    /// IANA timezone name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: f64::NAN,
            longitude: f64::NAN,
            name: String::new(),
            identifiers: BTreeMap::new(),
            timezone: None,
        }
    }
}

impl Location {
    /// Create a location with only a name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style coordinate setter.
    #[must_use]
    pub fn with_coordinate(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// Builder-style identifier setter.
    #[must_use]
    pub fn with_identifier(mut self, namespace: &str, id: &str) -> Self {
        self.identifiers.insert(namespace.to_string(), id.to_string());
        self
    }

    #[must_use]
    pub fn has_coordinate(&self) -> bool {
        !self.latitude.is_nan() && !self.longitude.is_nan()
    }

    /// Identifier for `namespace`, if known.
    #[must_use]
    pub fn identifier(&self, namespace: &str) -> Option<&str> {
        self.identifiers.get(namespace).map(String::as_str)
    }

    /// True when nothing at all is known about this location.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && !self.has_coordinate() && self.identifiers.is_empty()
    }

    /// Great-circle distance in metres, or `None` if either side lacks a coordinate.
    #[must_use]
    pub fn distance(lhs: &Location, rhs: &Location) -> Option<f64> {
        if !lhs.has_coordinate() || !rhs.has_coordinate() {
            return None;
        }
        let (lat1, lat2) = (lhs.latitude.to_radians(), rhs.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (rhs.longitude - lhs.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        Some(2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt()))
    }

    /// Whether two locations refer to the same real-world place.
    ///
    /// Shared identifier namespaces decide first, then distance rules out far
    /// apart places, then names are compared. A field missing on either side
    /// neither rules out nor confirms a match.
    #[must_use]
    pub fn is_same(lhs: &Location, rhs: &Location) -> bool {
        let mut identifier_match = false;
        for (namespace, id) in &lhs.identifiers {
            if let Some(other) = rhs.identifiers.get(namespace) {
                if other != id {
                    return false;
                }
                identifier_match = true;
            }
        }

        let distance = Self::distance(lhs, rhs);
        if distance.is_some_and(|d| d > MAX_SAME_LOCATION_DISTANCE) {
            return false;
        }
        if identifier_match {
            return true;
        }

        if !lhs.name.is_empty() && !rhs.name.is_empty() {
            return is_same_location_name(&lhs.name, &rhs.name);
        }
        distance.is_some_and(|d| d < COINCIDENT_DISTANCE)
    }

    /// Fill the gaps of `lhs` from `rhs`.
    #[must_use]
    pub fn merge(lhs: &Location, rhs: &Location) -> Location {
        let (latitude, longitude) = if lhs.has_coordinate() {
            (lhs.latitude, lhs.longitude)
        } else {
            (rhs.latitude, rhs.longitude)
        };

        let mut identifiers = rhs.identifiers.clone();
        identifiers.extend(lhs.identifiers.iter().map(|(k, v)| (k.clone(), v.clone())));

        Location {
            latitude,
            longitude,
            name: fill_string(&lhs.name, &rhs.name),
            identifiers,
            timezone: lhs.timezone.clone().or_else(|| rhs.timezone.clone()),
        }
    }
}
