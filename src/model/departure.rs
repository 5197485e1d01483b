//! Departures and arrivals at a single stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::line::Route;
use super::location::Location;
use super::merge::{fill_option, fill_scheduled, fill_string, same_if_valid, MergeResult};

/// Scheduled and real-time arrival/departure of a route at one stop.
///
/// A missing expected time means "no real-time data", not "on time".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_departure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_departure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduled_platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_platform: String,
    #[serde(default)]
    pub route: Route,
    #[serde(default)]
    pub stop_point: Location,
}

/// Difference in whole minutes, truncated toward zero.
pub(crate) fn delay_minutes(scheduled: Option<DateTime<Utc>>, expected: Option<DateTime<Utc>>) -> Option<i64> {
    Some((expected? - scheduled?).num_minutes())
}

impl Departure {
    #[must_use]
    pub fn has_expected_arrival_time(&self) -> bool {
        self.expected_arrival_time.is_some()
    }

    #[must_use]
    pub fn has_expected_departure_time(&self) -> bool {
        self.expected_departure_time.is_some()
    }

    #[must_use]
    pub fn has_expected_platform(&self) -> bool {
        !self.expected_platform.is_empty()
    }

    /// Arrival delay in minutes, `None` without real-time data.
    #[must_use]
    pub fn arrival_delay(&self) -> Option<i64> {
        delay_minutes(self.scheduled_arrival_time, self.expected_arrival_time)
    }

    /// Departure delay in minutes, `None` without real-time data.
    #[must_use]
    pub fn departure_delay(&self) -> Option<i64> {
        delay_minutes(self.scheduled_departure_time, self.expected_departure_time)
    }

    #[must_use]
    pub fn platform_changed(&self) -> bool {
        self.has_expected_platform()
            && !self.scheduled_platform.is_empty()
            && self.scheduled_platform != self.expected_platform
    }

    /// Same stop event: matching scheduled times (where both are known),
    /// route and stop.
    #[must_use]
    pub fn is_same(lhs: &Departure, rhs: &Departure) -> bool {
        if !same_if_valid(lhs.scheduled_departure_time, rhs.scheduled_departure_time)
            || !same_if_valid(lhs.scheduled_arrival_time, rhs.scheduled_arrival_time)
        {
            return false;
        }
        if !Route::is_same(&lhs.route, &rhs.route) {
            return false;
        }
        lhs.stop_point.is_empty() || rhs.stop_point.is_empty() || Location::is_same(&lhs.stop_point, &rhs.stop_point)
    }

    /// Fill the gaps of `lhs` from `rhs`, recursing into route and stop.
    ///
    /// # Errors
    ///
    /// Fails if both sides have different valid scheduled times or
    /// incompatible line modes.
    pub fn merge(lhs: &Departure, rhs: &Departure) -> MergeResult<Departure> {
        Ok(Departure {
            scheduled_arrival_time: fill_scheduled(
                "arrival time",
                lhs.scheduled_arrival_time,
                rhs.scheduled_arrival_time,
            )?,
            expected_arrival_time: fill_option(lhs.expected_arrival_time.as_ref(), rhs.expected_arrival_time.as_ref()),
            scheduled_departure_time: fill_scheduled(
                "departure time",
                lhs.scheduled_departure_time,
                rhs.scheduled_departure_time,
            )?,
            expected_departure_time: fill_option(
                lhs.expected_departure_time.as_ref(),
                rhs.expected_departure_time.as_ref(),
            ),
            scheduled_platform: fill_string(&lhs.scheduled_platform, &rhs.scheduled_platform),
            expected_platform: fill_string(&lhs.expected_platform, &rhs.expected_platform),
            route: Route::merge(&lhs.route, &rhs.route)?,
            stop_point: Location::merge(&lhs.stop_point, &rhs.stop_point),
        })
    }
}
