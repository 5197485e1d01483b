//! Journeys and their sections.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::departure::{delay_minutes, Departure};
use super::line::Route;
use super::location::Location;
use super::merge::{fill_option, fill_scheduled, fill_string, same_if_valid, MergeError, MergeResult};

/// Kind of a journey section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionMode {
    #[default]
    Invalid,
    PublicTransport,
    Transfer,
    Walking,
    Waiting,
}

/// One leg of a journey: a ride, a walk, a transfer or a wait.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySection {
    #[serde(default)]
    pub mode: SectionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_departure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_departure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduled_departure_platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_departure_platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduled_arrival_platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_arrival_platform: String,
    #[serde(default)]
    pub from: Location,
    #[serde(default)]
    pub to: Location,
    #[serde(default)]
    pub route: Route,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediate_stops: Vec<Departure>,
}

impl JourneySection {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.mode != SectionMode::Invalid
    }

    #[must_use]
    pub fn has_expected_departure_time(&self) -> bool {
        self.expected_departure_time.is_some()
    }

    #[must_use]
    pub fn has_expected_arrival_time(&self) -> bool {
        self.expected_arrival_time.is_some()
    }

    #[must_use]
    pub fn departure_delay(&self) -> Option<i64> {
        delay_minutes(self.scheduled_departure_time, self.expected_departure_time)
    }

    #[must_use]
    pub fn arrival_delay(&self) -> Option<i64> {
        delay_minutes(self.scheduled_arrival_time, self.expected_arrival_time)
    }

    /// Scheduled duration, if both ends are known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.scheduled_arrival_time? - self.scheduled_departure_time?)
    }

    /// The boarding end of this section as a stop event.
    #[must_use]
    pub fn departure(&self) -> Departure {
        Departure {
            scheduled_departure_time: self.scheduled_departure_time,
            expected_departure_time: self.expected_departure_time,
            scheduled_platform: self.scheduled_departure_platform.clone(),
            expected_platform: self.expected_departure_platform.clone(),
            route: self.route.clone(),
            stop_point: self.from.clone(),
            ..Departure::default()
        }
    }

    /// The alighting end of this section as a stop event.
    #[must_use]
    pub fn arrival(&self) -> Departure {
        Departure {
            scheduled_arrival_time: self.scheduled_arrival_time,
            expected_arrival_time: self.expected_arrival_time,
            scheduled_platform: self.scheduled_arrival_platform.clone(),
            expected_platform: self.expected_arrival_platform.clone(),
            route: self.route.clone(),
            stop_point: self.to.clone(),
            ..Departure::default()
        }
    }

    pub fn set_departure(&mut self, dep: &Departure) {
        self.scheduled_departure_time = dep.scheduled_departure_time;
        self.expected_departure_time = dep.expected_departure_time;
        self.scheduled_departure_platform.clone_from(&dep.scheduled_platform);
        self.expected_departure_platform.clone_from(&dep.expected_platform);
        self.from = dep.stop_point.clone();
    }

    pub fn set_arrival(&mut self, arr: &Departure) {
        self.scheduled_arrival_time = arr.scheduled_arrival_time;
        self.expected_arrival_time = arr.expected_arrival_time;
        self.scheduled_arrival_platform.clone_from(&arr.scheduled_platform);
        self.expected_arrival_platform.clone_from(&arr.expected_platform);
        self.to = arr.stop_point.clone();
    }

    #[must_use]
    pub fn is_same(lhs: &JourneySection, rhs: &JourneySection) -> bool {
        if lhs.is_valid() && rhs.is_valid() && lhs.mode != rhs.mode {
            return false;
        }
        if !same_if_valid(lhs.scheduled_departure_time, rhs.scheduled_departure_time)
            || !same_if_valid(lhs.scheduled_arrival_time, rhs.scheduled_arrival_time)
        {
            return false;
        }
        if !is_same_or_unknown(&lhs.from, &rhs.from) || !is_same_or_unknown(&lhs.to, &rhs.to) {
            return false;
        }
        if lhs.mode == SectionMode::PublicTransport && rhs.mode == SectionMode::PublicTransport {
            return Route::is_same(&lhs.route, &rhs.route);
        }
        true
    }

    /// Fill the gaps of `lhs` from `rhs`.
    ///
    /// Intermediate stops are taken from `rhs` when `lhs` has none, and merged
    /// pairwise when both lists have the same length.
    ///
    /// # Errors
    ///
    /// Fails when both sections have different valid modes or scheduled times,
    /// or their lines are incompatible.
    pub fn merge(lhs: &JourneySection, rhs: &JourneySection) -> MergeResult<JourneySection> {
        let mode = match (lhs.mode, rhs.mode) {
            (SectionMode::Invalid, m) | (m, SectionMode::Invalid) => m,
            (l, r) if l == r => l,
            (l, r) => return Err(MergeError::IncompatibleSectionMode { lhs: l, rhs: r }),
        };

        let intermediate_stops = if lhs.intermediate_stops.is_empty() {
            rhs.intermediate_stops.clone()
        } else if lhs.intermediate_stops.len() == rhs.intermediate_stops.len() {
            lhs.intermediate_stops
                .iter()
                .zip(&rhs.intermediate_stops)
                .map(|(l, r)| {
                    if Departure::is_same(l, r) {
                        Departure::merge(l, r)
                    } else {
                        Ok(l.clone())
                    }
                })
                .collect::<MergeResult<Vec<_>>>()?
        } else {
            lhs.intermediate_stops.clone()
        };

        Ok(JourneySection {
            mode,
            scheduled_departure_time: fill_scheduled(
                "departure time",
                lhs.scheduled_departure_time,
                rhs.scheduled_departure_time,
            )?,
            expected_departure_time: fill_option(
                lhs.expected_departure_time.as_ref(),
                rhs.expected_departure_time.as_ref(),
            ),
            scheduled_arrival_time: fill_scheduled(
                "arrival time",
                lhs.scheduled_arrival_time,
                rhs.scheduled_arrival_time,
            )?,
            expected_arrival_time: fill_option(lhs.expected_arrival_time.as_ref(), rhs.expected_arrival_time.as_ref()),
            scheduled_departure_platform: fill_string(
                &lhs.scheduled_departure_platform,
                &rhs.scheduled_departure_platform,
            ),
            expected_departure_platform: fill_string(
                &lhs.expected_departure_platform,
                &rhs.expected_departure_platform,
            ),
            scheduled_arrival_platform: fill_string(&lhs.scheduled_arrival_platform, &rhs.scheduled_arrival_platform),
            expected_arrival_platform: fill_string(&lhs.expected_arrival_platform, &rhs.expected_arrival_platform),
            from: Location::merge(&lhs.from, &rhs.from),
            to: Location::merge(&lhs.to, &rhs.to),
            route: Route::merge(&lhs.route, &rhs.route)?,
            intermediate_stops,
        })
    }
}

fn is_same_or_unknown(lhs: &Location, rhs: &Location) -> bool {
    lhs.is_empty() || rhs.is_empty() || Location::is_same(lhs, rhs)
}

/// An ordered sequence of journey sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    #[serde(default)]
    pub sections: Vec<JourneySection>,
}

impl Journey {
    #[must_use]
    pub fn new(sections: Vec<JourneySection>) -> Self {
        Self { sections }
    }

    #[must_use]
    pub fn scheduled_departure_time(&self) -> Option<DateTime<Utc>> {
        self.sections.first()?.scheduled_departure_time
    }

    #[must_use]
    pub fn scheduled_arrival_time(&self) -> Option<DateTime<Utc>> {
        self.sections.last()?.scheduled_arrival_time
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.scheduled_arrival_time()? - self.scheduled_departure_time()?)
    }

    /// Number of changes between public transport sections.
    #[must_use]
    pub fn number_of_changes(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.mode == SectionMode::PublicTransport)
            .count()
            .saturating_sub(1)
    }

    /// Same section count and pairwise same sections, in order.
    #[must_use]
    pub fn is_same(lhs: &Journey, rhs: &Journey) -> bool {
        lhs.sections.len() == rhs.sections.len()
            && lhs
                .sections
                .iter()
                .zip(&rhs.sections)
                .all(|(l, r)| JourneySection::is_same(l, r))
    }

    /// Merge corresponding sections positionally.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::SectionCountMismatch`] if the section counts
    /// differ, or any section merge error.
    pub fn merge(lhs: &Journey, rhs: &Journey) -> MergeResult<Journey> {
        if lhs.sections.len() != rhs.sections.len() {
            return Err(MergeError::SectionCountMismatch {
                lhs: lhs.sections.len(),
                rhs: rhs.sections.len(),
            });
        }
        let sections = lhs
            .sections
            .iter()
            .zip(&rhs.sections)
            .map(|(l, r)| JourneySection::merge(l, r))
            .collect::<MergeResult<Vec<_>>>()?;
        Ok(Journey { sections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Line, Mode};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, h, m, 0).unwrap()
    }

    fn ride(line: &str, from: &str, dep: DateTime<Utc>, to: &str, arr: DateTime<Utc>) -> JourneySection {
        JourneySection {
            mode: SectionMode::PublicTransport,
            scheduled_departure_time: Some(dep),
            scheduled_arrival_time: Some(arr),
            from: Location::named(from),
            to: Location::named(to),
            route: Route::new(Line::new(line, Mode::Train), ""),
            ..JourneySection::default()
        }
    }

    fn walk(dep: DateTime<Utc>, arr: DateTime<Utc>) -> JourneySection {
        JourneySection {
            mode: SectionMode::Walking,
            scheduled_departure_time: Some(dep),
            scheduled_arrival_time: Some(arr),
            ..JourneySection::default()
        }
    }

    fn journey() -> Journey {
        Journey::new(vec![
            ride("RE 1", "Berlin Hbf", at(8, 0), "Potsdam Hbf", at(8, 30)),
            walk(at(8, 30), at(8, 40)),
            ride("RB 21", "Potsdam Hbf", at(8, 45), "Golm", at(8, 55)),
        ])
    }

    #[test]
    fn test_derived_properties() {
        let j = journey();
        assert_eq!(j.scheduled_departure_time(), Some(at(8, 0)));
        assert_eq!(j.scheduled_arrival_time(), Some(at(8, 55)));
        assert_eq!(j.duration(), Some(Duration::minutes(55)));
        assert_eq!(j.number_of_changes(), 1);
        assert_eq!(Journey::default().number_of_changes(), 0);
        assert_eq!(Journey::default().duration(), None);
    }

    #[test]
    fn test_section_endpoints_round_trip() {
        let mut s = ride("RE 1", "Berlin Hbf", at(8, 0), "Potsdam Hbf", at(8, 30));
        s.expected_departure_time = Some(at(8, 3));
        let dep = s.departure();
        assert_eq!(dep.departure_delay(), Some(3));
        assert_eq!(dep.stop_point.name, "Berlin Hbf");

        let mut other = JourneySection::default();
        other.set_departure(&dep);
        other.set_arrival(&s.arrival());
        assert_eq!(other.scheduled_departure_time, Some(at(8, 0)));
        assert_eq!(other.to.name, "Potsdam Hbf");
    }

    #[test]
    fn test_journey_is_same_requires_equal_sections() {
        let a = journey();
        let mut b = journey();
        b.sections[0].route.line.name = "RE1".into();
        b.sections[2].to = Location::named("Potsdam-Golm");
        assert!(!Journey::is_same(&a, &b));

        b.sections[2].to = Location::named("Golm");
        assert!(Journey::is_same(&a, &b));
        assert!(Journey::is_same(&b, &a));

        b.sections.pop();
        assert!(!Journey::is_same(&a, &b));
    }

    #[test]
    fn test_section_mode_mismatch() {
        let a = walk(at(8, 30), at(8, 40));
        let mut b = a.clone();
        b.mode = SectionMode::Transfer;
        assert!(!JourneySection::is_same(&a, &b));
        assert!(JourneySection::merge(&a, &b).is_err());

        b.mode = SectionMode::Invalid;
        assert!(JourneySection::is_same(&a, &b));
        assert_eq!(JourneySection::merge(&b, &a).unwrap().mode, SectionMode::Walking);
    }

    #[test]
    fn test_journey_merge_positional() {
        let a = journey();
        let mut b = journey();
        b.sections[0].expected_departure_time = Some(at(8, 2));
        b.sections[0].scheduled_departure_platform = "14".into();
        b.sections[2].expected_arrival_time = Some(at(9, 1));

        let m = Journey::merge(&a, &b).unwrap();
        assert_eq!(m.sections[0].departure_delay(), Some(2));
        assert_eq!(m.sections[0].scheduled_departure_platform, "14");
        assert_eq!(m.sections[2].arrival_delay(), Some(6));
        assert!(Journey::is_same(&m, &a));

        b.sections.pop();
        assert_eq!(
            Journey::merge(&a, &b).unwrap_err(),
            MergeError::SectionCountMismatch { lhs: 3, rhs: 2 }
        );
    }

    #[test]
    fn test_intermediate_stops_merge() {
        let mut a = ride("RE 1", "Berlin Hbf", at(8, 0), "Potsdam Hbf", at(8, 30));
        let mut b = a.clone();
        let stop = Departure {
            scheduled_arrival_time: Some(at(8, 10)),
            scheduled_departure_time: Some(at(8, 11)),
            stop_point: Location::named("Berlin Zoologischer Garten"),
            ..Departure::default()
        };
        b.intermediate_stops.push(Departure {
            expected_arrival_time: Some(at(8, 12)),
            ..stop.clone()
        });

        let m = JourneySection::merge(&a, &b).unwrap();
        assert_eq!(m.intermediate_stops.len(), 1);

        a.intermediate_stops.push(stop);
        let m = JourneySection::merge(&a, &b).unwrap();
        assert_eq!(m.intermediate_stops[0].arrival_delay(), Some(2));
    }
}
