//! Transit lines and routes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::merge::{fill_string, MergeError, MergeResult};
use crate::matcher::{is_same_line_name, is_same_location_name};

/// Mode of transport of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Unknown,
    Air,
    Boat,
    Bus,
    BusRapidTransit,
    Coach,
    Ferry,
    Funicular,
    LocalTrain,
    LongDistanceTrain,
    Metro,
    RailShuttle,
    RapidTransit,
    Shuttle,
    Taxi,
    Train,
    Tramway,
    RideShare,
    AerialLift,
}

impl Mode {
    /// Modes running on rails, including trams and metros.
    #[must_use]
    pub const fn is_rail_bound(self) -> bool {
        matches!(
            self,
            Self::Funicular
                | Self::LocalTrain
                | Self::LongDistanceTrain
                | Self::Metro
                | Self::RailShuttle
                | Self::RapidTransit
                | Self::Train
                | Self::Tramway
        )
    }

    #[must_use]
    pub const fn is_bus(self) -> bool {
        matches!(self, Self::Bus | Self::BusRapidTransit | Self::Coach | Self::Shuttle)
    }

    const fn is_boat(self) -> bool {
        matches!(self, Self::Boat | Self::Ferry)
    }

    /// Whether two data sources reporting these modes could describe the same line.
    ///
    /// `Unknown` is compatible with everything. Otherwise modes have to be equal
    /// or belong to the same family (rail, bus, boat).
    #[must_use]
    pub const fn is_compatible(self, other: Mode) -> bool {
        matches!(self, Self::Unknown)
            || matches!(other, Self::Unknown)
            || (self as u8) == (other as u8)
            || (self.is_rail_bound() && other.is_rail_bound())
            || (self.is_bus() && other.is_bus())
            || (self.is_boat() && other.is_boat())
    }
}

/// An RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0x00ff_ffff)
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 {
            return Err(format!("Invalid color: {s}"));
        }
        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| format!("Invalid color: {s}"))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A public transport line, e.g. "RE 13" or "U2".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default)]
    pub mode: Mode,

    /// Human-readable product name, e.g. "ICE" or "Regional Express".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode_string: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Color>,
}

impl Line {
    #[must_use]
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            ..Self::default()
        }
    }

    /// Whether two lines are the same, tolerating product prefixes and spacing.
    ///
    /// Names are compared both on their own and prefixed with the mode string,
    /// so `"RE 13"` matches a line named `"13"` with mode string `"RE"`.
    #[must_use]
    pub fn is_same(lhs: &Line, rhs: &Line) -> bool {
        if !lhs.mode.is_compatible(rhs.mode) {
            return false;
        }
        if lhs.full_name().trim().is_empty() || rhs.full_name().trim().is_empty() {
            return true;
        }
        is_same_line_name(&lhs.name, &rhs.name) || is_same_line_name(&lhs.full_name(), &rhs.full_name())
    }

    fn full_name(&self) -> String {
        format!("{} {}", self.mode_string, self.name)
    }

    /// Fill the gaps of `lhs` from `rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::IncompatibleMode`] if both modes are known and
    /// belong to different families.
    pub fn merge(lhs: &Line, rhs: &Line) -> MergeResult<Line> {
        if !lhs.mode.is_compatible(rhs.mode) {
            return Err(MergeError::IncompatibleMode {
                lhs: lhs.mode,
                rhs: rhs.mode,
            });
        }
        Ok(Line {
            name: fill_string(&lhs.name, &rhs.name),
            mode: if lhs.mode == Mode::Unknown { rhs.mode } else { lhs.mode },
            mode_string: fill_string(&lhs.mode_string, &rhs.mode_string),
            color: lhs.color.or(rhs.color),
            text_color: lhs.text_color.or(rhs.text_color),
        })
    }
}

/// A line travelling in a specific direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub line: Line,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub direction: String,

    /// Route-specific name, e.g. a train number that differs from the line name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Route {
    #[must_use]
    pub fn new(line: Line, direction: impl Into<String>) -> Self {
        Self {
            line,
            direction: direction.into(),
            name: String::new(),
        }
    }

    #[must_use]
    pub fn is_same(lhs: &Route, rhs: &Route) -> bool {
        if !Line::is_same(&lhs.line, &rhs.line) {
            return false;
        }
        if !lhs.name.is_empty() && !rhs.name.is_empty() && !is_same_line_name(&lhs.name, &rhs.name) {
            return false;
        }
        lhs.direction.is_empty()
            || rhs.direction.is_empty()
            || is_same_location_name(&lhs.direction, &rhs.direction)
    }

    /// Fill the gaps of `lhs` from `rhs`, merging the lines as well.
    ///
    /// # Errors
    ///
    /// Propagates [`Line::merge`] failures.
    pub fn merge(lhs: &Route, rhs: &Route) -> MergeResult<Route> {
        Ok(Route {
            line: Line::merge(&lhs.line, &rhs.line)?,
            direction: fill_string(&lhs.direction, &rhs.direction),
            name: fill_string(&lhs.name, &rhs.name),
        })
    }
}
