//! Field-level merge helpers shared by the value types.
//!
//! Merging is a directional fill: the left-hand value is kept wherever it has
//! data, and only its gaps are filled from the right-hand value.

use chrono::{DateTime, Utc};

use super::journey::SectionMode;
use super::line::Mode;

/// Errors raised when two values are clearly not the same entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Both sides carry a known, incompatible mode of transport.
    #[error("incompatible modes: {lhs:?} vs {rhs:?}")]
    IncompatibleMode { lhs: Mode, rhs: Mode },

    /// Both sections are valid but of a different kind.
    #[error("incompatible section modes: {lhs:?} vs {rhs:?}")]
    IncompatibleSectionMode { lhs: SectionMode, rhs: SectionMode },

    /// Both sides carry a valid scheduled time and they differ.
    #[error("scheduled {field} differs: {lhs} vs {rhs}")]
    ScheduledTimeMismatch {
        field: &'static str,
        lhs: DateTime<Utc>,
        rhs: DateTime<Utc>,
    },

    /// Journeys with different section counts cannot be merged positionally.
    #[error("journey section count differs: {lhs} vs {rhs}")]
    SectionCountMismatch { lhs: usize, rhs: usize },
}

/// Result type for fallible merges.
pub type MergeResult<T> = std::result::Result<T, MergeError>;

pub(crate) fn fill_string(lhs: &str, rhs: &str) -> String {
    if lhs.is_empty() { rhs } else { lhs }.to_string()
}

pub(crate) fn fill_option<T: Clone>(lhs: Option<&T>, rhs: Option<&T>) -> Option<T> {
    lhs.or(rhs).cloned()
}

pub(crate) fn fill_coordinate(lhs: f64, rhs: f64) -> f64 {
    if lhs.is_nan() { rhs } else { lhs }
}

/// Fill a scheduled time, refusing to merge two different valid values.
pub(crate) fn fill_scheduled(
    field: &'static str,
    lhs: Option<DateTime<Utc>>,
    rhs: Option<DateTime<Utc>>,
) -> MergeResult<Option<DateTime<Utc>>> {
    match (lhs, rhs) {
        (Some(l), Some(r)) if l != r => Err(MergeError::ScheduledTimeMismatch { field, lhs: l, rhs: r }),
        (l, r) => Ok(l.or(r)),
    }
}

/// Two optional timestamps agree unless both are set and differ.
pub(crate) fn same_if_valid(lhs: Option<DateTime<Utc>>, rhs: Option<DateTime<Utc>>) -> bool {
    match (lhs, rhs) {
        (Some(l), Some(r)) => l == r,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fill_string_prefers_lhs() {
        assert_eq!(fill_string("a", "b"), "a");
        assert_eq!(fill_string("", "b"), "b");
        assert_eq!(fill_string("", ""), "");
    }

    #[test]
    fn test_fill_coordinate_nan() {
        assert_eq!(fill_coordinate(f64::NAN, 1.5), 1.5);
        assert_eq!(fill_coordinate(2.0, 1.5), 2.0);
    }

    #[test]
    fn test_fill_scheduled_conflict() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap();
        assert_eq!(fill_scheduled("departure", None, Some(b)), Ok(Some(b)));
        assert_eq!(fill_scheduled("departure", Some(a), Some(a)), Ok(Some(a)));
        assert!(fill_scheduled("departure", Some(a), Some(b)).is_err());
    }
}
