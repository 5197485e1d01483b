//! Merge command implementation.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use super::read_json;
use crate::cli::MergeKind;
use crate::error::{Error, Result};
use crate::model::{Departure, Journey, JourneySection, Location, MergeResult};

/// Check that both inputs describe the same entity, merge, print the result.
pub fn execute(kind: MergeKind, lhs: &Path, rhs: &Path) -> Result<()> {
    let merged = match kind {
        MergeKind::Location => merge_files(lhs, rhs, "locations", Location::is_same, |l, r| {
            Ok(Location::merge(l, r))
        })?,
        MergeKind::Departure => merge_files(lhs, rhs, "departures", Departure::is_same, Departure::merge)?,
        MergeKind::Section => {
            merge_files(lhs, rhs, "journey sections", JourneySection::is_same, JourneySection::merge)?
        }
        MergeKind::Journey => merge_files(lhs, rhs, "journeys", Journey::is_same, Journey::merge)?,
    };

    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

fn merge_files<T>(
    lhs: &Path,
    rhs: &Path,
    what: &str,
    is_same: fn(&T, &T) -> bool,
    merge: fn(&T, &T) -> MergeResult<T>,
) -> Result<serde_json::Value>
where
    T: DeserializeOwned + Serialize,
{
    let lhs: T = read_json(lhs)?;
    let rhs: T = read_json(rhs)?;
    if !is_same(&lhs, &rhs) {
        return Err(Error::NotSame { what: what.to_string() });
    }
    let merged = merge(&lhs, &rhs)?;
    info!(what, "Merged values");
    Ok(serde_json::to_value(merged)?)
}
