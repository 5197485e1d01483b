//! Command implementations.

pub mod completions;
pub mod decode;
pub mod encode;
pub mod matching;
pub mod merge;
pub mod outbound;
pub mod replay;
pub mod version;

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Read and parse a JSON input file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}
