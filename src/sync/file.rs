//! Atomic file operations for sync.
//!
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - JSONL reading with line numbers in parse errors

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::sync::types::{SyncError, SyncResult};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write content to a file atomically.
///
/// Content goes to a sibling `.tmp` file which is synced to disk and then
/// renamed over the target. If any step fails, the original file (if any)
/// remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path(path);
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Remove a file, treating a missing file as success.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove_if_exists(path: &Path) -> SyncResult<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Read all records from a JSONL file.
///
/// Blank lines are skipped. Invalid lines cause an error with the line
/// number for debugging.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any line fails to parse.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> SyncResult<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| SyncError::InvalidRecord {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}
