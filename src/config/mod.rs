//! Configuration management.
//!
//! Settings live in a JSON file at `$ITIN_CONFIG` or `~/.itinerary/config.json`.
//! A missing file yields the defaults; every field is optional.
//!
//! ```json
//! {
//!   "contentSizeLimit": 49152,
//!   "tempDir": "/var/tmp/itin",
//!   "source": "laptop",
//!   "dataDir": "/home/me/.itinerary/data"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{EncodeOptions, CONTENT_SIZE_LIMIT};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ITIN_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ITIN_DATA_DIR";

/// Sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Ceiling for inline state event content, in bytes.
    pub content_size_limit: usize,
    /// Directory for external content files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Override for the `source` field of outbound events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Directory holding persistent sync state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            content_size_limit: CONTENT_SIZE_LIMIT,
            temp_dir: None,
            source: None,
            data_dir: None,
        }
    }
}

/// Global itinerary directory, `~/.itinerary`.
#[must_use]
pub fn global_itinerary_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".itinerary"))
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `explicit_path` (from `--config`)
/// 2. `ITIN_CONFIG` environment variable
/// 3. `~/.itinerary/config.json`
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    global_itinerary_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

impl SyncConfig {
    /// Load the configuration from its resolved location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(explicit_path)?;
        Self::load_from(&path)
    }

    /// Load the configuration from `path`, defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;

        if config.content_size_limit == 0 {
            return Err(Error::Config("contentSizeLimit must be positive".into()));
        }
        Ok(config)
    }

    /// The data directory.
    ///
    /// Priority: `ITIN_DATA_DIR`, the `dataDir` setting, `~/.itinerary/data`.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        global_itinerary_dir()
            .map(|dir| dir.join("data"))
            .ok_or_else(|| Error::Config("Could not determine home directory".into()))
    }

    /// Location of the persisted outbound change queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved.
    pub fn outbound_queue_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("sync").join("outbound-queue.json"))
    }

    /// Codec options derived from these settings.
    #[must_use]
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            size_limit: self.content_size_limit,
            temp_dir: self.temp_dir.clone(),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = SyncConfig::load_from(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.content_size_limit, 49152);
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"source":"laptop","dataDir":"/srv/itin"}"#).unwrap();

        let config = SyncConfig::load_from(&path).unwrap();
        assert_eq!(config.content_size_limit, CONTENT_SIZE_LIMIT);
        assert_eq!(config.source.as_deref(), Some("laptop"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/itin")));

        let options = config.encode_options();
        assert_eq!(options.size_limit, CONTENT_SIZE_LIMIT);
        assert_eq!(options.source.as_deref(), Some("laptop"));
        assert!(options.temp_dir.is_none());
    }

    #[test]
    fn test_outbound_queue_path_under_data_dir() {
        if std::env::var(DATA_DIR_ENV).is_ok() {
            return;
        }
        let config = SyncConfig {
            data_dir: Some(PathBuf::from("/srv/itin")),
            ..SyncConfig::default()
        };
        assert_eq!(
            config.outbound_queue_path().unwrap(),
            PathBuf::from("/srv/itin/sync/outbound-queue.json")
        );
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(SyncConfig::load_from(&path), Err(Error::Config(_))));

        fs::write(&path, r#"{"contentSizeLimit":0}"#).unwrap();
        assert!(matches!(SyncConfig::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/custom/config.json");
        assert_eq!(resolve_config_path(Some(&path)).unwrap(), path);
    }
}
