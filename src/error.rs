//! Error types for the itinerary sync tool.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not same, 4=validation, 6=sync, etc.)
//! - Retryability flags for automated callers
//! - Recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::model::MergeError;
use crate::sync::SyncError;

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Identity (exit 3)
    NotSame,

    // Validation (exit 4)
    InvalidArgument,
    InvalidEventType,
    InvalidStateKey,
    UnsupportedVersion,

    // Merge (exit 5)
    MergeConflict,

    // Sync (exit 6)
    SyncError,
    ContentUnavailable,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotSame => "NOT_SAME",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidEventType => "INVALID_EVENT_TYPE",
            Self::InvalidStateKey => "INVALID_STATE_KEY",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::MergeConflict => "MERGE_CONFLICT",
            Self::SyncError => "SYNC_ERROR",
            Self::ContentUnavailable => "CONTENT_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotSame => 3,
            Self::InvalidArgument
            | Self::InvalidEventType
            | Self::InvalidStateKey
            | Self::UnsupportedVersion => 4,
            Self::MergeConflict => 5,
            Self::SyncError | Self::ContentUnavailable => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Missing content becomes available once the pending download completes;
    /// I/O failures are usually transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ContentUnavailable | Self::IoError)
    }
}

// ── Error ─────────────────────────────────────────────────────

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{what} do not denote the same entity")]
    NotSame { what: String },

    #[error("Unknown event type: {0}")]
    InvalidEventType(String),

    #[error("Unsupported sync format version {found} (supported: {supported})")]
    UnsupportedVersion { found: i64, supported: i64 },

    #[error("Cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Merge conflict: {0}")]
    Merge(#[from] MergeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotSame { .. } => ErrorCode::NotSame,
            Self::InvalidEventType(_) => ErrorCode::InvalidEventType,
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            Self::Sync(SyncError::ContentUnavailable) => ErrorCode::ContentUnavailable,
            Self::Sync(SyncError::InvalidStateKey(_)) => ErrorCode::InvalidStateKey,
            Self::Sync(SyncError::Io(_)) | Self::ReadFile { .. } | Self::Io(_) => {
                ErrorCode::IoError
            }
            Self::Sync(SyncError::Json(_)) | Self::Json(_) => ErrorCode::JsonError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Merge(_) => ErrorCode::MergeConflict,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Recovery hint for humans and scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidEventType(_) => Some(format!(
                "Valid event types: {}",
                crate::sync::EventType::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),

            Self::UnsupportedVersion { .. } => Some(
                "The event was written by a newer release. Upgrade `itin` to read it.".to_string(),
            ),

            Self::Sync(SyncError::ContentUnavailable) => Some(
                "The content is stored externally. Pass the downloaded file with `--file`."
                    .to_string(),
            ),

            Self::Sync(SyncError::InvalidStateKey(_)) => Some(
                "Transfer state keys have the form Before-<batch-id> or After-<batch-id>"
                    .to_string(),
            ),

            Self::Merge(_) => Some(
                "Merging requires both inputs to describe the same entity. \
                 Check them with `itin match` first."
                    .to_string(),
            ),

            Self::Config(_) => Some(
                "Check the configuration file at $ITIN_CONFIG or ~/.itinerary/config.json"
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("kind") {
                    Some("Valid kinds: location, departure, section, journey".to_string())
                } else if msg.contains("change type") {
                    Some(
                        "Valid change types: BatchChange, BatchRemove, LiveDataChange, \
                         TransferChange, DocumentAdd, PkPassChange, TripGroupAdded, \
                         TripGroupChanged"
                            .to_string(),
                    )
                } else {
                    None
                }
            }

            Self::NotSame { .. }
            | Self::ReadFile { .. }
            | Self::Sync(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
