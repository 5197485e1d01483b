//! Sync types for the state event channel.
//!
//! This module defines the event type tags, the content location markers and
//! the raw event envelope exchanged with the transport layer.

use serde::{Deserialize, Serialize};

/// Wire format version written into every outbound payload.
pub const FORMAT_VERSION: i64 = 1;

/// Default ceiling for inline content, in bytes.
pub const CONTENT_SIZE_LIMIT: usize = 48 * 1024;

/// Application-level category of a state event.
///
/// The wire tags form a closed set; events with any other tag are rejected
/// when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A batch of reservations was added, changed or removed.
    #[serde(rename = "org.kde.itinerary.reservation")]
    Reservation,
    /// Real-time data for a batch.
    #[serde(rename = "org.kde.itinerary.livedata")]
    LiveData,
    /// A transfer before or after a batch.
    #[serde(rename = "org.kde.itinerary.transfer")]
    Transfer,
    /// A document attachment.
    #[serde(rename = "org.kde.itinerary.document")]
    Document,
    /// A boarding pass.
    #[serde(rename = "org.kde.itinerary.pkpass")]
    PkPass,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        Self::Reservation,
        Self::LiveData,
        Self::Transfer,
        Self::Document,
        Self::PkPass,
    ];

    /// The wire tag of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reservation => "org.kde.itinerary.reservation",
            Self::LiveData => "org.kde.itinerary.livedata",
            Self::Transfer => "org.kde.itinerary.transfer",
            Self::Document => "org.kde.itinerary.document",
            Self::PkPass => "org.kde.itinerary.pkpass",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown event type: {s}"))
    }
}

/// Where the payload of a state event lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Inline plain text.
    #[default]
    None,
    /// Inline base64.
    Base64,
    /// External file referenced by URL.
    File,
}

/// A state event as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStateEvent {
    /// Transport-assigned event id, used for echo suppression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Type tag, validated when decoding.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Identifier of the affected application entity.
    pub state_key: String,
    /// The payload object.
    pub content: serde_json::Value,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inline base64 content that does not decode.
    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// File-backed content without a local file.
    #[error("Content not available locally (download pending)")]
    ContentUnavailable,

    /// A local content file that cannot be read.
    #[error("Cannot read content file {path}: {source}")]
    Unreadable {
        /// Path of the content file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A state key that does not identify an application entity.
    #[error("Invalid state key: {0}")]
    InvalidStateKey(String),

    /// Invalid record format.
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
