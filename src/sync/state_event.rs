//! State event codec.
//!
//! A [`StateEvent`] wraps the JSON payload of one sync state event and hides
//! the payload size ceiling: small content is stored inline (as plain text or
//! base64, whichever is smaller), larger content goes into a local file that
//! is uploaded out of band and referenced by URL.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::sync::types::{
    ContentType, EventType, RawStateEvent, SyncError, SyncResult, CONTENT_SIZE_LIMIT, FORMAT_VERSION,
};

/// Settings for building outbound state events.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Ceiling for inline content, in bytes.
    pub size_limit: usize,
    /// Directory for external content files, system default if unset.
    pub temp_dir: Option<PathBuf>,
    /// Value of the `source` debug field. Host name if unset, omitted if empty.
    pub source: Option<String>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            size_limit: CONTENT_SIZE_LIMIT,
            temp_dir: None,
            source: None,
        }
    }
}

impl EncodeOptions {
    fn source_name(&self) -> Option<String> {
        match &self.source {
            Some(s) if s.is_empty() => None,
            Some(s) => Some(s.clone()),
            None => hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().into_owned())
                .filter(|h| !h.is_empty()),
        }
    }
}

#[derive(Debug)]
enum LocalFile {
    /// A file owned by the caller: a finished download or an upload source.
    Path(PathBuf),
    /// A temporary file owned by the event.
    Temp(NamedTempFile),
}

impl LocalFile {
    fn path(&self) -> &Path {
        match self {
            Self::Path(p) => p,
            Self::Temp(f) => f.path(),
        }
    }
}

/// One state event of the sync channel, inbound or outbound.
#[derive(Debug)]
pub struct StateEvent {
    event_type: EventType,
    state_key: String,
    content: Map<String, Value>,
    room_id: Option<String>,
    local: Option<LocalFile>,
    size_limit: usize,
    temp_dir: Option<PathBuf>,
}

impl StateEvent {
    /// Create an empty outbound event with default options.
    #[must_use]
    pub fn new(event_type: EventType, state_key: impl Into<String>) -> Self {
        Self::with_options(event_type, state_key, &EncodeOptions::default())
    }

    #[must_use]
    pub fn with_options(event_type: EventType, state_key: impl Into<String>, options: &EncodeOptions) -> Self {
        let mut content = Map::new();
        content.insert("version".into(), FORMAT_VERSION.into());
        if let Some(source) = options.source_name() {
            content.insert("source".into(), source.into());
        }
        Self {
            event_type,
            state_key: state_key.into(),
            content,
            room_id: None,
            local: None,
            size_limit: options.size_limit,
            temp_dir: options.temp_dir.clone(),
        }
    }

    /// Decode an inbound event received in `room_id`.
    ///
    /// Returns `None` for unknown type tags, non-object payloads and payloads
    /// without a version or with a version newer than [`FORMAT_VERSION`].
    #[must_use]
    pub fn from_raw(raw: &RawStateEvent, room_id: &str) -> Option<Self> {
        Self::from_raw_with_options(raw, room_id, &EncodeOptions::default())
    }

    #[must_use]
    pub fn from_raw_with_options(raw: &RawStateEvent, room_id: &str, options: &EncodeOptions) -> Option<Self> {
        let Ok(event_type) = raw.event_type.parse::<EventType>() else {
            debug!(event_type = %raw.event_type, "Ignoring state event of unknown type");
            return None;
        };
        let Value::Object(content) = &raw.content else {
            debug!(event_type = %raw.event_type, state_key = %raw.state_key, "Ignoring state event without object content");
            return None;
        };
        match content.get("version").and_then(Value::as_i64) {
            Some(v) if v <= FORMAT_VERSION => {}
            version => {
                debug!(?version, state_key = %raw.state_key, "Ignoring state event of unsupported version");
                return None;
            }
        }

        Some(Self {
            event_type,
            state_key: raw.state_key.clone(),
            content: content.clone(),
            room_id: Some(room_id.to_string()),
            local: None,
            size_limit: options.size_limit,
            temp_dir: options.temp_dir.clone(),
        })
    }

    /// Wire form of this event.
    #[must_use]
    pub fn to_raw(&self) -> RawStateEvent {
        RawStateEvent {
            event_id: None,
            event_type: self.event_type.as_str().to_string(),
            state_key: self.state_key.clone(),
            content: Value::Object(self.content.clone()),
        }
    }

    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[must_use]
    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    /// Room this event was received in, inbound events only.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self.content.get("contentType").and_then(Value::as_str) {
            Some("none") | None => ContentType::None,
            Some("base64") => ContentType::Base64,
            Some("file") => ContentType::File,
            Some(other) => {
                debug!(content_type = other, "Unknown state event content type");
                ContentType::None
            }
        }
    }

    fn set_content_type(&mut self, content_type: ContentType) {
        let tag = match content_type {
            ContentType::None => "none",
            ContentType::Base64 => "base64",
            ContentType::File => "file",
        };
        self.content.insert("contentType".into(), tag.into());
    }

    /// Whether any content has been set or received.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.contains_key("contentType") || self.local.is_some()
    }

    /// Remote URL of file-backed content.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.file_info()?
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
    }

    /// Metadata of the external content file (URL and encryption data).
    #[must_use]
    pub fn file_info(&self) -> Option<&Map<String, Value>> {
        self.content.get("file").and_then(Value::as_object)
    }

    /// Record the result of an upload.
    pub fn set_file_info(&mut self, info: Map<String, Value>) {
        self.content.insert("file".into(), Value::Object(info));
    }

    /// File-backed content that has not been downloaded yet.
    #[must_use]
    pub fn needs_download(&self) -> bool {
        self.url().is_some() && self.local.is_none()
    }

    /// File-backed content that has not been uploaded yet.
    #[must_use]
    pub fn needs_upload(&self) -> bool {
        self.url().is_none() && self.content_type() == ContentType::File && self.local.is_some()
    }

    /// Local file holding the content.
    ///
    /// Inline content is written to a temporary file on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if inline content cannot be decoded or written.
    pub fn file_name(&mut self) -> SyncResult<Option<PathBuf>> {
        if self.local.is_none() && self.content.contains_key("content") {
            let data = self.content()?;
            let mut file = self.temp_file()?;
            file.write_all(&data)?;
            file.flush()?;
            self.local = Some(LocalFile::Temp(file));
        }
        Ok(self.local.as_ref().map(|f| f.path().to_path_buf()))
    }

    /// Attach a local file.
    ///
    /// For events with a remote URL this is the finished download. Otherwise
    /// the file is the outbound content: small files are stored inline, larger
    /// ones are kept for upload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unreadable`] if an outbound file cannot be read.
    pub fn set_file_name(&mut self, path: impl Into<PathBuf>) -> SyncResult<()> {
        let path = path.into();
        if self.url().is_some() {
            self.local = Some(LocalFile::Path(path));
            return Ok(());
        }

        let unreadable = |source: std::io::Error| SyncError::Unreadable {
            path: path.display().to_string(),
            source,
        };
        let size = fs::metadata(&path).map_err(unreadable)?.len();
        if usize::try_from(size).is_ok_and(|s| s < self.size_limit.saturating_mul(4) / 3) {
            let data = fs::read(&path).map_err(unreadable)?;
            return self.set_content(&data);
        }

        debug!(path = %path.display(), size, "Content file exceeds inline limit");
        self.content.remove("content");
        self.content.remove("file");
        self.set_content_type(ContentType::File);
        self.local = Some(LocalFile::Path(path));
        Ok(())
    }

    /// The decoded content.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ContentUnavailable`] for file-backed content that
    /// has not been downloaded, [`SyncError::Unreadable`] if the local file
    /// cannot be read, and [`SyncError::Base64`] for corrupt inline content.
    pub fn content(&self) -> SyncResult<Vec<u8>> {
        let inline = || self.content.get("content").and_then(Value::as_str).unwrap_or_default();
        match self.content_type() {
            ContentType::None => Ok(inline().as_bytes().to_vec()),
            ContentType::Base64 => Ok(STANDARD.decode(inline())?),
            ContentType::File => {
                let file = self.local.as_ref().ok_or(SyncError::ContentUnavailable)?;
                fs::read(file.path()).map_err(|source| {
                    warn!(path = %file.path().display(), error = %source, "Failed to read content file");
                    SyncError::Unreadable {
                        path: file.path().display().to_string(),
                        source,
                    }
                })
            }
        }
    }

    /// Set the content, choosing the most compact representation.
    ///
    /// Content is stored inline as plain text or base64, whichever would be
    /// smaller once embedded in the JSON payload, with plain text preferred on
    /// a tie. Content too large for either goes into a temporary file and
    /// needs to be uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written.
    pub fn set_content(&mut self, data: &[u8]) -> SyncResult<()> {
        // estimate JSON escaping overhead, pointless if too large anyway
        let quoting_cost: usize = if data.len() < self.size_limit {
            data.iter()
                .map(|&b| match b {
                    b'\n' | b'"' => 1,
                    b if !(0x20..0x7f).contains(&b) => 3,
                    _ => 0,
                })
                .sum()
        } else {
            0
        };
        let raw_size = data.len() + quoting_cost;
        let base64_size = data.len() * 4 / 3;

        self.local = None;
        self.content.remove("file");
        if raw_size.min(base64_size) > self.size_limit {
            let mut file = self.temp_file()?;
            file.write_all(data)?;
            file.flush()?;
            debug!(state_key = %self.state_key, size = data.len(), "Content moved to external file");
            self.local = Some(LocalFile::Temp(file));
            self.content.remove("content");
            self.set_content_type(ContentType::File);
            return Ok(());
        }

        let text = if raw_size <= base64_size {
            std::str::from_utf8(data).ok()
        } else {
            None
        };
        if let Some(text) = text {
            self.content.insert("content".into(), text.into());
            self.set_content_type(ContentType::None);
        } else {
            self.content.insert("content".into(), STANDARD.encode(data).into());
            self.set_content_type(ContentType::Base64);
        }
        Ok(())
    }

    /// Small sidecar value stored next to the content.
    #[must_use]
    pub fn extra_data(&self, key: &str) -> Option<&Value> {
        self.content.get("extra")?.as_object()?.get(key)
    }

    pub fn set_extra_data(&mut self, key: &str, value: impl Into<Value>) {
        let extra = self
            .content
            .entry("extra")
            .or_insert_with(|| Value::Object(Map::new()));
        if !extra.is_object() {
            *extra = Value::Object(Map::new());
        }
        if let Value::Object(map) = extra {
            map.insert(key.to_string(), value.into());
        }
    }

    fn temp_file(&self) -> SyncResult<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("itin-sync-");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }
}
