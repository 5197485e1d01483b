//! Encode command implementation.

use std::path::Path;

use colored::Colorize;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::{EventType, StateEvent};

/// Build an outbound state event carrying the content of `file`.
///
/// Content too large to inline is marked for upload; the printed event then
/// lacks a URL until the upload is done.
pub fn execute(
    config: &SyncConfig,
    event_type: &str,
    key: &str,
    file: &Path,
    json: bool,
) -> Result<()> {
    let event_type: EventType = event_type
        .parse()
        .map_err(|_| Error::InvalidEventType(event_type.to_string()))?;
    if key.is_empty() {
        return Err(Error::InvalidArgument("state key must not be empty".into()));
    }

    let mut event = StateEvent::with_options(event_type, key, &config.encode_options());
    event.set_file_name(file)?;
    let raw = event.to_raw();
    let needs_upload = event.needs_upload();

    if json {
        let output = serde_json::json!({
            "event": raw,
            "contentType": event.content_type(),
            "needsUpload": needs_upload,
            "uploadFile": needs_upload.then(|| file.display().to_string()),
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&raw)?);
    if needs_upload {
        println!(
            "{} content exceeds the inline limit of {} bytes, upload {} and set the URL",
            "!".yellow(),
            config.content_size_limit,
            file.display()
        );
    }
    Ok(())
}
