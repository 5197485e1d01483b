//! Decode command implementation.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::read_json;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::{EventType, RawStateEvent, StateEvent, FORMAT_VERSION};

/// Arguments of the decode command.
pub struct DecodeArgs<'a> {
    pub event: &'a Path,
    pub room: &'a str,
    pub file: Option<&'a Path>,
    pub output: Option<&'a Path>,
}

/// Decode a wire event and write its content.
///
/// Without `--output` the content goes to stdout, or a summary when `--json`
/// is set.
pub fn execute(config: &SyncConfig, args: &DecodeArgs<'_>, json: bool) -> Result<()> {
    let raw: RawStateEvent = read_json(args.event)?;
    check_decodable(&raw)?;

    let mut event = StateEvent::from_raw_with_options(&raw, args.room, &config.encode_options())
        .ok_or_else(|| Error::InvalidArgument("event content is not a state event payload".into()))?;
    if let Some(file) = args.file {
        if event.url().is_some() {
            event.set_file_name(file)?;
        } else {
            warn!(path = %file.display(), "Event content is inline, ignoring --file");
        }
    }
    let data = event.content()?;

    if let Some(output) = args.output {
        std::fs::write(output, &data)?;
    } else if !json {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&data)?;
        stdout.flush()?;
    }

    if json {
        let output = serde_json::json!({
            "type": event.event_type(),
            "stateKey": event.state_key(),
            "contentType": event.content_type(),
            "url": event.url(),
            "size": data.len(),
            "output": args.output.map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}

/// Turn the reasons `StateEvent::from_raw` rejects an event into errors.
fn check_decodable(raw: &RawStateEvent) -> Result<()> {
    if raw.event_type.parse::<EventType>().is_err() {
        return Err(Error::InvalidEventType(raw.event_type.clone()));
    }
    match raw.content.get("version").and_then(Value::as_i64) {
        Some(v) if v <= FORMAT_VERSION => Ok(()),
        Some(v) => Err(Error::UnsupportedVersion {
            found: v,
            supported: FORMAT_VERSION,
        }),
        None => Err(Error::InvalidArgument("event content carries no version".into())),
    }
}
