//! Replay command implementation.
//!
//! Feeds a recorded stream of remote state events through the inbound queue
//! and applies every dispatched event to in-memory stores. Downloads are
//! answered from a local directory holding the files under the last path
//! segment of their URL.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::{
    read_batch, read_document, read_jsonl, read_live_data, read_pk_pass, read_transfer, Alignment,
    AttachmentStore, ContentType, EventType, InboundQueue, InboundSink, LiveData, LiveDataStore,
    RawStateEvent, ReservationStore, StateEvent, SyncResult, TransferStore,
};

/// Arguments of the replay command.
pub struct ReplayArgs<'a> {
    pub events: &'a Path,
    pub files: Option<&'a Path>,
    pub room: &'a str,
    pub known_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Dispatched {
    #[serde(rename = "type")]
    event_type: EventType,
    state_key: String,
    content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Application state rebuilt from the replayed events.
#[derive(Debug, Default)]
struct ReplayStore {
    batches: BTreeMap<String, Vec<String>>,
    reservations: HashMap<String, Value>,
    live_data: HashMap<String, LiveData>,
    transfers: HashMap<(String, Alignment), Value>,
    documents: HashMap<String, (Value, Vec<u8>)>,
    pk_passes: HashMap<String, Vec<u8>>,
}

/// Entity counts of a [`ReplayStore`].
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct StoreSummary {
    batches: usize,
    reservations: usize,
    live_data: usize,
    transfers: usize,
    documents: usize,
    pk_passes: usize,
}

impl ReplayStore {
    fn summary(&self) -> StoreSummary {
        StoreSummary {
            batches: self.batches.len(),
            reservations: self.reservations.len(),
            live_data: self.live_data.len(),
            transfers: self.transfers.len(),
            documents: self.documents.len(),
            pk_passes: self.pk_passes.len(),
        }
    }
}

impl ReservationStore for ReplayStore {
    fn reservations_for_batch(&self, batch_id: &str) -> Vec<String> {
        self.batches.get(batch_id).cloned().unwrap_or_default()
    }

    fn reservation(&self, res_id: &str) -> Option<Value> {
        self.reservations.get(res_id).cloned()
    }

    fn has_batch(&self, batch_id: &str) -> bool {
        self.batches.contains_key(batch_id)
    }

    // A reservation names its batch in `batch`, otherwise it starts its own.
    fn add_reservation(&mut self, res_id: &str, reservation: Value) {
        let batch_id = reservation["batch"].as_str().unwrap_or(res_id).to_string();
        let ids = self.batches.entry(batch_id).or_default();
        if !ids.iter().any(|id| id == res_id) {
            ids.push(res_id.to_string());
        }
        self.reservations.insert(res_id.to_string(), reservation);
    }

    fn update_batch(&mut self, batch_id: &str, changes: Vec<(String, Value)>) {
        self.remove_batch(batch_id);
        let ids = changes.iter().map(|(id, _)| id.clone()).collect();
        self.batches.insert(batch_id.to_string(), ids);
        self.reservations.extend(changes);
    }

    fn remove_batch(&mut self, batch_id: &str) {
        for id in self.batches.remove(batch_id).unwrap_or_default() {
            self.reservations.remove(&id);
        }
    }
}

impl LiveDataStore for ReplayStore {
    fn live_data(&self, batch_id: &str) -> LiveData {
        self.live_data.get(batch_id).cloned().unwrap_or_default()
    }

    fn store_live_data(&mut self, batch_id: &str, data: LiveData) {
        if data.is_empty() {
            self.live_data.remove(batch_id);
        } else {
            self.live_data.insert(batch_id.to_string(), data);
        }
    }
}

impl TransferStore for ReplayStore {
    fn transfer(&self, batch_id: &str, alignment: Alignment) -> Option<Value> {
        self.transfers.get(&(batch_id.to_string(), alignment)).cloned()
    }

    fn store_transfer(&mut self, batch_id: &str, alignment: Alignment, transfer: Value) {
        self.transfers.insert((batch_id.to_string(), alignment), transfer);
    }

    fn remove_transfer(&mut self, batch_id: &str, alignment: Alignment) {
        self.transfers.remove(&(batch_id.to_string(), alignment));
    }
}

// Received attachments have no local file.
impl AttachmentStore for ReplayStore {
    fn document_path(&self, _doc_id: &str) -> Option<PathBuf> {
        None
    }

    fn document_info(&self, doc_id: &str) -> Option<Value> {
        self.documents.get(doc_id).map(|(info, _)| info.clone())
    }

    fn add_document(&mut self, doc_id: &str, info: Value, data: Vec<u8>) {
        self.documents.insert(doc_id.to_string(), (info, data));
    }

    fn pk_pass_path(&self, _pass_id: &str) -> Option<PathBuf> {
        None
    }

    fn import_pk_pass(&mut self, pass_id: &str, data: Vec<u8>) {
        self.pk_passes.insert(pass_id.to_string(), data);
    }
}

type Apply = fn(&StateEvent, &mut ReplayStore) -> SyncResult<()>;

#[derive(Debug, Default)]
struct ReplaySink {
    requested: Option<String>,
    dispatched: Vec<Dispatched>,
    store: ReplayStore,
}

impl ReplaySink {
    fn apply(&mut self, event: &StateEvent, apply: Apply) {
        let size = event.content().as_ref().ok().map(Vec::len);
        let result = apply(event, &mut self.store);
        if let Err(e) = &result {
            warn!(state_key = event.state_key(), error = %e, "Failed to apply event");
        }
        self.dispatched.push(Dispatched {
            event_type: event.event_type(),
            state_key: event.state_key().to_string(),
            content_type: event.content_type(),
            size,
            applied: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
    }
}

impl InboundSink for ReplaySink {
    fn download_file(&mut self, event: &StateEvent) {
        self.requested = event.url().map(str::to_string);
    }

    fn reservation_event(&mut self, event: StateEvent) {
        self.apply(&event, |e, store| read_batch(e, store).map(|_| ()));
    }

    fn live_data_event(&mut self, event: StateEvent) {
        self.apply(&event, |e, store| read_live_data(e, store));
    }

    fn transfer_event(&mut self, event: StateEvent) {
        self.apply(&event, |e, store| read_transfer(e, store));
    }

    fn document_event(&mut self, event: StateEvent) {
        self.apply(&event, |e, store| read_document(e, store));
    }

    fn pk_pass_event(&mut self, event: StateEvent) {
        self.apply(&event, |e, store| read_pk_pass(e, store));
    }
}

/// Local file standing in for the download of `url`.
fn downloaded_file(files: &Path, url: &str) -> Option<PathBuf> {
    let name = url.rsplit('/').next().filter(|n| !n.is_empty())?;
    let path = files.join(name);
    path.is_file().then_some(path)
}

/// Answer every pending download request of the queue.
fn resolve_downloads(
    queue: &mut InboundQueue<ReplaySink>,
    files: Option<&Path>,
    failed: &mut usize,
) -> Result<()> {
    while let Some(url) = queue.sink_mut().requested.take() {
        match files.and_then(|dir| downloaded_file(dir, &url)) {
            Some(path) => queue.set_file_name(path)?,
            None => {
                warn!(url = %url, "No local file for download");
                *failed += 1;
                queue.download_failed();
            }
        }
    }
    Ok(())
}

/// Execute the replay command.
pub fn execute(config: &SyncConfig, args: &ReplayArgs<'_>, json: bool) -> Result<()> {
    let events: Vec<RawStateEvent> = read_jsonl(args.events)?;

    let mut queue = InboundQueue::with_options(ReplaySink::default(), config.encode_options());
    for id in args.known_ids {
        queue.add_known_event_id(id.as_str());
    }

    let mut failed = 0;
    for raw in &events {
        queue.append(raw, args.room);
        resolve_downloads(&mut queue, args.files, &mut failed)?;
    }

    let pending = queue.len();
    let sink = queue.into_sink();
    let dispatched = sink.dispatched;
    let store = sink.store.summary();

    if json {
        let output = serde_json::json!({
            "read": events.len(),
            "dispatched": dispatched,
            "failedDownloads": failed,
            "pending": pending,
            "store": store,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    for (idx, d) in dispatched.iter().enumerate() {
        let detail = match (&d.error, &d.size) {
            (Some(error), _) => error.red(),
            (None, Some(size)) => format!("{size} bytes").dimmed(),
            (None, None) => "".normal(),
        };
        println!("{:>3}. {}  {}  {}", idx + 1, d.event_type, d.state_key.bold(), detail);
    }
    println!();
    println!(
        "Read {} events, dispatched {}, {} failed downloads, {} pending",
        events.len(),
        dispatched.len(),
        failed,
        pending
    );
    println!(
        "Store: {} batches, {} reservations, {} live data, {} transfers, {} documents, {} passes",
        store.batches,
        store.reservations,
        store.live_data,
        store.transfers,
        store.documents,
        store.pk_passes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn raw(event_type: EventType, state_key: &str, content: serde_json::Value) -> RawStateEvent {
        RawStateEvent {
            event_id: None,
            event_type: event_type.as_str().to_string(),
            state_key: state_key.to_string(),
            content,
        }
    }

    #[test]
    fn test_downloaded_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("abc123"), "data").unwrap();

        assert_eq!(
            downloaded_file(temp_dir.path(), "mxc://example.org/abc123"),
            Some(temp_dir.path().join("abc123"))
        );
        assert_eq!(downloaded_file(temp_dir.path(), "mxc://example.org/missing"), None);
        assert_eq!(downloaded_file(temp_dir.path(), "mxc://example.org/"), None);
    }

    #[test]
    fn test_downloads_resolved_in_order() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pass1"), "PKPASS").unwrap();

        let mut queue = InboundQueue::new(ReplaySink::default());
        let mut failed = 0;
        let events = [
            raw(
                EventType::PkPass,
                "pass-1",
                json!({"version": 1, "contentType": "file", "file": {"url": "mxc://example.org/pass1"}}),
            ),
            raw(EventType::Reservation, "res-1", json!({"version": 1, "content": "{}"})),
            raw(
                EventType::Document,
                "doc-1",
                json!({"version": 1, "contentType": "file", "file": {"url": "mxc://example.org/gone"}}),
            ),
            raw(EventType::Transfer, "After-res-1", json!({"version": 1, "content": "{}"})),
        ];
        for event in &events {
            queue.append(event, "!room");
            resolve_downloads(&mut queue, Some(temp_dir.path()), &mut failed).unwrap();
        }

        assert_eq!(failed, 1);
        assert!(queue.is_empty());
        let sink = queue.into_sink();
        let keys: Vec<_> = sink.dispatched.iter().map(|d| d.state_key.as_str()).collect();
        assert_eq!(keys, ["pass-1", "res-1", "After-res-1"]);
        assert_eq!(sink.dispatched[0].size, Some(6));
        assert!(sink.dispatched.iter().all(|d| d.applied));
        assert_eq!(sink.store.pk_passes["pass-1"], b"PKPASS");
    }

    #[test]
    fn test_events_applied_to_store() {
        let mut queue = InboundQueue::new(ReplaySink::default());
        let batch = json!({"b1": {"batch": "b1", "seat": "42"}, "r2": {"batch": "b1"}}).to_string();
        let events = [
            raw(EventType::Reservation, "b1", json!({"version": 1, "content": batch})),
            raw(EventType::Transfer, "Before-b1", json!({"version": 1, "content": "{\"to\":\"Berlin Hbf\"}"})),
            raw(EventType::Transfer, "Sideways-b1", json!({"version": 1, "content": "{\"to\":\"x\"}"})),
            raw(
                EventType::Document,
                "doc-1",
                json!({"version": 1, "content": "ticket", "extra": {"metaData": {"name": "ticket.txt"}}}),
            ),
            raw(EventType::LiveData, "b1", json!({"version": 1, "content": "{}"})),
        ];
        for event in &events {
            queue.append(event, "!room");
        }

        let sink = queue.into_sink();
        let applied: Vec<_> = sink.dispatched.iter().map(|d| d.applied).collect();
        assert_eq!(applied, [true, true, false, true, true]);
        assert!(sink.dispatched[2].error.is_some());

        let store = &sink.store;
        assert_eq!(store.reservations_for_batch("b1"), ["b1", "r2"]);
        assert_eq!(store.reservation("b1").unwrap()["seat"], "42");
        assert_eq!(store.transfer("b1", Alignment::Before).unwrap()["to"], "Berlin Hbf");
        assert_eq!(store.document_info("doc-1").unwrap()["name"], "ticket.txt");
        assert_eq!(
            store.summary(),
            StoreSummary {
                batches: 1,
                reservations: 2,
                live_data: 0,
                transfers: 1,
                documents: 1,
                pk_passes: 0,
            }
        );
    }

    #[test]
    fn test_batch_update_and_removal() {
        let mut queue = InboundQueue::new(ReplaySink::default());
        let first = json!({"b1": {"batch": "b1"}, "r2": {"batch": "b1"}}).to_string();
        let second = json!({"b1": {"batch": "b1", "seat": "7"}}).to_string();
        queue.append(&raw(EventType::Reservation, "b1", json!({"version": 1, "content": first})), "!room");
        queue.append(&raw(EventType::Reservation, "b1", json!({"version": 1, "content": second})), "!room");
        {
            let store = &queue.sink_mut().store;
            assert_eq!(store.reservations_for_batch("b1"), ["b1"]);
            assert!(store.reservation("r2").is_none());
            assert_eq!(store.reservation("b1").unwrap()["seat"], "7");
        }

        queue.append(&raw(EventType::Reservation, "b1", json!({"version": 1})), "!room");
        assert_eq!(queue.into_sink().store.summary().batches, 0);
    }
}
