//! Conversion between application changes and state events.
//!
//! Each application entity kind maps to one event type. The stores holding
//! the entities are collaborators behind the traits below.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{Departure, JourneySection, MergeResult};
use crate::sync::state_event::{EncodeOptions, StateEvent};
use crate::sync::types::{EventType, SyncError, SyncResult};

/// Reservations grouped into batches.
pub trait ReservationStore {
    /// Reservation ids belonging to `batch_id`, the batch id itself included.
    fn reservations_for_batch(&self, batch_id: &str) -> Vec<String>;
    fn reservation(&self, res_id: &str) -> Option<Value>;
    fn has_batch(&self, batch_id: &str) -> bool;
    fn add_reservation(&mut self, res_id: &str, reservation: Value);
    /// Replace the reservations of an existing batch. The first change is the
    /// batch's own reservation.
    fn update_batch(&mut self, batch_id: &str, changes: Vec<(String, Value)>);
    fn remove_batch(&mut self, batch_id: &str);
}

/// Real-time data per batch.
pub trait LiveDataStore {
    fn live_data(&self, batch_id: &str) -> LiveData;
    fn store_live_data(&mut self, batch_id: &str, data: LiveData);
}

/// Transfers before and after batches.
pub trait TransferStore {
    fn transfer(&self, batch_id: &str, alignment: Alignment) -> Option<Value>;
    fn store_transfer(&mut self, batch_id: &str, alignment: Alignment, transfer: Value);
    fn remove_transfer(&mut self, batch_id: &str, alignment: Alignment);
}

/// Documents and boarding passes.
pub trait AttachmentStore {
    fn document_path(&self, doc_id: &str) -> Option<PathBuf>;
    fn document_info(&self, doc_id: &str) -> Option<Value>;
    fn add_document(&mut self, doc_id: &str, info: Value, data: Vec<u8>);
    fn pk_pass_path(&self, pass_id: &str) -> Option<PathBuf>;
    fn import_pk_pass(&mut self, pass_id: &str, data: Vec<u8>);
}

/// Real-time data of one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<Departure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<Departure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey: Option<JourneySection>,
}

impl LiveData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.departure.is_none() && self.arrival.is_none() && self.journey.is_none()
    }
}

/// Position of a transfer relative to its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    Before,
    After,
}

impl Alignment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "Before",
            Self::After => "After",
        }
    }
}

/// State key of a transfer, e.g. `Before-<batch id>`.
#[must_use]
pub fn transfer_identifier(batch_id: &str, alignment: Alignment) -> String {
    format!("{}-{batch_id}", alignment.as_str())
}

/// Inverse of [`transfer_identifier`].
#[must_use]
pub fn parse_transfer_identifier(id: &str) -> Option<(String, Alignment)> {
    let (prefix, batch_id) = id.split_once('-')?;
    let alignment = match prefix {
        "Before" => Alignment::Before,
        "After" => Alignment::After,
        _ => return None,
    };
    (!batch_id.is_empty()).then(|| (batch_id.to_string(), alignment))
}

fn parse_object(data: &[u8]) -> SyncResult<Map<String, Value>> {
    if data.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice(data)? {
        Value::Object(obj) => Ok(obj),
        _ => Ok(Map::new()),
    }
}

/// Event carrying all reservations of a batch.
///
/// # Errors
///
/// Returns an error if the content cannot be stored.
pub fn state_event_for_batch(
    batch_id: &str,
    store: &impl ReservationStore,
    options: &EncodeOptions,
) -> SyncResult<StateEvent> {
    let mut content = Map::new();
    for res_id in store.reservations_for_batch(batch_id) {
        if let Some(res) = store.reservation(&res_id) {
            content.insert(res_id, res);
        }
    }
    let mut event = StateEvent::with_options(EventType::Reservation, batch_id, options);
    event.set_content(serde_json::to_string(&content)?.as_bytes())?;
    Ok(event)
}

/// Event announcing the removal of a batch: one without content.
#[must_use]
pub fn state_event_for_deleted_batch(batch_id: &str, options: &EncodeOptions) -> StateEvent {
    StateEvent::with_options(EventType::Reservation, batch_id, options)
}

/// Apply a reservation event.
///
/// Returns the affected batch id, or `None` if the batch was removed.
///
/// # Errors
///
/// Returns an error if the content cannot be read or parsed.
pub fn read_batch(event: &StateEvent, store: &mut impl ReservationStore) -> SyncResult<Option<String>> {
    let batch_id = event.state_key();
    let mut content = parse_object(&event.content()?)?;
    if content.is_empty() {
        debug!(batch_id, "Removing batch");
        store.remove_batch(batch_id);
        return Ok(None);
    }

    let mut changes = Vec::with_capacity(content.len());
    if let Some(own) = content.remove(batch_id) {
        changes.push((batch_id.to_string(), own));
    }
    changes.extend(content);

    if store.has_batch(batch_id) {
        debug!(batch_id, reservations = changes.len(), "Updating batch");
        store.update_batch(batch_id, changes);
    } else {
        debug!(batch_id, reservations = changes.len(), "Creating batch");
        for (res_id, res) in changes {
            store.add_reservation(&res_id, res);
        }
    }
    Ok(Some(batch_id.to_string()))
}

/// Event carrying the real-time data of a batch.
///
/// # Errors
///
/// Returns an error if the content cannot be stored.
pub fn state_event_for_live_data(
    batch_id: &str,
    store: &impl LiveDataStore,
    options: &EncodeOptions,
) -> SyncResult<StateEvent> {
    let data = store.live_data(batch_id);
    let mut event = StateEvent::with_options(EventType::LiveData, batch_id, options);
    event.set_content(serde_json::to_string(&data)?.as_bytes())?;
    Ok(event)
}

/// Incoming data wins; if it describes the same stop or section as the stored
/// data, gaps are filled from the stored value. Absent incoming data clears.
fn refresh<T>(
    incoming: Option<T>,
    stored: Option<T>,
    is_same: fn(&T, &T) -> bool,
    merge: fn(&T, &T) -> MergeResult<T>,
) -> Option<T> {
    match (incoming, stored) {
        (Some(new), Some(old)) if is_same(&new, &old) => match merge(&new, &old) {
            Ok(merged) => Some(merged),
            Err(e) => {
                debug!(error = %e, "Replacing live data that cannot be merged");
                Some(new)
            }
        },
        (new, _) => new,
    }
}

/// Apply a live data event.
///
/// # Errors
///
/// Returns an error if the content cannot be read or parsed.
pub fn read_live_data(event: &StateEvent, store: &mut impl LiveDataStore) -> SyncResult<()> {
    let batch_id = event.state_key();
    let data = event.content()?;
    let incoming: LiveData = if data.is_empty() {
        LiveData::default()
    } else {
        serde_json::from_slice(&data)?
    };
    let stored = store.live_data(batch_id);

    let merged = LiveData {
        departure: refresh(incoming.departure, stored.departure, Departure::is_same, Departure::merge),
        arrival: refresh(incoming.arrival, stored.arrival, Departure::is_same, Departure::merge),
        journey: refresh(
            incoming.journey,
            stored.journey,
            JourneySection::is_same,
            JourneySection::merge,
        ),
    };
    store.store_live_data(batch_id, merged);
    Ok(())
}

/// Event carrying a transfer, without content if the transfer was removed.
///
/// # Errors
///
/// Returns an error if the content cannot be stored.
pub fn state_event_for_transfer(
    batch_id: &str,
    alignment: Alignment,
    store: &impl TransferStore,
    options: &EncodeOptions,
) -> SyncResult<StateEvent> {
    let key = transfer_identifier(batch_id, alignment);
    let mut event = StateEvent::with_options(EventType::Transfer, key, options);
    if let Some(transfer) = store.transfer(batch_id, alignment) {
        event.set_content(serde_json::to_string(&transfer)?.as_bytes())?;
    }
    Ok(event)
}

/// Apply a transfer event.
///
/// # Errors
///
/// Returns [`SyncError::InvalidStateKey`] for keys not produced by
/// [`transfer_identifier`], or an error if the content cannot be read.
pub fn read_transfer(event: &StateEvent, store: &mut impl TransferStore) -> SyncResult<()> {
    let (batch_id, alignment) = parse_transfer_identifier(event.state_key())
        .ok_or_else(|| SyncError::InvalidStateKey(event.state_key().to_string()))?;
    let content = parse_object(&event.content()?)?;
    if content.is_empty() {
        store.remove_transfer(&batch_id, alignment);
    } else {
        store.store_transfer(&batch_id, alignment, Value::Object(content));
    }
    Ok(())
}

/// Event carrying a document and its metadata.
///
/// # Errors
///
/// Returns [`SyncError::ContentUnavailable`] for unknown documents, or an
/// error if the document file cannot be read.
pub fn state_event_for_document(
    doc_id: &str,
    store: &impl AttachmentStore,
    options: &EncodeOptions,
) -> SyncResult<StateEvent> {
    let path = store.document_path(doc_id).ok_or(SyncError::ContentUnavailable)?;
    let mut event = StateEvent::with_options(EventType::Document, doc_id, options);
    if let Some(info) = store.document_info(doc_id) {
        event.set_extra_data("metaData", info);
    }
    event.set_file_name(path)?;
    Ok(event)
}

/// Apply a document event.
///
/// # Errors
///
/// Returns an error if the content is not available.
pub fn read_document(event: &StateEvent, store: &mut impl AttachmentStore) -> SyncResult<()> {
    let data = event.content()?;
    let info = event.extra_data("metaData").cloned().unwrap_or(Value::Null);
    store.add_document(event.state_key(), info, data);
    Ok(())
}

/// Event carrying a boarding pass file.
///
/// # Errors
///
/// Returns [`SyncError::ContentUnavailable`] for unknown passes, or an error
/// if the pass file cannot be read.
pub fn state_event_for_pk_pass(
    pass_id: &str,
    store: &impl AttachmentStore,
    options: &EncodeOptions,
) -> SyncResult<StateEvent> {
    let path = store.pk_pass_path(pass_id).ok_or(SyncError::ContentUnavailable)?;
    let mut event = StateEvent::with_options(EventType::PkPass, pass_id, options);
    event.set_file_name(path)?;
    Ok(event)
}

/// Apply a boarding pass event.
///
/// # Errors
///
/// Returns an error if the content is not available.
pub fn read_pk_pass(event: &StateEvent, store: &mut impl AttachmentStore) -> SyncResult<()> {
    store.import_pk_pass(event.state_key(), event.content()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Line, Location, Mode, Route};
    use crate::sync::types::RawStateEvent;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use std::fs;
    use tempfile::TempDir;

    fn options() -> EncodeOptions {
        EncodeOptions {
            source: Some(String::new()),
            ..EncodeOptions::default()
        }
    }

    /// Send an outbound event through the wire format.
    fn transmit(event: &StateEvent) -> StateEvent {
        let raw: RawStateEvent = serde_json::from_value(serde_json::to_value(event.to_raw()).unwrap()).unwrap();
        StateEvent::from_raw(&raw, "room42").unwrap()
    }

    #[derive(Default)]
    struct Reservations {
        batches: BTreeMap<String, Vec<String>>,
        reservations: HashMap<String, Value>,
        updates: usize,
    }

    impl ReservationStore for Reservations {
        fn reservations_for_batch(&self, batch_id: &str) -> Vec<String> {
            self.batches.get(batch_id).cloned().unwrap_or_default()
        }
        fn reservation(&self, res_id: &str) -> Option<Value> {
            self.reservations.get(res_id).cloned()
        }
        fn has_batch(&self, batch_id: &str) -> bool {
            self.batches.contains_key(batch_id)
        }
        fn add_reservation(&mut self, res_id: &str, reservation: Value) {
            let batch_id = reservation["batch"].as_str().unwrap_or(res_id).to_string();
            self.batches.entry(batch_id).or_default().push(res_id.to_string());
            self.reservations.insert(res_id.to_string(), reservation);
        }
        fn update_batch(&mut self, batch_id: &str, changes: Vec<(String, Value)>) {
            self.updates += 1;
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

    #[derive(Default)]
    struct LiveDataMap(HashMap<String, LiveData>);

    impl LiveDataStore for LiveDataMap {
        fn live_data(&self, batch_id: &str) -> LiveData {
            self.0.get(batch_id).cloned().unwrap_or_default()
        }
        fn store_live_data(&mut self, batch_id: &str, data: LiveData) {
            self.0.insert(batch_id.to_string(), data);
        }
    }

    #[derive(Default)]
    struct Transfers(HashMap<(String, Alignment), Value>);

    impl TransferStore for Transfers {
        fn transfer(&self, batch_id: &str, alignment: Alignment) -> Option<Value> {
            self.0.get(&(batch_id.to_string(), alignment)).cloned()
        }
        fn store_transfer(&mut self, batch_id: &str, alignment: Alignment, transfer: Value) {
            self.0.insert((batch_id.to_string(), alignment), transfer);
        }
        fn remove_transfer(&mut self, batch_id: &str, alignment: Alignment) {
            self.0.remove(&(batch_id.to_string(), alignment));
        }
    }

    #[derive(Default)]
    struct Attachments {
        files: HashMap<String, PathBuf>,
        infos: HashMap<String, Value>,
        received: HashMap<String, (Value, Vec<u8>)>,
    }

    impl AttachmentStore for Attachments {
        fn document_path(&self, doc_id: &str) -> Option<PathBuf> {
            self.files.get(doc_id).cloned()
        }
        fn document_info(&self, doc_id: &str) -> Option<Value> {
            self.infos.get(doc_id).cloned()
        }
        fn add_document(&mut self, doc_id: &str, info: Value, data: Vec<u8>) {
            self.received.insert(doc_id.to_string(), (info, data));
        }
        fn pk_pass_path(&self, pass_id: &str) -> Option<PathBuf> {
            self.files.get(pass_id).cloned()
        }
        fn import_pk_pass(&mut self, pass_id: &str, data: Vec<u8>) {
            self.received.insert(pass_id.to_string(), (Value::Null, data));
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_reservation_batch() {
        let mut mgr = Reservations::default();
        mgr.add_reservation("b1", json!({"batch": "b1", "passenger": "A"}));
        mgr.add_reservation("r2", json!({"batch": "b1", "passenger": "B"}));
        mgr.add_reservation("b2", json!({"batch": "b2", "passenger": "A"}));
        assert_eq!(mgr.reservations_for_batch("b1").len(), 2);

        let ev = state_event_for_batch("b1", &mgr, &options()).unwrap();
        assert_eq!(ev.event_type(), EventType::Reservation);
        assert_eq!(ev.state_key(), "b1");
        assert!(!ev.content().unwrap().is_empty());

        let ev = transmit(&ev);
        assert_eq!(read_batch(&ev, &mut mgr).unwrap(), Some("b1".to_string()));
        assert_eq!(mgr.updates, 1);
        assert_eq!(mgr.batches.len(), 2);
        assert_eq!(mgr.reservations_for_batch("b1")[0], "b1");

        mgr.remove_batch("b1");
        assert!(!mgr.has_batch("b1"));
        assert_eq!(read_batch(&ev, &mut mgr).unwrap(), Some("b1".to_string()));
        assert!(mgr.has_batch("b1"));
        assert_eq!(mgr.reservations_for_batch("b1").len(), 2);

        let ev = state_event_for_deleted_batch("b1", &options());
        assert!(ev.content().unwrap().is_empty());
        assert_eq!(read_batch(&transmit(&ev), &mut mgr).unwrap(), None);
        assert!(!mgr.has_batch("b1"));
        assert_eq!(mgr.batches.len(), 1);
    }

    #[test]
    fn test_live_data() {
        let mut ldm = LiveDataMap::default();
        let ev_empty = state_event_for_live_data("leg1", &ldm, &options()).unwrap();
        assert_eq!(ev_empty.event_type(), EventType::LiveData);

        let route = Route::new(Line::new("IR 2519", Mode::Train), "Brig");
        let arrival = Departure {
            scheduled_arrival_time: Some(at(17, 3)),
            expected_arrival_time: Some(at(17, 5)),
            route: route.clone(),
            stop_point: Location::named("Visp"),
            ..Departure::default()
        };
        ldm.store_live_data(
            "leg1",
            LiveData {
                arrival: Some(arrival),
                ..LiveData::default()
            },
        );
        let ev_data = transmit(&state_event_for_live_data("leg1", &ldm, &options()).unwrap());
        assert!(!ev_data.content().unwrap().is_empty());

        read_live_data(&ev_data, &mut ldm).unwrap();
        assert_eq!(ldm.live_data("leg1").arrival.unwrap().arrival_delay(), Some(2));

        read_live_data(&transmit(&ev_empty), &mut ldm).unwrap();
        assert!(ldm.live_data("leg1").is_empty());

        read_live_data(&ev_data, &mut ldm).unwrap();
        assert_eq!(ldm.live_data("leg1").arrival.unwrap().arrival_delay(), Some(2));
    }

    #[test]
    fn test_live_data_keeps_local_details() {
        let mut ldm = LiveDataMap::default();
        let stop = Location::named("Visp").with_coordinate(46.294, 7.881);
        ldm.store_live_data(
            "leg1",
            LiveData {
                departure: Some(Departure {
                    scheduled_departure_time: Some(at(16, 30)),
                    scheduled_platform: "3".into(),
                    stop_point: stop,
                    ..Departure::default()
                }),
                ..LiveData::default()
            },
        );

        let mut remote = LiveDataMap::default();
        remote.store_live_data(
            "leg1",
            LiveData {
                departure: Some(Departure {
                    scheduled_departure_time: Some(at(16, 30)),
                    expected_departure_time: Some(at(16, 34)),
                    stop_point: Location::named("Visp"),
                    ..Departure::default()
                }),
                ..LiveData::default()
            },
        );
        let ev = transmit(&state_event_for_live_data("leg1", &remote, &options()).unwrap());
        read_live_data(&ev, &mut ldm).unwrap();

        let dep = ldm.live_data("leg1").departure.unwrap();
        assert_eq!(dep.departure_delay(), Some(4));
        assert_eq!(dep.scheduled_platform, "3");
        assert!(dep.stop_point.has_coordinate());
    }

    #[test]
    fn test_transfer_identifier() {
        assert_eq!(transfer_identifier("abc-1", Alignment::Before), "Before-abc-1");
        assert_eq!(
            parse_transfer_identifier("After-abc-1"),
            Some(("abc-1".to_string(), Alignment::After))
        );
        assert_eq!(parse_transfer_identifier("Sideways-1"), None);
        assert_eq!(parse_transfer_identifier("Before-"), None);
        assert_eq!(parse_transfer_identifier("Before"), None);
    }

    #[test]
    fn test_transfer() {
        let mut mgr = Transfers::default();
        mgr.store_transfer("b1", Alignment::Before, json!({"from": "home", "to": "Berlin Hbf"}));

        let ev = state_event_for_transfer("b1", Alignment::Before, &mgr, &options()).unwrap();
        assert_eq!(ev.state_key(), "Before-b1");

        let mut other = Transfers::default();
        read_transfer(&transmit(&ev), &mut other).unwrap();
        assert_eq!(other.transfer("b1", Alignment::Before).unwrap()["to"], "Berlin Hbf");

        let removed = state_event_for_transfer("b1", Alignment::After, &mgr, &options()).unwrap();
        other.store_transfer("b1", Alignment::After, json!({"to": "home"}));
        read_transfer(&transmit(&removed), &mut other).unwrap();
        assert!(other.transfer("b1", Alignment::After).is_none());
        assert!(other.transfer("b1", Alignment::Before).is_some());
    }

    #[test]
    fn test_transfer_invalid_key() {
        let ev = StateEvent::new(EventType::Transfer, "b1");
        let err = read_transfer(&ev, &mut Transfers::default()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateKey(_)));
    }

    #[test]
    fn test_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ticket.pdf");
        fs::write(&path, b"%PDF-1.4 ticket").unwrap();

        let mut docs = Attachments::default();
        docs.files.insert("doc1".into(), path);
        docs.infos.insert("doc1".into(), json!({"name": "ticket.pdf", "type": "application/pdf"}));

        let ev = state_event_for_document("doc1", &docs, &options()).unwrap();
        assert!(!ev.needs_upload());
        assert_eq!(ev.extra_data("metaData").unwrap()["name"], "ticket.pdf");

        let mut other = Attachments::default();
        read_document(&transmit(&ev), &mut other).unwrap();
        let (info, data) = &other.received["doc1"];
        assert_eq!(info["type"], "application/pdf");
        assert_eq!(data, b"%PDF-1.4 ticket");

        assert!(matches!(
            state_event_for_document("nope", &docs, &options()),
            Err(SyncError::ContentUnavailable)
        ));
    }

    #[test]
    fn test_pk_pass() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pass.pkpass");
        let data: Vec<u8> = (0..=255).collect();
        fs::write(&path, &data).unwrap();

        let mut passes = Attachments::default();
        passes.files.insert("pass.kde.org/1234".into(), path);
        let ev = state_event_for_pk_pass("pass.kde.org/1234", &passes, &options()).unwrap();
        assert_eq!(ev.to_raw().content["contentType"], "base64");

        let mut other = Attachments::default();
        read_pk_pass(&transmit(&ev), &mut other).unwrap();
        assert_eq!(other.received["pass.kde.org/1234"].1, data);
    }
}
