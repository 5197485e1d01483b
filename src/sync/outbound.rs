//! Outbound change queue.
//!
//! Local changes are recorded here and replayed one at a time to the sink,
//! which builds and sends the corresponding state event. The queue is
//! persisted so pending changes survive a restart.

use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::sync::content::{parse_transfer_identifier, Alignment};
use crate::sync::file::{atomic_write, remove_if_exists};
use crate::sync::types::{SyncError, SyncResult};

/// Kind of a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    BatchChange,
    BatchRemove,
    LiveDataChange,
    TransferChange,
    DocumentAdd,
    PkPassChange,
    TripGroupAdded,
    TripGroupChanged,
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string())).map_err(|_| format!("Unknown change type: {s}"))
    }
}

/// One pending local change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub id: String,
    /// Trip group the change belongs to, if any.
    #[serde(default)]
    pub context: String,
}

/// Receiver of replayed changes.
pub trait OutboundSink {
    fn batch_changed(&mut self, batch_id: &str, trip_group_id: &str);
    fn batch_removed(&mut self, batch_id: &str, trip_group_id: &str);
    fn live_data_changed(&mut self, batch_id: &str);
    fn transfer_changed(&mut self, batch_id: &str, alignment: Alignment);
    fn document_added(&mut self, doc_id: &str, trip_group_id: &str);
    fn pk_pass_changed(&mut self, pass_id: &str, trip_group_id: &str);
    fn trip_group_added(&mut self, trip_group_id: &str);
    fn trip_group_changed(&mut self, trip_group_id: &str);

    /// The number of pending changes changed.
    fn queue_changed(&mut self, _len: usize) {}
}

/// Persistent FIFO of local changes awaiting upload.
///
/// The head is replayed to the sink; the sink reports completion with
/// [`OutboundQueue::replay_next`] or asks for another attempt with
/// [`OutboundQueue::retry`].
pub struct OutboundQueue<S> {
    pending: VecDeque<StateChange>,
    suspended: bool,
    path: Option<PathBuf>,
    sink: S,
}

impl<S: OutboundSink> OutboundQueue<S> {
    /// A queue that is not persisted.
    pub fn in_memory(sink: S) -> Self {
        Self {
            pending: VecDeque::new(),
            suspended: false,
            path: None,
            sink,
        }
    }

    /// Open the queue persisted at `path`, loading pending changes.
    ///
    /// Nothing is replayed until the next [`append`](Self::append) or
    /// [`retry`](Self::retry).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>, sink: S) -> SyncResult<Self> {
        let path = path.into();
        let pending = load(&path)?;
        debug!(path = %path.display(), pending = pending.len(), "Loaded outbound queue");
        Ok(Self {
            pending,
            suspended: false,
            path: Some(path),
            sink,
        })
    }

    /// Record a local change.
    ///
    /// Ignored while suspended, and when the same change is already waiting
    /// behind the head.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateKey`] for a transfer change whose id is
    /// not a transfer identifier, or an error if the queue cannot be persisted.
    pub fn append(&mut self, change_type: ChangeType, id: &str, context: &str) -> SyncResult<()> {
        if self.suspended {
            return Ok(());
        }
        if change_type == ChangeType::TransferChange && parse_transfer_identifier(id).is_none() {
            return Err(SyncError::InvalidStateKey(id.to_string()));
        }
        let change = StateChange {
            change_type,
            id: id.to_string(),
            context: context.to_string(),
        };
        if self.pending.iter().skip(1).any(|c| *c == change) {
            return Ok(());
        }

        self.pending.push_back(change);
        debug!(?change_type, id, pending = self.pending.len(), "Queuing local state change");
        self.store()?;
        self.sink.queue_changed(self.pending.len());
        if self.pending.len() == 1 {
            self.replay_head()?;
        }
        Ok(())
    }

    /// The head change has been applied remotely; continue with the next one.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted.
    pub fn replay_next(&mut self) -> SyncResult<()> {
        let Some(done) = self.pending.pop_front() else {
            return Ok(());
        };
        debug!(change_type = ?done.change_type, id = %done.id, pending = self.pending.len(), "Completed state change");
        self.store()?;
        self.sink.queue_changed(self.pending.len());
        self.replay_head()
    }

    /// Replay the head change again.
    ///
    /// # Errors
    ///
    /// Returns an error if dropping an unreplayable head cannot be persisted.
    pub fn retry(&mut self) -> SyncResult<()> {
        self.replay_head()
    }

    pub fn suspend(&mut self) {
        debug_assert!(!self.suspended);
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        debug_assert!(self.suspended);
        self.suspended = false;
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &StateChange> {
        self.pending.iter()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Hand the head to the sink. Heads that cannot be replayed are dropped.
    fn replay_head(&mut self) -> SyncResult<()> {
        while let Some(c) = self.pending.front() {
            debug!(change_type = ?c.change_type, id = %c.id, "Replaying local state change");
            match c.change_type {
                ChangeType::BatchChange => self.sink.batch_changed(&c.id, &c.context),
                ChangeType::BatchRemove => self.sink.batch_removed(&c.id, &c.context),
                ChangeType::LiveDataChange => self.sink.live_data_changed(&c.id),
                ChangeType::TransferChange => {
                    let Some((batch_id, alignment)) = parse_transfer_identifier(&c.id) else {
                        warn!(id = %c.id, "Dropping invalid transfer identifier from outbound queue");
                        self.pending.pop_front();
                        self.store()?;
                        self.sink.queue_changed(self.pending.len());
                        continue;
                    };
                    self.sink.transfer_changed(&batch_id, alignment);
                }
                ChangeType::DocumentAdd => self.sink.document_added(&c.id, &c.context),
                ChangeType::PkPassChange => self.sink.pk_pass_changed(&c.id, &c.context),
                ChangeType::TripGroupAdded => self.sink.trip_group_added(&c.id),
                ChangeType::TripGroupChanged => self.sink.trip_group_changed(&c.id),
            }
            break;
        }
        Ok(())
    }

    fn store(&self) -> SyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.pending.is_empty() {
            return remove_if_exists(path);
        }
        let json = serde_json::to_string_pretty(&self.pending)?;
        atomic_write(path, &json)
    }
}

fn load(path: &Path) -> SyncResult<VecDeque<StateChange>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => return Err(e.into()),
    };
    let entries: Vec<Value> = serde_json::from_str(&data)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(change) => Some(change),
            Err(e) => {
                debug!(error = %e, "Skipping unknown outbound queue entry");
                None
            }
        })
        .collect())
}

/// Suspends change recording for its lifetime.
///
/// Hold this while applying remote changes locally, so they are not sent
/// back. Nested locks leave the suspension to the outermost one.
pub struct LocalChangeLock<'a, S: OutboundSink> {
    queue: &'a mut OutboundQueue<S>,
    owns_suspension: bool,
}

impl<'a, S: OutboundSink> LocalChangeLock<'a, S> {
    pub fn new(queue: &'a mut OutboundQueue<S>) -> Self {
        let owns_suspension = !queue.is_suspended();
        if owns_suspension {
            queue.suspend();
        }
        Self {
            queue,
            owns_suspension,
        }
    }
}

impl<S: OutboundSink> Deref for LocalChangeLock<'_, S> {
    type Target = OutboundQueue<S>;

    fn deref(&self) -> &Self::Target {
        self.queue
    }
}

impl<S: OutboundSink> DerefMut for LocalChangeLock<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.queue
    }
}

impl<S: OutboundSink> Drop for LocalChangeLock<'_, S> {
    fn drop(&mut self) {
        if self.owns_suspension {
            self.queue.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        replayed: Vec<String>,
    }

    impl OutboundSink for Recorder {
        fn batch_changed(&mut self, batch_id: &str, _trip_group_id: &str) {
            self.replayed.push(format!("batch:{batch_id}"));
        }
        fn batch_removed(&mut self, batch_id: &str, _trip_group_id: &str) {
            self.replayed.push(format!("removed:{batch_id}"));
        }
        fn live_data_changed(&mut self, batch_id: &str) {
            self.replayed.push(format!("livedata:{batch_id}"));
        }
        fn transfer_changed(&mut self, batch_id: &str, alignment: Alignment) {
            self.replayed.push(format!("transfer:{batch_id}:{}", alignment.as_str()));
        }
        fn document_added(&mut self, doc_id: &str, trip_group_id: &str) {
            self.replayed.push(format!("document:{doc_id}:{trip_group_id}"));
        }
        fn pk_pass_changed(&mut self, pass_id: &str, _trip_group_id: &str) {
            self.replayed.push(format!("pkpass:{pass_id}"));
        }
        fn trip_group_added(&mut self, trip_group_id: &str) {
            self.replayed.push(format!("tg-added:{trip_group_id}"));
        }
        fn trip_group_changed(&mut self, trip_group_id: &str) {
            self.replayed.push(format!("tg-changed:{trip_group_id}"));
        }
    }

    fn queue_path(dir: &TempDir) -> PathBuf {
        dir.path().join("sync").join("outbound-queue.json")
    }

    #[test]
    fn test_replay_and_persistence() {
        let dir = TempDir::new().unwrap();
        let mut q = OutboundQueue::open(queue_path(&dir), Recorder::default()).unwrap();
        assert!(q.is_empty());
        assert!(!q.is_suspended());

        q.append(ChangeType::BatchChange, "1234", "").unwrap();
        assert!(!q.is_empty());
        assert_eq!(q.sink().replayed, ["batch:1234"]);

        {
            let mut q2 = OutboundQueue::open(queue_path(&dir), Recorder::default()).unwrap();
            assert_eq!(q2.len(), 1);
            assert!(q2.sink().replayed.is_empty());
            q2.retry().unwrap();
            assert_eq!(q2.sink().replayed, ["batch:1234"]);
            q2.replay_next().unwrap();
            assert!(q2.is_empty());
            assert!(!queue_path(&dir).exists());
        }

        q.retry().unwrap();
        assert_eq!(q.sink().replayed.len(), 2);
        q.replay_next().unwrap();
        assert!(q.is_empty());
        assert_eq!(q.sink().replayed.len(), 2);
    }

    #[test]
    fn test_local_change_lock() {
        let mut q = OutboundQueue::in_memory(Recorder::default());
        {
            let mut locked = LocalChangeLock::new(&mut q);
            locked.append(ChangeType::BatchChange, "1234", "").unwrap();
            assert!(locked.is_suspended());
            {
                let nested = LocalChangeLock::new(&mut *locked);
                assert!(nested.is_suspended());
            }
            assert!(locked.is_suspended());
        }
        assert!(q.is_empty());
        assert!(!q.is_suspended());
        assert!(q.sink().replayed.is_empty());
    }

    #[test]
    fn test_duplicates_behind_head() {
        let mut q = OutboundQueue::in_memory(Recorder::default());
        for _ in 0..4 {
            q.append(ChangeType::BatchChange, "4321", "").unwrap();
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.sink().replayed.len(), 1);

        q.replay_next().unwrap();
        assert_eq!(q.sink().replayed.len(), 2);
        q.replay_next().unwrap();
        assert!(q.is_empty());
        assert_eq!(q.sink().replayed, ["batch:4321", "batch:4321"]);

        // same id with a different context is a different change
        q.append(ChangeType::DocumentAdd, "doc", "tg1").unwrap();
        q.append(ChangeType::DocumentAdd, "doc", "tg1").unwrap();
        q.append(ChangeType::DocumentAdd, "doc", "tg2").unwrap();
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_replay_dispatch() {
        let mut q = OutboundQueue::in_memory(Recorder::default());
        q.append(ChangeType::TripGroupAdded, "tg1", "").unwrap();
        q.append(ChangeType::TransferChange, "After-b1", "").unwrap();
        q.append(ChangeType::DocumentAdd, "doc1", "tg1").unwrap();
        q.append(ChangeType::LiveDataChange, "b1", "").unwrap();
        while !q.is_empty() {
            q.replay_next().unwrap();
        }
        assert_eq!(
            q.sink().replayed,
            ["tg-added:tg1", "transfer:b1:After", "document:doc1:tg1", "livedata:b1"]
        );
    }

    #[test]
    fn test_invalid_transfer_id_rejected() {
        let mut q = OutboundQueue::in_memory(Recorder::default());
        let result = q.append(ChangeType::TransferChange, "garbage", "");
        assert!(matches!(result, Err(SyncError::InvalidStateKey(id)) if id == "garbage"));
        assert!(q.is_empty());

        q.append(ChangeType::BatchChange, "b1", "").unwrap();
        assert_eq!(q.sink().replayed, ["batch:b1"]);
    }

    #[test]
    fn test_stored_invalid_transfer_does_not_block() {
        let dir = TempDir::new().unwrap();
        let path = queue_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"[
                {"type": "TransferChange", "id": "garbage"},
                {"type": "BatchChange", "id": "b1", "context": "tg1"}
            ]"#,
        )
        .unwrap();

        let mut q = OutboundQueue::open(&path, Recorder::default()).unwrap();
        assert_eq!(q.len(), 2);
        q.retry().unwrap();
        assert_eq!(q.sink().replayed, ["batch:b1"]);
        assert_eq!(q.len(), 1);

        let reloaded = OutboundQueue::open(&path, Recorder::default()).unwrap();
        let ids: Vec<_> = reloaded.pending().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["b1"]);

        q.replay_next().unwrap();
        assert!(q.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_skips_unknown_entries() {
        let dir = TempDir::new().unwrap();
        let path = queue_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"[
                {"type": "PkPassChange", "id": "pass1", "context": "tg1"},
                {"type": "SomethingNew", "id": "x"},
                {"type": "BatchRemove", "id": "b7"}
            ]"#,
        )
        .unwrap();

        let q = OutboundQueue::open(&path, Recorder::default()).unwrap();
        let ids: Vec<_> = q.pending().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["pass1", "b7"]);
        assert_eq!(q.pending().nth(1).unwrap().context, "");
    }

    #[test]
    fn test_change_type_from_str() {
        assert_eq!("BatchRemove".parse::<ChangeType>(), Ok(ChangeType::BatchRemove));
        assert!("batch".parse::<ChangeType>().is_err());
    }
}
