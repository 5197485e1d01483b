//! Inbound state event queue.
//!
//! Remote state changes are applied strictly in order. Events with external
//! content block the queue until their file has been downloaded, so later
//! changes never overtake an earlier one they might depend on.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::sync::state_event::{EncodeOptions, StateEvent};
use crate::sync::types::{EventType, RawStateEvent, SyncResult};

/// Receiver of the queue's requests and dispatched events.
///
/// Exactly one of the typed event methods is called per dispatched event.
pub trait InboundSink {
    /// The head event needs its external content downloaded. Answer with
    /// [`InboundQueue::set_file_name`] or [`InboundQueue::download_failed`].
    fn download_file(&mut self, event: &StateEvent);

    fn reservation_event(&mut self, event: StateEvent);
    fn live_data_event(&mut self, event: StateEvent);
    fn transfer_event(&mut self, event: StateEvent);
    fn document_event(&mut self, event: StateEvent);
    fn pk_pass_event(&mut self, event: StateEvent);

    /// The number of pending events changed.
    fn queue_changed(&mut self, _len: usize) {}
}

/// FIFO of remote state events awaiting dispatch.
///
/// Only the head may be waiting for a download. Pending events with the same
/// type and state key are collapsed into the newest one, except for a head
/// that is currently downloading.
pub struct InboundQueue<S> {
    pending: VecDeque<StateEvent>,
    known_ids: HashSet<String>,
    options: EncodeOptions,
    sink: S,
}

impl<S: InboundSink> InboundQueue<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, EncodeOptions::default())
    }

    pub fn with_options(sink: S, options: EncodeOptions) -> Self {
        Self {
            pending: VecDeque::new(),
            known_ids: HashSet::new(),
            options,
            sink,
        }
    }

    /// Queue a remote event received in `room_id`.
    ///
    /// Events we authored ourselves, unknown types and unsupported versions
    /// are ignored.
    pub fn append(&mut self, raw: &RawStateEvent, room_id: &str) {
        if raw.event_id.as_ref().is_some_and(|id| self.known_ids.contains(id)) {
            debug!(event_id = ?raw.event_id, "Ignoring own state event");
            return;
        }
        let Some(event) = StateEvent::from_raw_with_options(raw, room_id, &self.options) else {
            return;
        };
        debug!(
            event_type = %event.event_type(),
            state_key = event.state_key(),
            room_id,
            "Got remote state event"
        );

        let superseded = self.pending.iter().enumerate().position(|(idx, pending)| {
            pending.event_type() == event.event_type()
                && pending.state_key() == event.state_key()
                && !(idx == 0 && pending.needs_download())
        });
        if let Some(idx) = superseded {
            debug!(state_key = event.state_key(), "Replacing already pending state event");
            self.pending[idx] = event;
            return;
        }

        self.pending.push_back(event);
        self.sink.queue_changed(self.pending.len());
        if self.pending.len() == 1 {
            self.dispatch_next();
        }
    }

    /// The download requested for the head event finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be attached to the head event.
    pub fn set_file_name(&mut self, path: impl Into<PathBuf>) -> SyncResult<()> {
        let Some(head) = self.pending.front_mut() else {
            return Ok(());
        };
        let path = path.into();
        debug!(
            event_type = %head.event_type(),
            state_key = head.state_key(),
            url = head.url().unwrap_or_default(),
            path = %path.display(),
            "Download complete"
        );
        head.set_file_name(path)?;
        if !head.needs_download() {
            self.dispatch_next();
        }
        Ok(())
    }

    /// The download requested for the head event failed; the event is dropped.
    pub fn download_failed(&mut self) {
        let Some(head) = self.pending.pop_front() else {
            return;
        };
        warn!(
            event_type = %head.event_type(),
            state_key = head.state_key(),
            "Discarding remote state change due to failed download"
        );
        self.sink.queue_changed(self.pending.len());
        self.dispatch_next();
    }

    /// Register an event id we produced, so its echo is ignored.
    pub fn add_known_event_id(&mut self, event_id: impl Into<String>) {
        self.known_ids.insert(event_id.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn dispatch_next(&mut self) {
        while let Some(head) = self.pending.front() {
            if head.needs_download() {
                debug!(
                    event_type = %head.event_type(),
                    state_key = head.state_key(),
                    url = head.url().unwrap_or_default(),
                    "Downloading"
                );
                self.sink.download_file(head);
                return;
            }

            let Some(event) = self.pending.pop_front() else {
                break;
            };
            debug!(
                event_type = %event.event_type(),
                state_key = event.state_key(),
                "Dispatching remote state event"
            );
            match event.event_type() {
                EventType::Reservation => self.sink.reservation_event(event),
                EventType::LiveData => self.sink.live_data_event(event),
                EventType::Transfer => self.sink.transfer_event(event),
                EventType::Document => self.sink.document_event(event),
                EventType::PkPass => self.sink.pk_pass_event(event),
            }
            self.sink.queue_changed(self.pending.len());
        }
    }
}
