//! State event synchronization.
//!
//! Trip data is shared between devices through state events of a
//! synchronization channel:
//!
//! - **Codec**: [`StateEvent`] wraps one event payload and decides between
//!   inline and file-backed content
//! - **Content**: conversion between application entities and events
//! - **Inbound**: [`InboundQueue`] orders remote events and coordinates
//!   downloads before they are applied
//! - **Outbound**: [`OutboundQueue`] records local changes until they have
//!   been sent
//!
//! # Wire format
//!
//! ```json
//! {"version":1,"source":"laptop","contentType":"none","content":"...","extra":{}}
//! ```

mod content;
mod file;
mod inbound;
mod outbound;
mod state_event;
mod types;

pub use content::{
    parse_transfer_identifier, read_batch, read_document, read_live_data, read_pk_pass,
    read_transfer, state_event_for_batch, state_event_for_deleted_batch, state_event_for_document,
    state_event_for_live_data, state_event_for_pk_pass, state_event_for_transfer,
    transfer_identifier, Alignment, AttachmentStore, LiveData, LiveDataStore, ReservationStore,
    TransferStore,
};
pub use file::{atomic_write, read_jsonl, remove_if_exists};
pub use inbound::{InboundQueue, InboundSink};
pub use outbound::{ChangeType, LocalChangeLock, OutboundQueue, OutboundSink, StateChange};
pub use state_event::{EncodeOptions, StateEvent};
pub use types::{
    ContentType, EventType, RawStateEvent, SyncError, SyncResult, CONTENT_SIZE_LIMIT,
    FORMAT_VERSION,
};
