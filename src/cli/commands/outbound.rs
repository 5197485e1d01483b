//! Outbound queue command implementations.
//!
//! The queue lives at `<data_dir>/sync/outbound-queue.json`. Replayed changes
//! are printed, since no transport is attached to the command line.

use colored::Colorize;
use serde::Serialize;

use crate::cli::OutboundCommands;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::{Alignment, OutboundQueue, OutboundSink, StateChange, transfer_identifier};

#[derive(Debug, Default)]
struct PrintSink {
    replayed: Vec<String>,
}

impl PrintSink {
    fn replay(&mut self, what: &str, id: &str, context: &str) {
        if context.is_empty() {
            self.replayed.push(format!("{what} {id}"));
        } else {
            self.replayed.push(format!("{what} {id} (trip group {context})"));
        }
    }
}

impl OutboundSink for PrintSink {
    fn batch_changed(&mut self, batch_id: &str, trip_group_id: &str) {
        self.replay("send batch", batch_id, trip_group_id);
    }

    fn batch_removed(&mut self, batch_id: &str, trip_group_id: &str) {
        self.replay("remove batch", batch_id, trip_group_id);
    }

    fn live_data_changed(&mut self, batch_id: &str) {
        self.replay("send live data", batch_id, "");
    }

    fn transfer_changed(&mut self, batch_id: &str, alignment: Alignment) {
        self.replay("send transfer", &transfer_identifier(batch_id, alignment), "");
    }

    fn document_added(&mut self, doc_id: &str, trip_group_id: &str) {
        self.replay("send document", doc_id, trip_group_id);
    }

    fn pk_pass_changed(&mut self, pass_id: &str, trip_group_id: &str) {
        self.replay("send pass", pass_id, trip_group_id);
    }

    fn trip_group_added(&mut self, trip_group_id: &str) {
        self.replay("share trip group", trip_group_id, "");
    }

    fn trip_group_changed(&mut self, trip_group_id: &str) {
        self.replay("update trip group", trip_group_id, "");
    }
}

#[derive(Serialize)]
struct QueueOutput<'a> {
    path: String,
    pending: Vec<&'a StateChange>,
    replayed: &'a [String],
}

/// Execute outbound queue commands.
pub fn execute(config: &SyncConfig, command: &OutboundCommands, json: bool) -> Result<()> {
    let path = config.outbound_queue_path()?;
    let mut queue = OutboundQueue::open(&path, PrintSink::default())?;

    match command {
        OutboundCommands::List => {}
        OutboundCommands::Push {
            change_type,
            id,
            context,
        } => queue.append(*change_type, id, context)?,
        OutboundCommands::Done => queue.replay_next()?,
        OutboundCommands::Retry => queue.retry()?,
    }

    if json {
        let output = QueueOutput {
            path: path.display().to_string(),
            pending: queue.pending().collect(),
            replayed: &queue.sink().replayed,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    for line in &queue.sink().replayed {
        println!("{} {line}", "→".cyan());
    }
    if queue.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    println!("{} pending changes:", queue.len());
    for (idx, change) in queue.pending().enumerate() {
        let marker = if idx == 0 { "*".green() } else { " ".normal() };
        let context = if change.context.is_empty() {
            String::new()
        } else {
            format!("[{}]", change.context)
        };
        println!(
            "{marker} {:<16} {}  {}",
            format!("{:?}", change.change_type),
            change.id.bold(),
            context.dimmed()
        );
    }
    Ok(())
}
