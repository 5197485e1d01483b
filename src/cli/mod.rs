//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sync::ChangeType;

pub mod commands;

/// Itinerary sync - journey reconciliation and state event tooling
#[derive(Parser, Debug)]
#[command(name = "itin", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.itinerary/config.json)
    #[arg(long, global = true, env = "ITIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Check whether two names denote the same entity
    Match {
        #[command(subcommand)]
        command: MatchCommands,
    },

    /// Merge two values describing the same entity
    Merge {
        /// Kind of value in both files
        #[arg(long, value_enum)]
        kind: MergeKind,

        /// JSON file with the preferred value
        lhs: PathBuf,

        /// JSON file with the value filling the gaps
        rhs: PathBuf,
    },

    /// Build an outbound state event from a file
    Encode {
        /// Event type tag (e.g. org.kde.itinerary.document)
        #[arg(long = "type")]
        event_type: String,

        /// State key of the affected entity
        #[arg(long)]
        key: String,

        /// File holding the content
        file: PathBuf,
    },

    /// Decode a state event and extract its content
    Decode {
        /// JSON file with the raw state event
        event: PathBuf,

        /// Room the event was received in
        #[arg(long, default_value = "")]
        room: String,

        /// Downloaded file for externally stored content
        #[arg(long)]
        file: Option<PathBuf>,

        /// Write the content here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Feed raw inbound events through the inbound queue
    Replay {
        /// JSONL file with one raw state event per line
        events: PathBuf,

        /// Directory holding downloaded content, named after the URL's last segment
        #[arg(long)]
        files: Option<PathBuf>,

        /// Room the events were received in
        #[arg(long, default_value = "")]
        room: String,

        /// Event ids authored locally, ignored when echoed back
        #[arg(long = "known-id")]
        known_ids: Vec<String>,
    },

    /// Inspect and drive the persistent outbound change queue
    Outbound {
        #[command(subcommand)]
        command: OutboundCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Value kinds accepted by `merge`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeKind {
    Location,
    Departure,
    Section,
    Journey,
}

// ============================================================================
// Match Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum MatchCommands {
    /// Compare two location names
    Location {
        lhs: String,
        rhs: String,
    },

    /// Compare a route against a booked line
    Route {
        /// Line name of the route (e.g. "RE 13")
        line: String,

        /// Route-specific name, such as a train number
        #[arg(long)]
        route_name: Option<String>,

        /// Booked line name (e.g. "RE")
        #[arg(long, default_value = "")]
        line_name: String,

        /// Booked line number (e.g. "13")
        #[arg(long, default_value = "")]
        line_number: String,
    },
}

// ============================================================================
// Outbound Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum OutboundCommands {
    /// List pending changes
    List,

    /// Record a local change
    Push {
        /// Change type (e.g. BatchChange, TransferChange)
        #[arg(value_parser = parse_change_type)]
        change_type: ChangeType,

        /// Id of the changed entity
        id: String,

        /// Trip group the change belongs to
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Mark the head change as sent
    Done,

    /// Replay the head change again
    Retry,
}

fn parse_change_type(s: &str) -> std::result::Result<ChangeType, String> {
    s.parse()
}
