//! Itinerary sync CLI entry point.

use clap::Parser;
use itin::cli::commands;
use itin::cli::commands::decode::DecodeArgs;
use itin::cli::commands::replay::ReplayArgs;
use itin::cli::{Cli, Commands};
use itin::config::SyncConfig;
use itin::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let json = cli.json;
    match &cli.command {
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),

        Commands::Match { command } => commands::matching::execute(command, json),
        Commands::Merge { kind, lhs, rhs } => commands::merge::execute(*kind, lhs, rhs),

        Commands::Encode {
            event_type,
            key,
            file,
        } => {
            let config = SyncConfig::load(cli.config.as_deref())?;
            commands::encode::execute(&config, event_type, key, file, json)
        }
        Commands::Decode {
            event,
            room,
            file,
            output,
        } => {
            let config = SyncConfig::load(cli.config.as_deref())?;
            let args = DecodeArgs {
                event,
                room,
                file: file.as_deref(),
                output: output.as_deref(),
            };
            commands::decode::execute(&config, &args, json)
        }
        Commands::Replay {
            events,
            files,
            room,
            known_ids,
        } => {
            let config = SyncConfig::load(cli.config.as_deref())?;
            let args = ReplayArgs {
                events,
                files: files.as_deref(),
                room,
                known_ids,
            };
            commands::replay::execute(&config, &args, json)
        }
        Commands::Outbound { command } => {
            let config = SyncConfig::load(cli.config.as_deref())?;
            commands::outbound::execute(&config, command, json)
        }
    }
}
