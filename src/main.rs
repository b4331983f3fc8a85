//! `tasktracker` binary
//!
//! Parses the command line, runs one store command against the project root
//! and maps a failure onto an error envelope plus a process exit code.
//! Diagnostics from the store are printed only when `RUST_LOG` asks for them.

use clap::Parser;
use tasktracker::cli::Cli;
use tasktracker::output::emit_error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn log_filter() -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("off"))
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(log_filter())
        .init();

    let cli = Cli::parse();
    let command = cli.command.name();
    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(command, &err, json);
        std::process::exit(err.exit_code());
    }
}
