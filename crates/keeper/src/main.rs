//! Rundeck Keeper CLI - backup and restore of Rundeck server state
//!
//! This is the main entry point for the `rundeck-keeper` command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);
    output::set_quiet(cli.quiet);

    // Run command
    match cli.command {
        Commands::Backup(args) => commands::backup::run(args, &cli.global),
        Commands::Restore(args) => commands::restore::run(args, &cli.global),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Default to info so operation boundaries are visible
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
