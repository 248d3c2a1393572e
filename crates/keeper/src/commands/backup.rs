//! Backup command
//!
//! Connects the CLI backup UI to the keeper-backup archive engine.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Args;
use keeper_backup::{run_guarded, Keeper, NamingPolicy, SystemdGuard};

use super::{effective_policy, load_config, select_directories};
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Directory receiving the archive (defaults to the configured destination)
    #[arg(short, long)]
    pub dest: Option<Utf8PathBuf>,

    /// Archive file name (defaults to a timestamped name)
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Gzip compression level (1-9)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=9))]
    pub compression: Option<u32>,
}

pub fn run(args: BackupArgs, global: &GlobalArgs) -> Result<()> {
    output::header("Rundeck Backup");

    let config = load_config(global)?;
    let selection = select_directories(&config, global.dirs.as_deref())?;
    let policy = effective_policy(global, &config);

    let destination = args
        .dest
        .clone()
        .unwrap_or_else(|| config.backup.destination.clone());
    let compression = args.compression.unwrap_or(config.backup.compression_level);
    let filename = NamingPolicy::new(&config.service.name)
        .archive_name(selection.partial, args.filename.as_deref());

    // Display backup configuration
    output::kv("Service", &format!("{} ({})", config.service.name, config.service.unit));
    output::kv("Service policy", policy.as_str());
    output::kv("Destination", destination.join(&filename).as_str());
    output::kv("Compression", &compression.to_string());
    output::kv("Directories", &selection.directories.len().to_string());
    for dir in &selection.directories {
        output::item(dir.as_str());
    }
    if selection.partial {
        output::warning("Directory override in effect - this is a partial backup");
    }
    output::blank();

    let keeper = Keeper::from_directory_set(selection.directories)
        .with_compression_level(compression);
    let guard = SystemdGuard::new(&config.service.unit);

    let spinner = output::spinner("Creating backup archive...");
    let result = run_guarded(&guard, policy, || keeper.backup(&destination, &filename));
    spinner.finish_and_clear();
    let result = result.context("Backup failed")?;

    for dir in &result.skipped {
        output::warning(&format!("Skipped missing directory: {}", dir));
    }

    output::success("Backup created");
    output::kv("Archive", result.archive_path.as_str());
    output::kv("Size", &output::format_bytes(result.size_bytes));
    output::kv(
        "Entries",
        &format!(
            "{} ({} directories, {} files)",
            result.entry_count(),
            result.directories,
            result.files
        ),
    );
    output::kv("Duration", &format!("{:.2}s", result.duration_seconds));

    Ok(())
}
