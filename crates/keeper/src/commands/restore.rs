//! Restore command
//!
//! Connects the CLI restore UI to the keeper-backup restore library.

use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use clap::Args;
use keeper_backup::{run_guarded, Error as EngineError, Keeper, RestorePlan, SystemdGuard};

use super::{effective_policy, load_config, select_directories};
use crate::cli::GlobalArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Archive to restore
    #[arg(short, long)]
    pub file: Utf8PathBuf,

    /// Root directory the archive is restored under
    #[arg(long, default_value = "/")]
    pub root: Utf8PathBuf,

    /// Dry-run mode (show what would be restored)
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: RestoreArgs, global: &GlobalArgs) -> Result<()> {
    output::header("Rundeck Restore");

    if !args.file.is_file() {
        return Err(anyhow!("Backup file not found: {}", args.file));
    }

    let config = load_config(global)?;
    let selection = select_directories(&config, global.dirs.as_deref())?;
    let policy = effective_policy(global, &config);

    // Display restore configuration
    output::kv("Archive", args.file.as_str());
    output::kv("Root", args.root.as_str());
    output::kv("Service policy", policy.as_str());
    output::kv("Directories", &selection.directories.len().to_string());
    for dir in &selection.directories {
        output::item(dir.as_str());
    }
    if args.dry_run {
        output::warning("DRY RUN MODE - No files will be restored");
    }
    output::blank();

    let keeper = Keeper::from_directory_set(selection.directories).with_restore_root(&args.root);

    if args.dry_run {
        let spinner = output::spinner("Checking restore targets...");
        let plan = keeper.plan_restore(&args.file);
        spinner.finish_and_clear();
        let plan = plan.context("Failed to read backup archive")?;

        print_plan(&plan);
        if plan.has_conflicts() {
            return Err(anyhow!(
                "Restore would fail: {} existing path(s) in the way",
                plan.conflicts.len()
            ));
        }
        output::success("Dry run complete");
        output::info("Remove --dry-run to perform the restore");
        return Ok(());
    }

    let guard = SystemdGuard::new(&config.service.unit);

    let spinner = output::spinner("Restoring backup...");
    let result = run_guarded(&guard, policy, || keeper.restore(&args.file));
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(err) => {
            if let Some(conflicts) = err.conflicts() {
                report_conflicts(conflicts);
            }
            return Err(restore_failure(err));
        }
    };

    output::success("Restore complete");
    output::kv("Directories", &result.directories.to_string());
    output::kv("Files", &result.files.to_string());
    if result.ignored > 0 {
        output::kv("Outside directory set", &result.ignored.to_string());
    }
    output::kv("Duration", &format!("{:.2}s", result.duration_seconds));

    Ok(())
}

fn print_plan(plan: &RestorePlan) {
    output::info("Restore Analysis:");
    output::kv("Directories", &plan.directory_count().to_string());
    output::kv("Files", &plan.file_count().to_string());
    if plan.ignored > 0 {
        output::kv("Outside directory set", &plan.ignored.to_string());
    }
    if plan.has_conflicts() {
        report_conflicts(&plan.conflicts);
    } else {
        output::success("No conflicts: nothing would be overwritten");
    }
}

fn report_conflicts(conflicts: &[Utf8PathBuf]) {
    output::error(&format!(
        "{} path(s) already exist and would be overwritten:",
        conflicts.len()
    ));
    for path in conflicts {
        eprintln!("    {}", path);
    }
}

fn restore_failure(err: EngineError) -> anyhow::Error {
    let message = match &err {
        EngineError::RestoreConflict { .. } => "Restore aborted, nothing was written",
        EngineError::ServiceRunning { .. } => "Restore refused",
        _ => "Restore failed",
    };
    anyhow::Error::new(err).context(message)
}
