//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use keeper_core::config::ServicePolicy;

// Re-export command types for convenience
pub use crate::commands::backup::BackupArgs;
pub use crate::commands::restore::RestoreArgs;

/// Rundeck Keeper - backup and restore of Rundeck server state
#[derive(Parser, Debug)]
#[command(name = "rundeck-keeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output other than errors and warnings
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the keeper config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Comma-separated directories to use instead of the configured set
    #[arg(long, global = true, value_name = "DIR,...")]
    pub dirs: Option<String>,

    /// What to do when the service is running
    #[arg(long, global = true, value_enum)]
    pub service_policy: Option<ServicePolicyArg>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up the directory set into a tar.gz archive
    Backup(BackupArgs),

    /// Restore a keeper archive without overwriting existing files
    Restore(RestoreArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServicePolicyArg {
    /// Fail if the service is running
    Refuse,

    /// Stop the service for the operation and start it afterwards
    StopStart,

    /// Proceed while the service runs
    Ignore,
}

impl ServicePolicyArg {
    /// Convert the CLI policy to the config policy type.
    pub fn to_policy(self) -> ServicePolicy {
        match self {
            ServicePolicyArg::Refuse => ServicePolicy::Refuse,
            ServicePolicyArg::StopStart => ServicePolicy::StopStart,
            ServicePolicyArg::Ignore => ServicePolicy::Ignore,
        }
    }
}
