//! Keeper Core - configuration and shared error types
//!
//! This crate holds everything the backup engine and the CLI agree on that is
//! not part of the archive engine itself:
//!
//! - **Configuration**: [`config::KeeperConfig`] with the canonical Rundeck
//!   directory set, service identity and backup defaults
//! - **Layered loading**: [`config::ConfigLoader`] resolves built-in defaults,
//!   the YAML config file and `KEEPER_*` environment overrides
//! - **Errors**: [`Error`] for configuration failures

pub mod config;
pub mod error;

pub use config::{
    parse_directory_list, BackupConfig, ConfigLoader, KeeperConfig, ServiceConfig,
    ServicePolicy, DEFAULT_CONFIG_PATH,
};
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
