//! Keeper configuration types
//!
//! Every field has a default so a partial YAML file only overrides what it
//! names. The defaults describe a stock Rundeck installation.

mod loader;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_PATH};

use crate::error::{Error, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directories holding Rundeck state, in backup order.
pub const DEFAULT_DIRECTORIES: &[&str] = &[
    "/var/lib/rundeck/data",        // database
    "/var/lib/rundeck/logs",        // execution logs
    "/var/lib/rundeck/.ssh",        // ssh keys
    "/var/lib/rundeck/var/storage", // key storage files and metadata
    "/var/rundeck/projects",        // project definitions
];

/// Default compression level (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Complete keeper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeeperConfig {
    /// The guarded service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Canonical directory set protected by a full backup
    #[serde(default = "default_directories")]
    pub directories: Vec<Utf8PathBuf>,

    /// Backup output defaults
    #[serde(default)]
    pub backup: BackupConfig,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            directories: default_directories(),
            backup: BackupConfig::default(),
        }
    }
}

/// Identity of the guarded service and how to treat it while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Service name, embedded in generated archive names
    #[serde(default = "default_service_name")]
    pub name: String,

    /// systemd unit controlling the service
    #[serde(default = "default_service_unit")]
    pub unit: String,

    /// What to do when the service is running during backup or restore
    #[serde(default)]
    pub policy: ServicePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            unit: default_service_unit(),
            policy: ServicePolicy::default(),
        }
    }
}

/// Backup output defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackupConfig {
    /// Directory receiving new archives
    #[serde(default = "default_destination")]
    pub destination: Utf8PathBuf,

    /// Gzip compression level (1-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            compression_level: default_compression_level(),
        }
    }
}

/// Behaviour when the guarded service is running at the start of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServicePolicy {
    /// Abort the operation
    #[default]
    Refuse,
    /// Stop the service for the duration of the operation, then start it again
    StopStart,
    /// Proceed while the service keeps running
    Ignore,
}

impl ServicePolicy {
    /// Returns the config/CLI spelling of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServicePolicy::Refuse => "refuse",
            ServicePolicy::StopStart => "stop-start",
            ServicePolicy::Ignore => "ignore",
        }
    }
}

impl fmt::Display for ServicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServicePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "refuse" => Ok(ServicePolicy::Refuse),
            "stop-start" | "stopstart" => Ok(ServicePolicy::StopStart),
            "ignore" => Ok(ServicePolicy::Ignore),
            other => Err(Error::invalid_config(format!(
                "Unknown service policy: {}. Valid policies: refuse, stop-start, ignore",
                other
            ))),
        }
    }
}

impl KeeperConfig {
    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.backup.compression_level) {
            return Err(Error::invalid_config(format!(
                "compression-level must be 1-9, got {}",
                self.backup.compression_level
            )));
        }
        if self.service.name.trim().is_empty() {
            return Err(Error::invalid_config("service name must not be empty"));
        }
        Ok(())
    }
}

/// Splits a comma-separated directory list, dropping blanks.
///
/// Used for `--dirs` and `KEEPER_DIRECTORIES`. No validation happens here;
/// the directory set is validated when a keeper is built from it.
pub fn parse_directory_list(value: &str) -> Vec<Utf8PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Utf8PathBuf::from)
        .collect()
}

fn default_directories() -> Vec<Utf8PathBuf> {
    DEFAULT_DIRECTORIES.iter().map(Utf8PathBuf::from).collect()
}

fn default_service_name() -> String {
    "rundeck".to_string()
}

fn default_service_unit() -> String {
    "rundeckd".to_string()
}

fn default_destination() -> Utf8PathBuf {
    Utf8PathBuf::from("/var/backups/rundeck")
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}
