//! Layered configuration loader
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults (stock Rundeck layout)
//! 2. Config file (`--config`, else /etc/rundeck-keeper/config.yaml when present)
//! 3. Environment variables (KEEPER_* prefix)
//! 4. CLI flags (handled by caller)

use super::{parse_directory_list, KeeperConfig};
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

/// System-wide config file consulted when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rundeck-keeper/config.yaml";

/// Configuration loader
pub struct ConfigLoader {
    path: Utf8PathBuf,
    /// An explicitly requested file must exist
    required: bool,
}

impl ConfigLoader {
    /// Create a loader reading the system-wide config file if it exists
    pub fn new() -> Self {
        Self {
            path: Utf8PathBuf::from(DEFAULT_CONFIG_PATH),
            required: false,
        }
    }

    /// Create a loader for an explicit config file
    pub fn with_file(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// Create a loader for an optional config file, `None` meaning the default location
    pub fn from_option(path: Option<&Utf8Path>) -> Self {
        match path {
            Some(path) => Self::with_file(path),
            None => Self::new(),
        }
    }

    /// The file this loader reads
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Load configuration with layered precedence
    pub fn load(&self) -> Result<KeeperConfig> {
        let config = if self.path.exists() {
            debug!("Loading config file: {}", self.path);
            self.load_yaml_file(&self.path)?
        } else if self.required {
            return Err(Error::config_not_found(self.path.as_str()));
        } else {
            debug!("No config file at {}, using defaults", self.path);
            KeeperConfig::default()
        };

        let config = Self::apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(&self, path: &Utf8Path) -> Result<KeeperConfig> {
        let content = fs::read_to_string(path)?;
        // An empty file means "all defaults"
        if content.trim().is_empty() {
            return Ok(KeeperConfig::default());
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: KeeperConfig) -> Result<KeeperConfig> {
        if let Ok(val) = env::var("KEEPER_DIRECTORIES") {
            config.directories = parse_directory_list(&val);
        }

        if let Ok(val) = env::var("KEEPER_SERVICE_UNIT") {
            config.service.unit = val;
        }

        if let Ok(val) = env::var("KEEPER_SERVICE_POLICY") {
            config.service.policy = val.parse()?;
        }

        if let Ok(val) = env::var("KEEPER_BACKUP_DEST") {
            config.backup.destination = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("KEEPER_COMPRESSION_LEVEL") {
            config.backup.compression_level = val.parse().map_err(|_| {
                Error::invalid_config("KEEPER_COMPRESSION_LEVEL must be a valid number")
            })?;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServicePolicy;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "KEEPER_DIRECTORIES",
        "KEEPER_SERVICE_UNIT",
        "KEEPER_SERVICE_POLICY",
        "KEEPER_BACKUP_DEST",
        "KEEPER_COMPRESSION_LEVEL",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    fn write_config(content: &str) -> (Utf8PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("valid UTF-8");
        let path = dir.join("config.yaml");
        fs::write(&path, content).unwrap();
        (path, temp_dir)
    }

    #[test]
    #[serial]
    fn test_missing_optional_file_uses_defaults() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader {
            path: Utf8PathBuf::from_path_buf(temp_dir.path().join("absent.yaml")).unwrap(),
            required: false,
        };
        let config = loader.load().unwrap();
        assert_eq!(config, KeeperConfig::default());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        clear_env();
        let loader = ConfigLoader::with_file("/nonexistent/keeper-config-12345.yaml");
        let err = loader.load().unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        clear_env();
        let (path, _temp) = write_config(
            r#"
directories:
  - /srv/rundeck/data
  - /srv/rundeck/projects
backup:
  destination: /mnt/backups
"#,
        );
        let config = ConfigLoader::with_file(&path).load().unwrap();
        assert_eq!(
            config.directories,
            vec![
                Utf8PathBuf::from("/srv/rundeck/data"),
                Utf8PathBuf::from("/srv/rundeck/projects"),
            ]
        );
        assert_eq!(config.backup.destination, Utf8PathBuf::from("/mnt/backups"));
        assert_eq!(config.backup.compression_level, 6);
    }

    #[test]
    #[serial]
    fn test_empty_file_uses_defaults() {
        clear_env();
        let (path, _temp) = write_config("");
        let config = ConfigLoader::with_file(&path).load().unwrap();
        assert_eq!(config, KeeperConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let (path, _temp) = write_config("backup:\n  compression-level: 3\n");
        env::set_var("KEEPER_COMPRESSION_LEVEL", "8");
        env::set_var("KEEPER_DIRECTORIES", "/x/y,/z");
        env::set_var("KEEPER_SERVICE_POLICY", "ignore");
        env::set_var("KEEPER_SERVICE_UNIT", "rundeck.service");

        let config = ConfigLoader::with_file(&path).load().unwrap();
        clear_env();

        assert_eq!(config.backup.compression_level, 8);
        assert_eq!(
            config.directories,
            vec![Utf8PathBuf::from("/x/y"), Utf8PathBuf::from("/z")]
        );
        assert_eq!(config.service.policy, ServicePolicy::Ignore);
        assert_eq!(config.service.unit, "rundeck.service");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        clear_env();
        let (path, _temp) = write_config("");
        env::set_var("KEEPER_COMPRESSION_LEVEL", "fast");
        let result = ConfigLoader::with_file(&path).load();
        clear_env();

        let err = result.unwrap_err().to_string();
        assert!(err.contains("KEEPER_COMPRESSION_LEVEL"), "got: {}", err);
    }

    #[test]
    #[serial]
    fn test_malformed_yaml() {
        clear_env();
        let (path, _temp) = write_config("directories: [unterminated\n");
        let err = ConfigLoader::with_file(&path).load().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
