//! CLI command implementations

pub mod backup;
pub mod restore;

use anyhow::{bail, Context, Result};
use keeper_backup::{is_override, DirectorySet};
use keeper_core::config::{parse_directory_list, ConfigLoader, KeeperConfig, ServicePolicy};
use tracing::debug;

use crate::cli::GlobalArgs;

/// Loads the configuration named by `--config`, or the default one.
pub fn load_config(global: &GlobalArgs) -> Result<KeeperConfig> {
    let loader = ConfigLoader::from_option(global.config.as_deref());
    debug!("Loading configuration from {}", loader.path());
    loader
        .load()
        .with_context(|| format!("Failed to load configuration from {}", loader.path()))
}

/// The service policy in effect: `--service-policy`, else the configured one.
pub fn effective_policy(global: &GlobalArgs, config: &KeeperConfig) -> ServicePolicy {
    global
        .service_policy
        .map(|p| p.to_policy())
        .unwrap_or(config.service.policy)
}

/// Directories an operation works on.
#[derive(Debug)]
pub struct Selection {
    pub directories: DirectorySet,
    /// True when `--dirs` names a different set than the configured one
    pub partial: bool,
}

/// Resolves the directory set from `--dirs` or the configuration.
pub fn select_directories(config: &KeeperConfig, dirs: Option<&str>) -> Result<Selection> {
    let canonical =
        DirectorySet::new(&config.directories).context("Invalid directory list in configuration");

    let Some(list) = dirs else {
        return Ok(Selection {
            directories: canonical?,
            partial: false,
        });
    };

    let requested = parse_directory_list(list);
    if requested.is_empty() {
        bail!("--dirs must name at least one directory");
    }
    let directories = DirectorySet::new(&requested).context("Invalid --dirs directory list")?;

    // An override can still be used when the configured set is broken
    let partial = match canonical {
        Ok(canonical) => is_override(&canonical, &directories),
        Err(_) => true,
    };

    Ok(Selection {
        directories,
        partial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ServicePolicyArg;
    use camino::Utf8PathBuf;

    fn config(dirs: &[&str]) -> KeeperConfig {
        KeeperConfig {
            directories: dirs.iter().map(Utf8PathBuf::from).collect(),
            ..KeeperConfig::default()
        }
    }

    #[test]
    fn test_configured_set_is_not_partial() {
        let selection = select_directories(&config(&["/a", "/b"]), None).unwrap();
        assert_eq!(selection.directories.len(), 2);
        assert!(!selection.partial);
    }

    #[test]
    fn test_subset_override_is_partial() {
        let selection = select_directories(&config(&["/a", "/b"]), Some("/b")).unwrap();
        assert_eq!(selection.directories.as_slice(), &[Utf8PathBuf::from("/b")]);
        assert!(selection.partial);
    }

    #[test]
    fn test_override_matching_configuration_is_not_partial() {
        let selection = select_directories(&config(&["/a", "/b"]), Some(" /b/ , /a ")).unwrap();
        assert!(!selection.partial);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(select_directories(&config(&["/a"]), Some("relative")).is_err());
        assert!(select_directories(&config(&["/a"]), Some("/x,/x/y")).is_err());
        assert!(select_directories(&config(&["/a"]), Some(" , ")).is_err());
    }

    #[test]
    fn test_override_works_with_broken_configuration() {
        let broken = config(&["/a", "/a/b"]);
        assert!(select_directories(&broken, None).is_err());

        let selection = select_directories(&broken, Some("/c")).unwrap();
        assert!(selection.partial);
    }

    #[test]
    fn test_effective_policy() {
        let cfg = KeeperConfig::default();
        let mut global = GlobalArgs::default();
        assert_eq!(effective_policy(&global, &cfg), ServicePolicy::Refuse);

        global.service_policy = Some(ServicePolicyArg::Ignore);
        assert_eq!(effective_policy(&global, &cfg), ServicePolicy::Ignore);
    }
}
