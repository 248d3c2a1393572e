//! The keeper: a validated directory set plus backup and restore settings.

use crate::archive::{ArchiveBuilder, BackupResult};
use crate::error::Result;
use crate::paths::DirectorySet;
use crate::restore::{RestorePlan, RestoreResult, Restorer};
use camino::{Utf8Path, Utf8PathBuf};
use keeper_core::config::DEFAULT_COMPRESSION_LEVEL;
use tracing::info;

/// Backs up and restores one fixed set of directories.
///
/// The directory set is validated once at construction; every later
/// operation works on exactly that set.
#[derive(Debug, Clone)]
pub struct Keeper {
    directories: DirectorySet,
    compression_level: u32,
    restore_root: Utf8PathBuf,
}

impl Keeper {
    /// Validates `directories` and creates a keeper over them.
    pub fn new<I, P>(directories: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        Ok(Self::from_directory_set(DirectorySet::new(directories)?))
    }

    pub fn from_directory_set(directories: DirectorySet) -> Self {
        Self {
            directories,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            restore_root: Utf8PathBuf::from("/"),
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Restore relative to `root` instead of `/`.
    pub fn with_restore_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.restore_root = root.into();
        self
    }

    pub fn directories(&self) -> &DirectorySet {
        &self.directories
    }

    pub fn restore_root(&self) -> &Utf8Path {
        &self.restore_root
    }

    /// Writes an archive of the directory set to `destination/filename`.
    pub fn backup(&self, destination: &Utf8Path, filename: &str) -> Result<BackupResult> {
        let archive_path = destination.join(filename);
        info!(
            "Backing up {} directories to {}",
            self.directories.len(),
            archive_path
        );

        ArchiveBuilder::new()
            .with_compression_level(self.compression_level)
            .create(&self.directories, &archive_path)
    }

    /// Scans `archive` and reports what [`Keeper::restore`] would do.
    pub fn plan_restore(&self, archive: &Utf8Path) -> Result<RestorePlan> {
        self.restorer().plan(archive)
    }

    /// Restores the members of `archive` that lie inside the directory set.
    pub fn restore(&self, archive: &Utf8Path) -> Result<RestoreResult> {
        self.restorer().restore(archive)
    }

    fn restorer(&self) -> Restorer {
        Restorer::new()
            .with_root(self.restore_root.clone())
            .with_scope(self.directories.clone())
    }
}
