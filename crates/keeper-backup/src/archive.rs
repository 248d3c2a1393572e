//! Archive creation for backups.
//!
//! Each directory of a [`DirectorySet`] is walked and written into one
//! gzip-compressed tar stream. Member names are the absolute paths without
//! their leading separator, so `/var/lib/rundeck/data` is stored as
//! `var/lib/rundeck/data`.
//!
//! The archive is written to a temporary file next to the destination and
//! renamed into place only after the stream has been fully flushed.
//!
//! A set directory that is a symlink to a directory is archived as a
//! directory under the link's own name, with the target's contents below it.

use crate::error::{Error, Result};
use crate::paths::{member_name, DirectorySet};
use crate::walk::{EntryKind, Exclusions, TreeWalk};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::write::GzEncoder;
use flate2::Compression;
use keeper_core::config::DEFAULT_COMPRESSION_LEVEL;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::time::Instant;
use tar::Builder as TarBuilder;
use tracing::{debug, info, warn};

/// Result of a backup operation.
#[derive(Debug, Clone)]
pub struct BackupResult {
    /// Path to the created archive
    pub archive_path: Utf8PathBuf,

    /// Size of the archive in bytes
    pub size_bytes: u64,

    /// Number of directory members written
    pub directories: usize,

    /// Number of file (and symlink) members written
    pub files: usize,

    /// Directories of the set that did not exist and were skipped
    pub skipped: Vec<Utf8PathBuf>,

    /// Duration of the operation in seconds
    pub duration_seconds: f64,
}

impl BackupResult {
    /// Total number of archive members.
    pub fn entry_count(&self) -> usize {
        self.directories + self.files
    }
}

#[derive(Default)]
struct EntryCounts {
    directories: usize,
    files: usize,
    skipped: Vec<Utf8PathBuf>,
}

/// Archive builder for creating backups.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    compression_level: u32,
}

impl ArchiveBuilder {
    /// Creates a new archive builder with the default compression level.
    pub fn new() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Sets the compression level.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.clamp(1, 9);
        self
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Creates a backup archive of `directories` at `output_path`.
    ///
    /// Directories that do not exist are skipped. Any other read or write
    /// failure aborts the backup and leaves no archive at `output_path`.
    /// Neither the in-progress archive nor an older file at `output_path`
    /// is captured, however the destination path is spelled.
    pub fn create(&self, directories: &DirectorySet, output_path: &Utf8Path) -> Result<BackupResult> {
        let start_time = Instant::now();
        let output_path = absolute(output_path)?;

        let parent = output_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("/"));
        fs::create_dir_all(&parent)
            .map_err(|e| Error::backup(format!("creating destination directory {}", parent), e))?;

        let temp = tempfile::Builder::new()
            .prefix(".keeper-")
            .suffix(".tar.gz.partial")
            .tempfile_in(&parent)
            .map_err(|e| Error::backup(format!("creating temporary archive in {}", parent), e))?;

        let mut excluded = Exclusions::new();
        if let Ok(temp_path) = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()) {
            excluded.add(&temp_path);
        }
        if output_path.exists() {
            excluded.add(&output_path);
        }

        info!("Creating backup archive: {}", output_path);

        let counts = self.write_archive(directories, temp.as_file(), &excluded)?;

        temp.persist(&output_path)
            .map_err(|e| Error::backup(format!("moving archive into place at {}", output_path), e.error))?;

        let size_bytes = fs::metadata(&output_path)
            .map_err(|e| Error::backup(format!("reading size of {}", output_path), e))?
            .len();
        let duration_seconds = start_time.elapsed().as_secs_f64();

        info!(
            "Backup complete: {} directories, {} files, {} bytes",
            counts.directories, counts.files, size_bytes
        );

        Ok(BackupResult {
            archive_path: output_path,
            size_bytes,
            directories: counts.directories,
            files: counts.files,
            skipped: counts.skipped,
            duration_seconds,
        })
    }

    /// Streams every walked entry through tar and gzip into `file`.
    fn write_archive(
        &self,
        directories: &DirectorySet,
        file: &File,
        excluded: &Exclusions,
    ) -> Result<EntryCounts> {
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::new(self.compression_level));
        let mut tar = TarBuilder::new(encoder);
        tar.follow_symlinks(false);

        let mut counts = EntryCounts::default();

        for dir in directories {
            match fs::metadata(dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(Error::backup(
                        format!("reading {}", dir),
                        io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
                    ))
                }
                // a dangling symlink counts as missing
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    info!("Skipping missing directory: {}", dir);
                    counts.skipped.push(dir.clone());
                    continue;
                }
                Err(e) => return Err(Error::backup(format!("reading {}", dir), e)),
            }

            debug!("Archiving directory: {}", dir);
            for entry in TreeWalk::new(dir).excluding(excluded.clone()) {
                let entry = entry.map_err(|e| Error::backup(format!("reading {}", dir), e))?;

                let name = member_name(&entry.path);
                let appended = match entry.kind {
                    EntryKind::Directory => {
                        counts.directories += 1;
                        // follows a symlinked set root, stores a directory header
                        tar.append_dir(name, &entry.path)
                    }
                    EntryKind::File | EntryKind::Symlink => {
                        counts.files += 1;
                        tar.append_path_with_name(&entry.path, name)
                    }
                    EntryKind::Other => {
                        warn!("Skipping special file: {}", entry.path);
                        continue;
                    }
                };
                appended.map_err(|e| Error::backup(format!("archiving {}", entry.path), e))?;
            }
        }

        let finish = |e: io::Error| Error::backup("finishing archive", e);
        let encoder = tar.into_inner().map_err(finish)?;
        let mut writer = encoder.finish().map_err(finish)?;
        writer.flush().map_err(finish)?;
        let file = writer.into_inner().map_err(|e| finish(e.into_error()))?;
        file.sync_all().map_err(finish)?;

        Ok(counts)
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a relative destination against the working directory.
fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::backup("resolving working directory", e))?;
    let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| {
        Error::backup(
            "resolving working directory",
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("path is not valid UTF-8: {}", p.display()),
            ),
        )
    })?;
    Ok(cwd.join(path))
}
