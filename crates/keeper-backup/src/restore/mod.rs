//! Restore system
//!
//! Restores run in two stages. The first stage reads the entire archive and
//! collects every target that already exists; if there is any, the restore
//! fails before a single byte is written. The second stage extracts the
//! archive, refusing to replace files even if one appeared in between.
//!
//! Directory members are applied last, deepest first, so a read-only
//! directory mode or an archived mtime is not disturbed by writing the
//! members below it.

use crate::error::{Error, Result};
use crate::paths::DirectorySet;
use crate::walk::EntryKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod plan;

pub use plan::{PlannedEntry, RestorePlan};

use plan::{build_plan, entry_kind, entry_member, in_scope, open_archive};

#[derive(Debug, Clone)]
pub struct RestoreResult {
    /// Directory members extracted
    pub directories: usize,
    /// File and symlink members extracted
    pub files: usize,
    /// Members outside the restore scope
    pub ignored: usize,
    /// Wall-clock time spent
    pub duration_seconds: f64,
}

/// Extracts keeper archives relative to a root directory.
#[derive(Debug, Clone)]
pub struct Restorer {
    root: Utf8PathBuf,
    scope: Option<DirectorySet>,
}

impl Restorer {
    /// Restorer writing relative to the filesystem root.
    pub fn new() -> Self {
        Self {
            root: Utf8PathBuf::from("/"),
            scope: None,
        }
    }

    /// Restore under `root` instead of `/`.
    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Only restore members at or below the directories of `scope`.
    pub fn with_scope(mut self, scope: DirectorySet) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Runs the conflict scan only and reports what a restore would do.
    pub fn plan(&self, archive_path: &Utf8Path) -> Result<RestorePlan> {
        self.ensure_root()?;
        build_plan(archive_path, &self.root, self.scope.as_ref())
    }

    /// Restores `archive_path`, failing without side effects on conflicts.
    pub fn restore(&self, archive_path: &Utf8Path) -> Result<RestoreResult> {
        let start = Instant::now();

        info!("Starting restore: archive={}, root={}", archive_path, self.root);

        info!("Stage 1/2: Checking restore targets");
        let plan = self.plan(archive_path)?;
        if plan.has_conflicts() {
            warn!(
                "Restore aborted: {} target(s) already exist",
                plan.conflicts.len()
            );
            return Err(Error::restore_conflict(plan.conflicts));
        }

        info!("Stage 2/2: Extracting {} entries", plan.entries.len());
        let (directories, files) = self.extract(archive_path)?;

        let duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Restore complete: directories={}, files={}, ignored={}, duration={:.2}s",
            directories, files, plan.ignored, duration_seconds
        );

        Ok(RestoreResult {
            directories,
            files,
            ignored: plan.ignored,
            duration_seconds,
        })
    }

    fn extract(&self, archive_path: &Utf8Path) -> Result<(usize, usize)> {
        let mut archive = open_archive(archive_path)?;
        archive.set_overwrite(false);
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);

        let read_err = |e: io::Error| Error::restore(format!("reading archive {}", archive_path), e);

        let mut deferred = Vec::new();
        let mut files = 0;

        for entry in archive.entries().map_err(read_err)? {
            let mut entry = entry.map_err(read_err)?;
            let member = entry_member(&entry).map_err(read_err)?;
            if !in_scope(self.scope.as_ref(), &member) {
                continue;
            }

            if entry_kind(entry.header().entry_type()) == EntryKind::Directory {
                deferred.push((member, entry));
                continue;
            }

            debug!("Extracting {}", member);
            // parent directories are created here with default permissions
            let unpacked = entry.unpack_in(&self.root).map_err(|e| unpack_error(&member, e))?;
            if !unpacked {
                return Err(unpack_error(&member, escapes_root()));
            }
            files += 1;
        }

        deferred.sort_by(|(a, _), (b, _)| b.cmp(a));
        let directories = deferred.len();
        for (member, mut entry) in deferred {
            debug!("Extracting directory {}", member);
            let unpacked = entry.unpack_in(&self.root).map_err(|e| unpack_error(&member, e))?;
            if !unpacked {
                return Err(unpack_error(&member, escapes_root()));
            }
        }

        Ok((directories, files))
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            return Ok(());
        }
        Err(Error::restore(
            format!("restore root {} is not a directory", self.root),
            io::Error::new(io::ErrorKind::NotFound, "missing restore root"),
        ))
    }
}

fn unpack_error(member: &Utf8Path, e: io::Error) -> Error {
    Error::restore(format!("extracting {}", member), e)
}

fn escapes_root() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "member escapes the restore root")
}

impl Default for Restorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("valid UTF-8")
    }

    /// Builds a source tree and an archive of it, returning (source, archive).
    fn archived_tree(work: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
        let source = work.join("src");
        fs::create_dir_all(source.join("hotel/lobby/desk/drawer")).unwrap();
        fs::create_dir_all(source.join("hotel/lobby/locker")).unwrap();
        fs::write(source.join("hotel/lobby/desk/drawer/f4"), "lorem ipsum\n").unwrap();
        fs::write(source.join("hotel/lobby/locker/file5.txt"), "lorem ipsum\n").unwrap();

        let dirs = DirectorySet::new([
            source.join("hotel/lobby/desk/drawer"),
            source.join("hotel/lobby/locker"),
        ])
        .unwrap();
        let archive = work.join("archive.tar.gz");
        ArchiveBuilder::new().create(&dirs, &archive).unwrap();
        (source, archive)
    }

    #[test]
    fn test_restore_into_empty_root() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let result = Restorer::new().with_root(&root).restore(&archive).unwrap();

        let restored = root.join(source.strip_prefix("/").unwrap());
        assert_eq!(
            fs::read_to_string(restored.join("hotel/lobby/locker/file5.txt")).unwrap(),
            "lorem ipsum\n"
        );
        assert!(restored.join("hotel/lobby/desk/drawer/f4").is_file());
        assert!(!restored.join("hotel/lobby/desk/file2.txt").exists());
        assert_eq!(result.directories, 2);
        assert_eq!(result.files, 2);
        assert_eq!(result.ignored, 0);
    }

    #[test]
    fn test_existing_directories_are_not_conflicts() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let restored = root.join(source.strip_prefix("/").unwrap());
        fs::create_dir_all(restored.join("hotel/lobby/locker")).unwrap();

        Restorer::new().with_root(&root).restore(&archive).unwrap();
        assert!(restored.join("hotel/lobby/locker/file5.txt").is_file());
    }

    #[test]
    fn test_conflict_leaves_everything_untouched() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let restored = root.join(source.strip_prefix("/").unwrap());
        let existing = restored.join("hotel/lobby/locker/file5.txt");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, "new version\n").unwrap();

        let err = Restorer::new().with_root(&root).restore(&archive).unwrap_err();

        assert_eq!(err.conflicts(), Some(&[existing.clone()][..]));
        assert_eq!(fs::read_to_string(&existing).unwrap(), "new version\n");
        // Nothing from the archive was written, not even non-conflicting members
        assert!(!restored.join("hotel/lobby/desk").exists());
    }

    #[test]
    fn test_plan_reports_all_conflicts() {
        let work = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));

        // Restoring over the live source conflicts on both files
        let plan = Restorer::new().plan(&archive).unwrap();
        assert_eq!(plan.entries.len(), 4);
        assert_eq!(
            plan.conflicts,
            vec![
                source.join("hotel/lobby/desk/drawer/f4"),
                source.join("hotel/lobby/locker/file5.txt"),
            ]
        );
        assert!(plan.ensure_no_conflicts().is_err());
    }

    #[test]
    fn test_scope_limits_restore() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let scope = DirectorySet::new([source.join("hotel/lobby/locker")]).unwrap();
        let result = Restorer::new()
            .with_root(&root)
            .with_scope(scope)
            .restore(&archive)
            .unwrap();

        let restored = root.join(source.strip_prefix("/").unwrap());
        assert!(restored.join("hotel/lobby/locker/file5.txt").is_file());
        assert!(!restored.join("hotel/lobby/desk").exists());
        assert_eq!(result.files, 1);
        assert_eq!(result.ignored, 2);
    }

    #[test]
    fn test_conflict_outside_scope_is_ignored() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let restored = root.join(source.strip_prefix("/").unwrap());
        let outside = restored.join("hotel/lobby/desk/drawer/f4");
        fs::create_dir_all(outside.parent().unwrap()).unwrap();
        fs::write(&outside, "keep me\n").unwrap();

        let scope = DirectorySet::new([source.join("hotel/lobby/locker")]).unwrap();
        Restorer::new()
            .with_root(&root)
            .with_scope(scope)
            .restore(&archive)
            .unwrap();

        assert_eq!(fs::read_to_string(&outside).unwrap(), "keep me\n");
        assert!(restored.join("hotel/lobby/locker/file5.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_is_restored_with_contents() {
        use std::os::unix::fs::PermissionsExt;

        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let work = utf8(&work);
        let root = utf8(&root);

        let ssh = work.join("home/.ssh");
        fs::create_dir_all(&ssh).unwrap();
        fs::write(ssh.join("id_rsa"), "secret key\n").unwrap();
        fs::set_permissions(&ssh, fs::Permissions::from_mode(0o500)).unwrap();

        let archive = work.join("archive.tar.gz");
        let built = ArchiveBuilder::new().create(&DirectorySet::new([ssh.clone()]).unwrap(), &archive);
        let result = built.and_then(|_| Restorer::new().with_root(&root).restore(&archive));

        let restored = root.join(ssh.strip_prefix("/").unwrap());
        let mode = fs::metadata(&restored).map(|m| m.permissions().mode() & 0o777);
        let content = fs::read_to_string(restored.join("id_rsa"));
        fs::set_permissions(&ssh, fs::Permissions::from_mode(0o700)).unwrap();
        if restored.exists() {
            fs::set_permissions(&restored, fs::Permissions::from_mode(0o700)).unwrap();
        }

        let result = result.unwrap();
        assert_eq!(result.directories, 1);
        assert_eq!(result.files, 1);
        assert_eq!(content.unwrap(), "secret key\n");
        assert_eq!(mode.unwrap(), 0o500);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_target_aborts_before_writing() {
        use std::os::unix::fs::PermissionsExt;

        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let (source, archive) = archived_tree(&utf8(&work));
        let root = utf8(&root);

        let restored = root.join(source.strip_prefix("/").unwrap());
        let locker = restored.join("hotel/lobby/locker");
        fs::create_dir_all(&locker).unwrap();
        fs::set_permissions(&locker, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores permission bits; nothing to assert in that case
        if fs::read_dir(&locker).is_ok() {
            fs::set_permissions(&locker, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = Restorer::new().with_root(&root).restore(&archive);
        fs::set_permissions(&locker, fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Restore { .. }), "got: {:?}", err);
        assert!(!restored.join("hotel/lobby/desk").exists());
    }

    #[test]
    fn test_missing_archive_is_restore_error() {
        let err = Restorer::new()
            .restore(Utf8Path::new("/nonexistent/keeper-archive-12345.tar.gz"))
            .unwrap_err();
        assert!(matches!(err, Error::Restore { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_corrupt_archive_is_restore_error() {
        let work = TempDir::new().unwrap();
        let bad = utf8(&work).join("bad.tar.gz");
        fs::write(&bad, b"this is not a valid gzip archive").unwrap();

        let err = Restorer::new().restore(&bad).unwrap_err();
        assert!(matches!(err, Error::Restore { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_missing_root_is_restore_error() {
        let work = TempDir::new().unwrap();
        let (_source, archive) = archived_tree(&utf8(&work));

        let err = Restorer::new()
            .with_root("/nonexistent/keeper-root-12345")
            .restore(&archive)
            .unwrap_err();
        assert!(matches!(err, Error::Restore { .. }), "got: {:?}", err);
    }
}
