//! Restore planning (phase 1)
//!
//! Reads the whole archive without touching the filesystem and works out
//! where every member would land and which of those targets already exist.

use crate::error::{Error, Result};
use crate::paths::{original_path, target_path, DirectorySet};
use crate::walk::EntryKind;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use tar::{Archive, Entry, EntryType};
use tracing::debug;

/// One archive member and where it would be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    /// Member name as stored in the archive
    pub member: Utf8PathBuf,
    /// Absolute target path under the restore root
    pub target: Utf8PathBuf,
    pub kind: EntryKind,
}

/// Outcome of scanning an archive against the filesystem.
#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    /// Members that would be written, in archive order
    pub entries: Vec<PlannedEntry>,
    /// Targets that already exist and block the restore
    pub conflicts: Vec<Utf8PathBuf>,
    /// Members outside the restore scope
    pub ignored: usize,
}

impl RestorePlan {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn directory_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind.is_dir()).count()
    }

    pub fn file_count(&self) -> usize {
        self.entries.len() - self.directory_count()
    }

    /// Fails with a conflict error if any target exists.
    pub fn ensure_no_conflicts(&self) -> Result<()> {
        if self.has_conflicts() {
            return Err(Error::restore_conflict(self.conflicts.clone()));
        }
        Ok(())
    }
}

/// Opens a gzip tar archive for sequential reading.
pub(crate) fn open_archive(archive_path: &Utf8Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(archive_path)
        .map_err(|e| Error::restore(format!("opening archive {}", archive_path), e))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Member name of an archive entry, rejecting non UTF-8 names.
pub(crate) fn entry_member<R: io::Read>(entry: &Entry<'_, R>) -> io::Result<Utf8PathBuf> {
    let path = entry.path()?.into_owned();
    Utf8PathBuf::from_path_buf(path).map_err(|p| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("member name is not valid UTF-8: {}", p.display()),
        )
    })
}

pub(crate) fn entry_kind(entry_type: EntryType) -> EntryKind {
    match entry_type {
        EntryType::Directory => EntryKind::Directory,
        EntryType::Symlink => EntryKind::Symlink,
        EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse | EntryType::Link => {
            EntryKind::File
        }
        _ => EntryKind::Other,
    }
}

/// Returns true if the member lies inside `scope` (or there is no scope).
pub(crate) fn in_scope(scope: Option<&DirectorySet>, member: &Utf8Path) -> bool {
    scope.map_or(true, |dirs| dirs.covers(&original_path(member)))
}

/// Scans `archive_path` and builds the plan for restoring it under `root`.
pub(crate) fn build_plan(
    archive_path: &Utf8Path,
    root: &Utf8Path,
    scope: Option<&DirectorySet>,
) -> Result<RestorePlan> {
    let mut archive = open_archive(archive_path)?;
    let read_err = |e: io::Error| Error::restore(format!("reading archive {}", archive_path), e);

    let mut plan = RestorePlan::default();

    for entry in archive.entries().map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let member = entry_member(&entry).map_err(read_err)?;
        let kind = entry_kind(entry.header().entry_type());

        let target = target_path(root, &member).ok_or_else(|| {
            read_err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("member {} escapes the restore root", member),
            ))
        })?;

        if !in_scope(scope, &member) {
            plan.ignored += 1;
            continue;
        }

        let conflict = is_conflict(&target, kind)
            .map_err(|e| Error::restore(format!("checking restore target {}", target), e))?;
        if conflict {
            debug!("Restore target exists: {}", target);
            plan.conflicts.push(target.clone());
        }

        plan.entries.push(PlannedEntry {
            member,
            target,
            kind,
        });
    }

    Ok(plan)
}

/// Directories may already exist; anything else at a target blocks the restore.
///
/// Only a target that is absent is free. A target that cannot be checked
/// is an error rather than a guess.
fn is_conflict(target: &Utf8Path, kind: EntryKind) -> io::Result<bool> {
    match fs::symlink_metadata(target) {
        // an existing directory, or a symlink to one, is reused
        Ok(_) if kind.is_dir() => Ok(!target.is_dir()),
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        // a file standing where a parent directory belongs
        Err(_) if blocked_by_file(target) => Ok(true),
        Err(e) => Err(e),
    }
}

fn blocked_by_file(target: &Utf8Path) -> bool {
    target
        .ancestors()
        .skip(1)
        .any(|p| fs::symlink_metadata(p).is_ok() && !p.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_kind_mapping() {
        assert_eq!(entry_kind(EntryType::Directory), EntryKind::Directory);
        assert_eq!(entry_kind(EntryType::Regular), EntryKind::File);
        assert_eq!(entry_kind(EntryType::Symlink), EntryKind::Symlink);
        assert_eq!(entry_kind(EntryType::Fifo), EntryKind::Other);
    }

    #[test]
    fn test_in_scope() {
        let scope = DirectorySet::new(["/a/b/c/e"]).unwrap();
        assert!(in_scope(None, Utf8Path::new("anything")));
        assert!(in_scope(Some(&scope), Utf8Path::new("a/b/c/e/file4.txt")));
        assert!(!in_scope(Some(&scope), Utf8Path::new("a/b/d/file5.txt")));
        assert!(!in_scope(Some(&scope), Utf8Path::new("a/b")));
    }

    #[test]
    fn test_is_conflict() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::create_dir(root.join("dir")).unwrap();
        fs::write(root.join("file"), "x").unwrap();

        assert!(!is_conflict(&root.join("dir"), EntryKind::Directory).unwrap());
        assert!(is_conflict(&root.join("dir"), EntryKind::File).unwrap());
        assert!(is_conflict(&root.join("file"), EntryKind::File).unwrap());
        assert!(is_conflict(&root.join("file"), EntryKind::Directory).unwrap());
        assert!(!is_conflict(&root.join("absent"), EntryKind::File).unwrap());
        assert!(is_conflict(&root.join("file/below"), EntryKind::File).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_target_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let locked = root.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores permission bits; nothing to assert in that case
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let checked = is_conflict(&locked.join("file"), EntryKind::File);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let err = checked.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    /// Writes a one-file archive whose member name is stored verbatim.
    fn archive_with_raw_member(path: &Utf8Path, name: &[u8]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_entry_type(EntryType::Regular);
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"evil"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_escaping_member_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let archive = dir.join("evil.tar.gz");
        let root = dir.join("root");
        fs::create_dir(&root).unwrap();
        archive_with_raw_member(&archive, b"../escaped.txt");

        let err = build_plan(&archive, &root, None).unwrap_err();
        assert!(matches!(err, Error::Restore { .. }), "got: {:?}", err);
        assert!(!dir.join("escaped.txt").exists());
    }

    #[test]
    fn test_plan_counts() {
        let plan = RestorePlan {
            entries: vec![
                PlannedEntry {
                    member: "a".into(),
                    target: "/a".into(),
                    kind: EntryKind::Directory,
                },
                PlannedEntry {
                    member: "a/f".into(),
                    target: "/a/f".into(),
                    kind: EntryKind::File,
                },
            ],
            conflicts: vec![],
            ignored: 0,
        };
        assert_eq!(plan.directory_count(), 1);
        assert_eq!(plan.file_count(), 1);
        plan.ensure_no_conflicts().unwrap();
    }
}
