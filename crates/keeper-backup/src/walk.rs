//! Deterministic directory tree walk.
//!
//! Yields the root first, then every descendant with parents before children
//! and siblings in file-name order. Symlinks below the root are reported,
//! never followed. A root that is a symlink to a directory is walked and
//! reported as a directory.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use walkdir::WalkDir;

/// Kind of a filesystem or archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    /// Sockets, fifos, devices
    Other,
}

impl EntryKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}

/// One walked path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
}

/// Device and inode of a file, independent of the path used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(path: &Utf8Path) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path).ok()?;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_path: &Utf8Path) -> Option<Self> {
        None
    }

    #[cfg(unix)]
    fn matches(&self, entry: &walkdir::DirEntry) -> bool {
        use std::os::unix::fs::MetadataExt;
        use walkdir::DirEntryExt;

        entry.ino() == self.ino && entry.metadata().map_or(false, |m| m.dev() == self.dev)
    }

    #[cfg(not(unix))]
    fn matches(&self, _entry: &walkdir::DirEntry) -> bool {
        false
    }
}

/// Files left out of a walk.
///
/// Matched by path and, where the platform has inode numbers, by identity,
/// so a file reached through `..` or a symlink is still recognized.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    paths: Vec<Utf8PathBuf>,
    ids: Vec<FileId>,
}

impl Exclusions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes `path`. Its identity is captured now, so it must exist
    /// already to be matched through another path.
    pub fn add(&mut self, path: &Utf8Path) {
        if let Some(id) = FileId::of(path) {
            self.ids.push(id);
        }
        self.paths.push(path.to_path_buf());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn matches(&self, entry: &walkdir::DirEntry, path: &Utf8Path) -> bool {
        self.paths.iter().any(|p| p == path) || self.ids.iter().any(|id| id.matches(entry))
    }
}

/// Lazy walk over one directory tree.
///
/// Constructing a new walk over the same root starts over from the beginning.
pub struct TreeWalk {
    inner: walkdir::IntoIter,
    excluded: Exclusions,
}

impl TreeWalk {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            inner: WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            excluded: Exclusions::new(),
        }
    }

    /// Leaves the excluded files (and everything below them) out of the walk.
    pub fn excluding(mut self, excluded: Exclusions) -> Self {
        self.excluded = excluded;
        self
    }
}

impl Iterator for TreeWalk {
    type Item = io::Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(io::Error::from(e))),
            };

            let kind = if entry.depth() == 0 && entry.path_is_symlink() {
                // walkdir always descends into a symlinked root
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_dir() => EntryKind::Directory,
                    _ => EntryKind::Symlink,
                }
            } else {
                EntryKind::from_file_type(entry.file_type())
            };

            let path = match Utf8Path::from_path(entry.path()) {
                Some(path) => path.to_path_buf(),
                None => {
                    return Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("path is not valid UTF-8: {}", entry.path().display()),
                    )))
                }
            };

            if !self.excluded.is_empty() && self.excluded.matches(&entry, &path) {
                if kind.is_dir() {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            return Some(Ok(WalkEntry { path, kind }));
        }
    }
}
