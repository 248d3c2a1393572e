//! Directory set validation and archive member naming.
//!
//! Paths are compared segment by segment, so `/tmp/a` contains `/tmp/a/b`
//! but has nothing to do with `/tmp/ab`.

use crate::error::{Error, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

/// A validated, ordered set of absolute directories.
///
/// Entries are normalized (no trailing or repeated separators, no `.`
/// segments) and pairwise non-overlapping. Order is preserved and decides the
/// order in which directories are archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySet {
    directories: Vec<Utf8PathBuf>,
}

impl DirectorySet {
    /// Validates `paths` and builds a directory set from them.
    ///
    /// Every path is normalized first, so a relative path is reported even
    /// when the input also contains overlapping entries.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let directories = paths
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        for (i, first) in directories.iter().enumerate() {
            for second in &directories[i + 1..] {
                if overlaps(first, second) {
                    return Err(Error::overlap(first, second));
                }
            }
        }

        Ok(Self { directories })
    }

    /// The directories, in insertion order
    pub fn as_slice(&self) -> &[Utf8PathBuf] {
        &self.directories
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Utf8PathBuf> {
        self.directories.iter()
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Returns true if `path` is one of the directories or lies below one.
    pub fn covers(&self, path: &Utf8Path) -> bool {
        let wanted = segments(path);
        self.directories.iter().any(|dir| {
            let prefix = segments(dir);
            wanted.len() >= prefix.len() && wanted[..prefix.len()] == prefix[..]
        })
    }

    /// Returns true if both sets name the same directories, ignoring order.
    pub fn same_directories(&self, other: &DirectorySet) -> bool {
        let ours: BTreeSet<&Utf8PathBuf> = self.directories.iter().collect();
        let theirs: BTreeSet<&Utf8PathBuf> = other.directories.iter().collect();
        ours == theirs
    }
}

impl<'a> IntoIterator for &'a DirectorySet {
    type Item = &'a Utf8PathBuf;
    type IntoIter = std::slice::Iter<'a, Utf8PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.directories.iter()
    }
}

/// Validates a list of directories without keeping the result.
pub fn validate<I, P>(paths: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Utf8Path>,
{
    DirectorySet::new(paths).map(|_| ())
}

/// Normalizes an absolute directory path.
///
/// Symlinks are not resolved. `..` segments are rejected because they make
/// segment-wise comparison meaningless without touching the filesystem.
pub fn normalize(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if !path.is_absolute() {
        return Err(Error::invalid_path(path, "path must be absolute"));
    }

    let mut normalized = Utf8PathBuf::from("/");
    for component in path.components() {
        match component {
            Utf8Component::RootDir | Utf8Component::CurDir => {}
            Utf8Component::Normal(segment) => normalized.push(segment),
            Utf8Component::ParentDir => {
                return Err(Error::invalid_path(path, "'..' segments are not allowed"));
            }
            Utf8Component::Prefix(_) => {
                return Err(Error::invalid_path(path, "path prefixes are not supported"));
            }
        }
    }

    if normalized.as_str() == "/" {
        return Err(Error::invalid_path(
            path,
            "the filesystem root cannot be a protected directory",
        ));
    }

    Ok(normalized)
}

/// Returns true if one path equals the other or is its ancestor.
pub fn overlaps(a: &Utf8Path, b: &Utf8Path) -> bool {
    let a = segments(a);
    let b = segments(b);
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// Archive member name for an absolute path: the path without its root.
pub fn member_name(path: &Utf8Path) -> &Utf8Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Absolute path an archive member originally came from.
pub fn original_path(member: &Utf8Path) -> Utf8PathBuf {
    Utf8Path::new("/").join(member)
}

/// Where `member` lands when restored under `root`.
///
/// Returns `None` for names that would escape `root`: absolute names and
/// names containing `..`.
pub fn target_path(root: &Utf8Path, member: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut target = root.to_path_buf();
    for component in member.components() {
        match component {
            Utf8Component::Normal(segment) => target.push(segment),
            Utf8Component::CurDir => {}
            _ => return None,
        }
    }
    Some(target)
}

fn segments(path: &Utf8Path) -> Vec<&str> {
    path.components()
        .filter_map(|c| match c {
            Utf8Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect()
}
