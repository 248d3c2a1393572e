//! Error types for keeper-backup

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use thiserror::Error;

/// Result type alias using keeper-backup's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Backup engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// A directory path is not absolute or cannot be normalized
    #[error("Invalid directory path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Two directories are identical or one contains the other
    #[error("Overlapping directories: {first} and {second}")]
    Overlap {
        first: Utf8PathBuf,
        second: Utf8PathBuf,
    },

    /// I/O failure while reading a directory or writing the archive
    #[error("Backup failed: {context}")]
    Backup {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Restore targets already exist; nothing was written
    #[error(
        "Restore would overwrite {} existing path(s): {}",
        .conflicts.len(),
        join_paths(.conflicts)
    )]
    RestoreConflict { conflicts: Vec<Utf8PathBuf> },

    /// Archive unreadable or corrupt, or extraction failed
    #[error("Restore failed: {context}")]
    Restore {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The guarded service is running and the policy forbids proceeding
    #[error("Service {service} is running; stop it first or choose another service policy")]
    ServiceRunning { service: String },

    /// The service guard could not query or control the service
    #[error("Service control failed: {message}")]
    Service { message: String },
}

impl Error {
    /// Create an invalid path error
    pub fn invalid_path(path: impl AsRef<str>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.as_ref().to_string(),
            reason: reason.into(),
        }
    }

    /// Create an overlap error
    pub fn overlap(first: &Utf8Path, second: &Utf8Path) -> Self {
        Self::Overlap {
            first: first.to_path_buf(),
            second: second.to_path_buf(),
        }
    }

    /// Create a backup error wrapping an I/O cause
    pub fn backup(context: impl Into<String>, source: io::Error) -> Self {
        Self::Backup {
            context: context.into(),
            source,
        }
    }

    /// Create a restore error wrapping an I/O cause
    pub fn restore(context: impl Into<String>, source: io::Error) -> Self {
        Self::Restore {
            context: context.into(),
            source,
        }
    }

    /// Create a restore conflict error
    pub fn restore_conflict(conflicts: Vec<Utf8PathBuf>) -> Self {
        Self::RestoreConflict { conflicts }
    }

    /// Create a service running error
    pub fn service_running(service: impl Into<String>) -> Self {
        Self::ServiceRunning {
            service: service.into(),
        }
    }

    /// Create a service control error
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Paths blocking a restore, if this is a conflict error
    pub fn conflicts(&self) -> Option<&[Utf8PathBuf]> {
        match self {
            Self::RestoreConflict { conflicts } => Some(conflicts),
            _ => None,
        }
    }
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_lists_every_path() {
        let err = Error::restore_conflict(vec![
            Utf8PathBuf::from("/srv/a.txt"),
            Utf8PathBuf::from("/srv/b.txt"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 existing path(s)"), "got: {}", msg);
        assert!(msg.contains("/srv/a.txt, /srv/b.txt"), "got: {}", msg);
        assert_eq!(err.conflicts().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_backup_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::backup(
            "reading /var/lib/rundeck/data",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.source().is_some());
        assert!(err.conflicts().is_none());
    }
}
