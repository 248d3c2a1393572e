//! Archive file naming.
//!
//! Generated names carry the service name and a timestamp. Archives built
//! from an override of the canonical directory set are marked `partial` so
//! operators can tell them apart from full backups at a glance.

use crate::paths::DirectorySet;
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Marker token embedded in names of partial backups.
pub const PARTIAL_MARKER: &str = "partial";

/// Extension of generated archive names.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Timestamp format used in generated names (sorts lexically by time).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Derives archive names for one service.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    service: String,
}

impl NamingPolicy {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Returns the archive name for a backup taken now.
    ///
    /// An explicit filename always wins and is used verbatim.
    pub fn archive_name(&self, partial: bool, explicit: Option<&str>) -> String {
        self.archive_name_at(partial, explicit, &Local::now())
    }

    /// Returns the archive name for a backup taken at `at`.
    pub fn archive_name_at<Tz>(&self, partial: bool, explicit: Option<&str>, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if let Some(name) = explicit {
            return name.to_string();
        }

        let timestamp = at.format(TIMESTAMP_FORMAT);
        if partial {
            format!(
                "{}-backup-{}-{}.{}",
                self.service, PARTIAL_MARKER, timestamp, ARCHIVE_EXTENSION
            )
        } else {
            format!("{}-backup-{}.{}", self.service, timestamp, ARCHIVE_EXTENSION)
        }
    }
}

/// Returns true if `used` is an override of `canonical`, i.e. names a
/// different set of directories.
pub fn is_override(canonical: &DirectorySet, used: &DirectorySet) -> bool {
    !canonical.same_directories(used)
}
