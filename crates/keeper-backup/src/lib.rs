//! Keeper Backup Engine
//!
//! Backs up a fixed set of absolute directories into a single tar+gzip
//! archive and restores such archives without ever overwriting existing
//! files.
//!
//! # Features
//!
//! ## Backup
//! - **Validated directory sets**: paths are normalized and must not overlap
//! - **Deterministic archives**: members in set order, parents first, siblings sorted
//! - **Atomic writes**: the archive appears at its final path only when complete
//! - **Partial naming**: archives of an overridden directory set are marked `partial`
//!
//! ## Restore
//! - **Two-phase restore**: a full conflict scan runs before anything is written
//! - **No overwrites**: any existing target file aborts the restore
//! - **Scoped restore**: only members inside the keeper's directories are extracted
//! - **Service guard**: refuse, or stop and restart, a running service
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use keeper_backup::{Keeper, NamingPolicy};
//!
//! fn main() -> keeper_backup::Result<()> {
//!     let keeper = Keeper::new(["/var/lib/rundeck/data", "/var/rundeck/projects"])?;
//!     let name = NamingPolicy::new("rundeck").archive_name(false, None);
//!
//!     let result = keeper.backup(Utf8Path::new("/var/backups/rundeck"), &name)?;
//!     println!("Backup created: {} bytes", result.size_bytes);
//!
//!     keeper.restore(&result.archive_path)?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod error;
pub mod guard;
pub mod keeper;
pub mod naming;
pub mod paths;
pub mod restore;
pub mod walk;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, BackupResult};
pub use error::{Error, Result};
pub use guard::{run_guarded, ServiceGuard, StaticGuard, SystemdGuard};
pub use keeper::Keeper;
pub use naming::{is_override, NamingPolicy, PARTIAL_MARKER};
pub use paths::DirectorySet;
pub use restore::{PlannedEntry, RestorePlan, RestoreResult, Restorer};
pub use walk::EntryKind;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
