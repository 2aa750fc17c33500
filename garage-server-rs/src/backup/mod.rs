//! Backup and restore of every registered collection.
//!
//! A backup is a zip archive holding one `<collection>.json` entry per
//! collection. Restoring an archive replaces the contents of each collection
//! whose name matches an entry (case-insensitively).

pub mod archive;
pub mod restore;
pub mod retention;
pub mod snapshot;

pub use archive::{archive_name, read_archive, ArchiveEntry};
pub use restore::{restore_archive, restore_entries, RestoreReport, RestoreStrategy};
pub use retention::{list_archives, resolve_stored, sweep, ArchiveInfo};
pub use snapshot::{snapshot, SnapshotEntry};

use crate::store::{DocumentStore, StoreError};
use std::path::{Path, PathBuf};

pub const ARCHIVE_SUFFIX: &str = ".zip";
pub const ENTRY_SUFFIX: &str = ".json";

#[derive(thiserror::Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed archive entry {entry}: {source}")]
    Parse {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid backup name: {0:?}")]
    InvalidName(String),

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Restore failed on collection {collection} (already replaced: {replaced:?}): {source}")]
    RestoreFailed {
        collection: String,
        replaced: Vec<String>,
        #[source]
        source: StoreError,
    },
}

/// A finalized archive written to the backup directory.
#[derive(Debug, Clone)]
pub struct StoredBackup {
    pub name: String,
    pub path: PathBuf,
    pub collections: usize,
    pub removed: Vec<PathBuf>,
}

/// Snapshots the store into an in-memory archive. Returns the archive's file
/// name and its bytes.
pub fn create_backup_archive(store: &dyn DocumentStore) -> Result<(String, Vec<u8>), BackupError> {
    let entries = snapshot(store)?;
    let name = archive_name(chrono::Utc::now());
    let bytes = archive::archive_to_bytes(&entries)?;
    tracing::info!(
        archive = %name,
        collections = entries.len(),
        bytes = bytes.len(),
        "[Backup] Archive created"
    );
    Ok((name, bytes))
}

/// Snapshots the store into a new archive under `dir`, then prunes the
/// directory down to the `keep` most recent archives.
pub fn create_stored_backup(
    store: &dyn DocumentStore,
    dir: &Path,
    keep: usize,
) -> Result<StoredBackup, BackupError> {
    let entries = snapshot(store)?;
    let name = archive_name(chrono::Utc::now());
    let path = archive::write_archive_file(dir, &name, &entries)?;
    tracing::info!(
        archive = %name,
        collections = entries.len(),
        "[Backup] Archive written to {}",
        path.display()
    );

    let removed = sweep(dir, keep);
    Ok(StoredBackup {
        name,
        path,
        collections: entries.len(),
        removed,
    })
}
