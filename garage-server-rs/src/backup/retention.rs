//! Stored archive catalogue and retention sweep.

use super::{BackupError, ARCHIVE_SUFFIX};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub name: String,
    pub created: String,
    pub size: u64,
}

struct ArchiveFile {
    name: String,
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

/// Finalized archives in `dir`, newest first.
fn archive_files(dir: &Path) -> io::Result<Vec<ArchiveFile>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(ARCHIVE_SUFFIX) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        archives.push(ArchiveFile {
            name,
            path: entry.path(),
            modified: metadata.modified()?,
            size: metadata.len(),
        });
    }

    archives.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });
    Ok(archives)
}

/// Keeps the `keep` most recently modified archives in `dir` and deletes the
/// rest. Failures are logged and never propagated; returns what was removed.
pub fn sweep(dir: &Path, keep: usize) -> Vec<PathBuf> {
    let archives = match archive_files(dir) {
        Ok(archives) => archives,
        Err(e) => {
            tracing::warn!("[Backup] Could not list {} for cleanup: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut removed = Vec::new();
    for old in archives.into_iter().skip(keep) {
        match fs::remove_file(&old.path) {
            Ok(()) => {
                tracing::info!("[Backup] Removed old backup: {}", old.name);
                removed.push(old.path);
            }
            Err(e) => tracing::warn!("[Backup] Failed to remove old backup {}: {}", old.name, e),
        }
    }
    removed
}

/// Descriptors of the stored archives, newest first. A missing directory
/// simply has no archives.
pub fn list_archives(dir: &Path) -> Result<Vec<ArchiveInfo>, BackupError> {
    let archives = match archive_files(dir) {
        Ok(archives) => archives,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(archives
        .into_iter()
        .map(|a| {
            let created: chrono::DateTime<chrono::Utc> = a.modified.into();
            ArchiveInfo {
                name: a.name,
                created: created.to_rfc3339(),
                size: a.size,
            }
        })
        .collect())
}

/// Resolves a stored archive by name, with or without the `.zip` suffix.
/// Names that could escape the backup directory are rejected.
pub fn resolve_stored(dir: &Path, name: &str) -> Result<PathBuf, BackupError> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(BackupError::InvalidName(name.to_string()));
    }

    let file_name = if name.ends_with(ARCHIVE_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{ARCHIVE_SUFFIX}")
    };
    let path = dir.join(&file_name);
    if !path.is_file() {
        return Err(BackupError::NotFound(file_name));
    }
    Ok(path)
}
