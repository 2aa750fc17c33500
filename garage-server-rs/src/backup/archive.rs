//! Zip archive writing and reading.

use super::{BackupError, SnapshotEntry, ARCHIVE_SUFFIX, ENTRY_SUFFIX};
use crate::store::Record;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Parsed contents of one `.json` archive entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry file name without the `.json` suffix, case preserved.
    pub name: String,
    pub file_name: String,
    pub records: Vec<Record>,
}

/// Timestamp-derived archive file name, e.g. `backup-2026-10-19T08-30-00-123Z.zip`.
pub fn archive_name(now: DateTime<Utc>) -> String {
    format!("backup-{}{}", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"), ARCHIVE_SUFFIX)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
}

/// Packs the entries into a zip written to `writer`. The returned writer holds
/// a finalized archive; an error at any point leaves nothing usable.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    entries: &[SnapshotEntry],
) -> Result<W, BackupError> {
    let mut zip = ZipWriter::new(writer);
    let options = entry_options();
    for entry in entries {
        zip.start_file(entry.entry_name.as_str(), options)?;
        zip.write_all(entry.json.as_bytes())?;
    }
    Ok(zip.finish()?)
}

pub fn archive_to_bytes(entries: &[SnapshotEntry]) -> Result<Vec<u8>, BackupError> {
    Ok(write_archive(Cursor::new(Vec::new()), entries)?.into_inner())
}

fn write_partial(path: &Path, entries: &[SnapshotEntry]) -> Result<(), BackupError> {
    let file = File::create(path)?;
    let writer = write_archive(BufWriter::new(file), entries)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Writes the archive as `dir/name`, creating `dir` if needed. The archive is
/// built under a `.partial` name and only renamed into place once finalized.
pub fn write_archive_file(
    dir: &Path,
    name: &str,
    entries: &[SnapshotEntry],
) -> Result<PathBuf, BackupError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let partial = dir.join(format!("{name}.partial"));

    let result = write_partial(&partial, entries)
        .and_then(|()| fs::rename(&partial, &path).map_err(BackupError::from));
    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&partial) {
            tracing::warn!("Failed to remove partial archive {}: {}", partial.display(), cleanup);
        }
        return Err(e);
    }
    Ok(path)
}

pub fn read_archive(path: &Path) -> Result<Vec<ArchiveEntry>, BackupError> {
    let file = File::open(path)?;
    read_archive_from(BufReader::new(file))
}

/// Parses every `.json` entry, in archive order. Directories and other files
/// are ignored; one malformed entry fails the whole read.
pub fn read_archive_from<R: Read + Seek>(reader: R) -> Result<Vec<ArchiveEntry>, BackupError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let full_name = file.name().to_string();
        let file_name = full_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();
        let Some(stem) = file_name.strip_suffix(ENTRY_SUFFIX) else {
            tracing::debug!(entry = %full_name, "Ignoring non-JSON archive entry");
            continue;
        };
        let name = stem.to_string();

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let records: Vec<Record> =
            serde_json::from_slice(&raw).map_err(|source| BackupError::Parse {
                entry: full_name.clone(),
                source,
            })?;

        entries.push(ArchiveEntry {
            name,
            file_name,
            records,
        });
    }

    Ok(entries)
}
