//! Backup export/restore subsystem
//!
//! Export packs the metadata store and the blob tree into one ZIP archive,
//! splits it into size-bounded parts when needed, and registers the
//! artifacts in the file catalog. Restore reassembles uploaded parts in an
//! isolated workspace, validates the result, relocates the current live data
//! into a safety snapshot and installs the extracted data in its place.
//!
//! All functions here are synchronous filesystem work; handlers run them
//! under `spawn_blocking`.

pub mod archive;
pub mod merge;
pub mod registry;
pub mod split;
pub mod swap;
pub mod validate;
pub mod workspace;

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Config;

/// Archives above this size are split into parts (500 MiB).
pub const SPLIT_THRESHOLD: u64 = 524_288_000;

/// Fixed buffer size for all streaming copies (1 MiB). Keeps peak memory
/// independent of archive size.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Archive root entry holding the metadata store snapshot.
pub const DB_ENTRY: &str = "metadata.db";

/// Archive root directory mirroring the blob store.
pub const BLOB_ENTRY_ROOT: &str = "uploads";

/// Catalog group for generated backup artifacts.
pub const BACKUP_GROUP: &str = "System Backups";

/// Catalog tag for generated backup artifacts.
pub const BACKUP_TAG: &str = "backup";

/// Hard ceiling on parts per archive. Sequence numbers are zero-padded to
/// three digits so lexicographic order equals numeric order; a fourth digit
/// would break that.
pub const MAX_PARTS: u64 = 999;

/// Errors raised inside the backup subsystem
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Client-supplied input failed a check; surfaced as a 400.
    #[error("{0}")]
    Validation(String),

    #[error("archive of {size} bytes would exceed the {MAX_PARTS}-part limit")]
    TooManyParts { size: u64 },
}

/// Phases of a restore attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Receiving,
    Merging,
    Validating,
    Swapping,
    Done,
    Aborted,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestorePhase::Receiving => "receiving",
            RestorePhase::Merging => "merging",
            RestorePhase::Validating => "validating",
            RestorePhase::Swapping => "swapping",
            RestorePhase::Done => "done",
            RestorePhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A restore failure, tagged with the phase that aborted
#[derive(Debug, Error)]
#[error("restore aborted while {phase}: {source}")]
pub struct RestoreError {
    pub phase: RestorePhase,
    #[source]
    pub source: BackupError,
}

impl RestoreError {
    pub fn new(phase: RestorePhase, source: impl Into<BackupError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }
}

/// One generated backup artifact: either a whole archive or a single part
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Paths and limits the backup components operate on. Built from [`Config`];
/// tests construct it directly with a small threshold.
#[derive(Debug, Clone)]
pub struct BackupContext {
    /// Live metadata store file.
    pub db_path: PathBuf,
    /// Live blob store root.
    pub blob_root: PathBuf,
    /// Where artifacts, the workspace and safety snapshots live.
    pub backup_dir: PathBuf,
    pub split_threshold: u64,
}

impl BackupContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            db_path: config.database.file.clone(),
            blob_root: config.storage.upload_dir.clone(),
            backup_dir: config.storage.backup_dir.clone(),
            split_threshold: config.backup.split_threshold,
        }
    }
}

/// Copy everything from `reader` to `writer` in [`CHUNK_SIZE`] slices.
pub(crate) fn copy_chunked<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> std::io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Copy at most `limit` bytes, in [`CHUNK_SIZE`] slices. Returns the number
/// of bytes actually copied (less than `limit` at end of input).
pub(crate) fn copy_limited<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = limit;
    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(limit - remaining)
}
