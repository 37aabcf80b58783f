//! Merged archive validation
//!
//! Runs strictly before any swap: the candidate must be a well-formed ZIP
//! container and must contain the metadata store entry. Failures never touch
//! live data.

use std::fs::File;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use super::{BackupError, DB_ENTRY};

/// Check that `path` is a well-formed backup archive containing the
/// metadata store entry.
pub fn validate_archive(path: &Path) -> Result<(), BackupError> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(file).map_err(|e| match e {
        ZipError::Io(io) => BackupError::Io(io),
        other => BackupError::Validation(format!("not a valid backup archive: {other}")),
    })?;

    if archive.index_for_name(DB_ENTRY).is_none() {
        return Err(BackupError::Validation(format!(
            "backup archive is missing the {DB_ENTRY} entry"
        )));
    }
    Ok(())
}
