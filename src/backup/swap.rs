//! Live data swapper
//!
//! The only component allowed to mutate the live metadata store path and
//! blob store root. The swap order is fixed: a fresh safety snapshot is
//! created, the current live data is relocated into it, and only then is the
//! extracted data installed. A crash between those halves leaves live data
//! absent rather than mixed, and the snapshot guarantees nothing is lost.
//! After the snapshot exists there is no automatic rollback; recovery from a
//! failed swap is a manual operator move from the snapshot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::{BackupContext, BackupError, BLOB_ENTRY_ROOT, DB_ENTRY};

const SNAPSHOT_PREFIX: &str = "pre_restore_";

/// Sidecar files SQLite may leave next to the database.
const DB_SIDECARS: [&str; 2] = ["-wal", "-shm"];

/// Replace live data with the extracted tree, returning the safety snapshot
/// directory name.
///
/// Preconditions (checked): the extracted tree contains the metadata store
/// file. The caller must have passed validation, stopped database access and
/// hold exclusive access to the live paths.
pub fn swap_live_data(ctx: &BackupContext, extracted: &Path) -> Result<String, BackupError> {
    let extracted_db = extracted.join(DB_ENTRY);
    if !extracted_db.is_file() {
        return Err(BackupError::Validation(format!(
            "extracted data is missing the {DB_ENTRY} file"
        )));
    }

    let snapshot = create_snapshot_dir(&ctx.backup_dir)?;
    let snapshot_name = snapshot
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(snapshot = %snapshot_name, "Safety snapshot created");

    // Relocate live data out. Both moves must complete before anything is
    // installed.
    if ctx.db_path.exists() {
        fs::rename(&ctx.db_path, snapshot.join(DB_ENTRY))?;
    }
    for suffix in DB_SIDECARS {
        let sidecar = sidecar_path(&ctx.db_path, suffix);
        if sidecar.exists() {
            fs::rename(&sidecar, snapshot.join(format!("{DB_ENTRY}{suffix}")))?;
        }
    }
    if ctx.blob_root.exists() {
        fs::rename(&ctx.blob_root, snapshot.join(BLOB_ENTRY_ROOT))?;
    } else {
        fs::create_dir_all(snapshot.join(BLOB_ENTRY_ROOT))?;
    }

    // Install the extracted data.
    fs::rename(&extracted_db, &ctx.db_path)?;
    let extracted_blobs = extracted.join(BLOB_ENTRY_ROOT);
    if extracted_blobs.is_dir() {
        fs::rename(&extracted_blobs, &ctx.blob_root)?;
    } else {
        // The archive had no blob tree: start with an empty blob store.
        fs::create_dir_all(&ctx.blob_root)?;
    }

    tracing::info!(snapshot = %snapshot_name, "Live data swapped");
    Ok(snapshot_name)
}

/// Create a uniquely named, timestamped snapshot directory. `create_dir` is
/// the uniqueness primitive; on a same-second collision a numeric suffix is
/// probed.
fn create_snapshot_dir(backup_dir: &Path) -> Result<PathBuf, BackupError> {
    fs::create_dir_all(backup_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("{SNAPSHOT_PREFIX}{stamp}")
        } else {
            format!("{SNAPSHOT_PREFIX}{stamp}_{counter}")
        };
        let candidate = backup_dir.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && counter < 1000 => {
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn sidecar_path(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
