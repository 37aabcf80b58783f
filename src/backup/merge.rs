//! Part merger
//!
//! Reassembles uploaded parts into one archive. Parts sort lexicographically
//! by file name, which equals numeric sequence order thanks to the
//! fixed-width part suffix, so the upload order never matters.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::split::is_part_name;
use super::workspace::Workspace;
use super::{copy_chunked, BackupError};

/// Merge the saved parts into a single candidate archive and return its
/// path.
///
/// A single upload whose name does not match the part-suffix pattern is
/// treated as an already-complete archive and used directly. Anything else
/// is concatenated in ascending name order, byte for byte, with no
/// reordering, deduplication or trimming.
pub fn merge_parts(workspace: &Workspace, mut parts: Vec<PathBuf>) -> Result<PathBuf, BackupError> {
    if parts.is_empty() {
        return Err(BackupError::Validation("no backup parts uploaded".to_string()));
    }

    parts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if parts.len() == 1 {
        let name = parts[0]
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_part_name(&name) {
            tracing::debug!(part = %name, "Single upload, skipping merge");
            return Ok(parts.remove(0));
        }
    }

    let merged = workspace.merged_path();
    let mut writer = BufWriter::new(File::create(&merged)?);
    for part in &parts {
        let mut reader = File::open(part)?;
        copy_chunked(&mut reader, &mut writer)?;
    }
    writer.flush()?;

    tracing::info!(parts = parts.len(), "Merged backup parts");
    Ok(merged)
}
