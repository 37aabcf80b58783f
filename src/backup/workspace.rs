//! Restore workspace
//!
//! One well-known scratch directory per server, scoped to a single restore
//! attempt: received parts, the merged archive and the extraction tree live
//! here. It is reset at the start of a restore (a failed attempt never
//! resumes) and removed on every outcome. Safety snapshots live outside the
//! workspace and are never touched by the cleaner.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::BackupError;

const WORKSPACE_DIR: &str = "restore_workspace";
const PARTS_DIR: &str = "parts";
const MERGED_NAME: &str = "restore.zip";
const EXTRACT_DIR: &str = "extracted";

/// Scratch directory tree for one restore attempt
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under the backup directory, clearing any
    /// stale one left behind by an interrupted attempt.
    pub fn prepare(backup_dir: &Path) -> io::Result<Self> {
        let root = backup_dir.join(WORKSPACE_DIR);
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(root.join(PARTS_DIR))?;
        Ok(Self { root })
    }

    pub fn parts_dir(&self) -> PathBuf {
        self.root.join(PARTS_DIR)
    }

    /// Destination for an uploaded part. The client-supplied name is reduced
    /// to its final component; names without one are rejected.
    pub fn part_path(&self, client_name: &str) -> Result<PathBuf, BackupError> {
        match Path::new(client_name).file_name() {
            Some(name) if name != "." && name != ".." => Ok(self.parts_dir().join(name)),
            _ => Err(BackupError::Validation(format!(
                "invalid part name: {client_name:?}"
            ))),
        }
    }

    /// Paths of all received parts
    pub fn saved_parts(&self) -> io::Result<Vec<PathBuf>> {
        let mut parts: Vec<PathBuf> = fs::read_dir(self.parts_dir())?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        parts.sort();
        Ok(parts)
    }

    /// Where the merger writes the reassembled archive
    pub fn merged_path(&self) -> PathBuf {
        self.root.join(MERGED_NAME)
    }

    /// Where the validated archive is extracted
    pub fn extract_dir(&self) -> PathBuf {
        self.root.join(EXTRACT_DIR)
    }

    /// Remove the whole workspace tree. Invoked on success and failure
    /// alike; a missing workspace is not an error.
    pub fn clean(&self) {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.root.display(), "Failed to clean workspace: {}", e);
            }
        }
    }
}
