//! Registry writer
//!
//! Inserts generated backup artifacts into the file catalog so they show up
//! in listings and can be downloaded. Append-only: existing entries are
//! never overwritten. If an insert fails the files already written to disk
//! stay where they are, just uncataloged.

use sqlx::SqlitePool;

use crate::db::{FileRepository, NewFileRecord};
use crate::error::Result;

use super::{BackupArtifact, BACKUP_GROUP, BACKUP_TAG};

/// Register each artifact under the `"System Backups"` group with the
/// `"backup"` tag.
pub async fn register_artifacts(pool: &SqlitePool, artifacts: &[BackupArtifact]) -> Result<()> {
    let repo = FileRepository::new(pool);
    for artifact in artifacts {
        repo.insert(&NewFileRecord {
            filename: artifact.name.clone(),
            filepath: artifact.path.to_string_lossy().into_owned(),
            size: artifact.size as i64,
            group_name: Some(BACKUP_GROUP.to_string()),
            tags: Some(BACKUP_TAG.to_string()),
        })
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use std::path::PathBuf;

    #[tokio::test]
    async fn artifacts_are_cataloged_under_the_backup_group() {
        // File-backed: pooled in-memory SQLite gives each pooled connection
        // its own empty database.
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("metadata.db").display());
        let pool = create_pool(&url).await.unwrap();
        let artifacts = vec![
            BackupArtifact {
                name: "backup_20240101_120000.zip.001".to_string(),
                path: PathBuf::from("backups/backup_20240101_120000.zip.001"),
                size: 500,
            },
            BackupArtifact {
                name: "backup_20240101_120000.zip.002".to_string(),
                path: PathBuf::from("backups/backup_20240101_120000.zip.002"),
                size: 100,
            },
        ];

        register_artifacts(&pool, &artifacts).await.unwrap();

        let rows = FileRepository::new(&pool).list().await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.group_name.as_deref(), Some(BACKUP_GROUP));
            assert_eq!(row.tags.as_deref(), Some(BACKUP_TAG));
        }
    }
}
