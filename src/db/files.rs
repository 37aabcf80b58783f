//! File catalog database operations

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

use super::now_ts;

/// One catalog row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub size: i64,
    pub upload_time: f64,
    pub is_pinned: i64,
    pub group_name: Option<String>,
    pub tags: Option<String>,
}

/// New catalog row (id assigned by the database)
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub filepath: String,
    pub size: i64,
    pub group_name: Option<String>,
    pub tags: Option<String>,
}

/// Metadata update request (empty string clears the value)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFileMeta {
    pub group_name: Option<String>,
    pub tags: Option<String>,
}

/// File catalog repository
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all files, pinned first, newest first within each group
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, filepath, size, upload_time,
                    COALESCE(is_pinned, 0) AS is_pinned, group_name, tags
             FROM files
             ORDER BY is_pinned DESC, upload_time DESC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, filepath, size, upload_time,
                    COALESCE(is_pinned, 0) AS is_pinned, group_name, tags
             FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert(&self, record: &NewFileRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO files (filename, filepath, size, upload_time, group_name, tags)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.filename)
        .bind(&record.filepath)
        .bind(record.size)
        .bind(now_ts())
        .bind(&record.group_name)
        .bind(&record.tags)
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Rename the display name only; the blob on disk keeps its path.
    pub async fn rename(&self, id: i64, new_name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE files SET filename = ? WHERE id = ?")
            .bind(new_name)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update group and/or tags. Fields left out of the request are
    /// untouched; an empty string clears the stored value.
    pub async fn update_meta(&self, id: i64, meta: &UpdateFileMeta) -> Result<Option<FileRecord>> {
        if let Some(group_name) = &meta.group_name {
            sqlx::query("UPDATE files SET group_name = ? WHERE id = ?")
                .bind(group_name)
                .bind(id)
                .execute(self.pool)
                .await?;
        }
        if let Some(tags) = &meta.tags {
            sqlx::query("UPDATE files SET tags = ? WHERE id = ?")
                .bind(tags)
                .bind(id)
                .execute(self.pool)
                .await?;
        }
        self.get(id).await
    }

    /// Flip the pin flag, returning the new state
    pub async fn toggle_pin(&self, id: i64) -> Result<Option<bool>> {
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };
        let new_status = if record.is_pinned != 0 { 0 } else { 1 };
        sqlx::query("UPDATE files SET is_pinned = ? WHERE id = ?")
            .bind(new_status)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(Some(new_status != 0))
    }

    /// Remove the catalog row; the caller is responsible for the blob.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
