//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
///
/// Idempotent, and also run after a restore installs an older snapshot so
/// databases written before the `is_pinned`/`group_name`/`tags` columns
/// existed are migrated forward.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    migrate_files_columns(pool).await?;

    Ok(())
}

/// Add catalog columns that predate-schema databases are missing.
async fn migrate_files_columns(pool: &SqlitePool) -> Result<()> {
    let columns: Vec<(i64, String)> =
        sqlx::query_as("SELECT cid, name FROM pragma_table_info('files')")
            .fetch_all(pool)
            .await?;
    let names: Vec<&str> = columns.iter().map(|(_, n)| n.as_str()).collect();

    if !names.contains(&"is_pinned") {
        tracing::info!("Migrating: adding is_pinned column");
        sqlx::query("ALTER TABLE files ADD COLUMN is_pinned INTEGER DEFAULT 0")
            .execute(pool)
            .await?;
    }
    if !names.contains(&"group_name") {
        tracing::info!("Migrating: adding group_name column");
        sqlx::query("ALTER TABLE files ADD COLUMN group_name TEXT")
            .execute(pool)
            .await?;
    }
    if !names.contains(&"tags") {
        tracing::info!("Migrating: adding tags column");
        sqlx::query("ALTER TABLE files ADD COLUMN tags TEXT")
            .execute(pool)
            .await?;
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- File catalog (one row per stored blob)
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    filepath TEXT,
    size INTEGER,
    upload_time REAL,
    is_pinned INTEGER DEFAULT 0,
    group_name TEXT,
    tags TEXT
);

-- Upload/download traffic events for the analytics view
CREATE TABLE IF NOT EXISTS traffic_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT,
    size INTEGER,
    timestamp REAL
);

-- Login attempts (success and failure)
CREATE TABLE IF NOT EXISTS login_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ip TEXT,
    status TEXT,
    timestamp REAL
);
"#;
