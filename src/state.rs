//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    /// Pool handle is swappable: a restore closes the pool, replaces the
    /// database file and installs a fresh pool.
    db: RwLock<SqlitePool>,
    /// Serializes restore attempts end to end.
    restore_lock: Mutex<()>,
    /// Guards the live metadata store and blob root: exports hold it shared
    /// while reading, the swapping phase holds it exclusively.
    live_data: RwLock<()>,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db: RwLock::new(db),
                restore_lock: Mutex::new(()),
                live_data: RwLock::new(()),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a handle to the current database pool
    pub async fn db(&self) -> SqlitePool {
        self.inner.db.read().await.clone()
    }

    /// Restore serialization lock
    pub fn restore_lock(&self) -> &Mutex<()> {
        &self.inner.restore_lock
    }

    /// Live-data access lock
    pub fn live_data(&self) -> &RwLock<()> {
        &self.inner.live_data
    }

    /// Close the current pool so the database file can be relocated
    pub async fn close_db(&self) {
        self.inner.db.read().await.close().await;
    }

    /// Install a fresh pool after the database file was replaced
    pub async fn install_db(&self, pool: SqlitePool) {
        *self.inner.db.write().await = pool;
    }
}
