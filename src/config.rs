//! Configuration management for Drop Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::backup::SPLIT_THRESHOLD;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret checked on every /api request.
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Blob store root: uploaded file contents live here.
    pub upload_dir: PathBuf,
    /// Backup artifacts, the restore workspace and safety snapshots live here.
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// On-disk SQLite metadata store.
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Archives larger than this are split into numbered parts.
    pub split_threshold: u64,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.file.display())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            auth: AuthConfig {
                password: "changeme".to_string(),
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                backup_dir: PathBuf::from("backups"),
            },
            database: DatabaseConfig {
                file: PathBuf::from("metadata.db"),
            },
            backup: BackupConfig {
                split_threshold: SPLIT_THRESHOLD,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            auth: AuthConfig {
                password: env::var("DROP_PASSWORD").unwrap_or(defaults.auth.password),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                backup_dir: env::var("BACKUP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.backup_dir),
            },
            database: DatabaseConfig {
                file: env::var("DB_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.database.file),
            },
            backup: BackupConfig {
                split_threshold: env::var("SPLIT_THRESHOLD")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(defaults.backup.split_threshold),
            },
        }
    }

    /// True when the operator never set a password of their own.
    pub fn uses_default_password(&self) -> bool {
        self.auth.password == "changeme"
    }
}
