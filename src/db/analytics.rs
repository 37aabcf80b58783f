//! Traffic and login analytics

use std::collections::HashMap;

use chrono::{Local, TimeZone};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;

use super::now_ts;

/// Daily upload/download byte totals
#[derive(Debug, Clone, Serialize)]
pub struct DailyTraffic {
    pub date: String,
    pub upload: i64,
    pub download: i64,
}

/// One login attempt
#[derive(Debug, Clone, Serialize)]
pub struct LoginEntry {
    pub ip: String,
    pub status: String,
    pub time: f64,
}

/// File extension frequency for the type distribution chart
#[derive(Debug, Clone, Serialize)]
pub struct TypeCount {
    pub name: String,
    pub value: i64,
}

/// Aggregated analytics payload
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub traffic: Vec<DailyTraffic>,
    pub logins: Vec<LoginEntry>,
    #[serde(rename = "fileTypes")]
    pub file_types: Vec<TypeCount>,
}

/// Analytics repository
pub struct AnalyticsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalyticsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an upload or download event
    pub async fn log_traffic(&self, kind: &str, size: i64) -> Result<()> {
        sqlx::query("INSERT INTO traffic_stats (type, size, timestamp) VALUES (?, ?, ?)")
            .bind(kind)
            .bind(size)
            .bind(now_ts())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record a login attempt
    pub async fn log_login(&self, ip: &str, success: bool) -> Result<()> {
        sqlx::query("INSERT INTO login_logs (ip, status, timestamp) VALUES (?, ?, ?)")
            .bind(ip)
            .bind(if success { "success" } else { "failed" })
            .bind(now_ts())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Build the analytics summary: last 7 days of traffic bucketed per local
    /// day, last 20 login attempts, and the file type distribution.
    pub async fn summary(&self) -> Result<AnalyticsSummary> {
        let since = now_ts() - 7.0 * 24.0 * 3600.0;
        let traffic_rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT type, size, timestamp FROM traffic_stats
             WHERE timestamp > ? ORDER BY timestamp ASC",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        let mut daily: HashMap<String, DailyTraffic> = HashMap::new();
        for (kind, size, ts) in traffic_rows {
            let day = match Local.timestamp_opt(ts as i64, 0).single() {
                Some(dt) => dt.format("%Y-%m-%d").to_string(),
                None => continue,
            };
            let bucket = daily.entry(day.clone()).or_insert_with(|| DailyTraffic {
                date: day,
                upload: 0,
                download: 0,
            });
            match kind.as_str() {
                "upload" => bucket.upload += size,
                "download" => bucket.download += size,
                _ => {}
            }
        }
        let mut traffic: Vec<DailyTraffic> = daily.into_values().collect();
        traffic.sort_by(|a, b| a.date.cmp(&b.date));

        let login_rows: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT ip, status, timestamp FROM login_logs
             ORDER BY timestamp DESC LIMIT 20",
        )
        .fetch_all(self.pool)
        .await?;
        let logins = login_rows
            .into_iter()
            .map(|(ip, status, time)| LoginEntry { ip, status, time })
            .collect();

        let filenames: Vec<(String,)> = sqlx::query_as("SELECT filename FROM files")
            .fetch_all(self.pool)
            .await?;
        let mut type_counts: HashMap<String, i64> = HashMap::new();
        for (name,) in filenames {
            let ext = match name.rsplit_once('.') {
                Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
                _ => "unknown".to_string(),
            };
            *type_counts.entry(ext).or_insert(0) += 1;
        }
        let mut file_types: Vec<TypeCount> = type_counts
            .into_iter()
            .map(|(name, value)| TypeCount { name, value })
            .collect();
        file_types.sort_by(|a, b| b.value.cmp(&a.value).then(a.name.cmp(&b.name)));

        Ok(AnalyticsSummary {
            traffic,
            logins,
            file_types,
        })
    }
}
