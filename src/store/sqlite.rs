use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use super::ScanStore;
use crate::error::StoreError;
use crate::models::{Domain, ScanId, ScanRecord, ScanReport, ScanStatus};

/// SQLite-backed store using the `scans` and `scan_results` tables.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    ///
    /// In-memory URLs get a single connection so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        }
        .connect_with(options)
        .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(url, "scan store ready");
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Pool and transport failures mean the database is unreachable; everything else
/// is a query-level error.
fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Backend(err.to_string())
        }
        other => StoreError::Sqlx(other),
    }
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("{}: {}", column, e)))
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let domain: String = row.try_get("domain")?;
    let status: String = row.try_get("status")?;
    let progress: i64 = row.try_get("progress")?;
    let error: Option<String> = row.try_get("error")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ScanRecord {
        id: id
            .parse()
            .map_err(|_| StoreError::Decode(format!("id: {}", id)))?,
        domain: Domain::parse(&domain).map_err(|e| StoreError::Decode(e.to_string()))?,
        status: ScanStatus::parse(&status)
            .ok_or_else(|| StoreError::Decode(format!("status: {}", status)))?,
        progress: u8::try_from(progress.clamp(0, 100)).unwrap_or(0),
        error,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl ScanStore for SqliteStore {
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scans (id, domain, status, progress, error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                error = excluded.error,
                updated_at = excluded.updated_at",
        )
        .bind(record.id.to_string())
        .bind(record.domain.as_str())
        .bind(record.status.as_str())
        .bind(i64::from(record.progress))
        .bind(record.error.as_deref())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, domain, status, progress, error, created_at, updated_at
             FROM scans WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn save_report(&self, report: &ScanReport) -> Result<(), StoreError> {
        let body = serde_json::to_string(report)?;
        let result = sqlx::query(
            "INSERT INTO scan_results (scan_id, results, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(scan_id) DO NOTHING",
        )
        .bind(report.scan_id.to_string())
        .bind(body)
        .bind(report.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ReportExists(report.scan_id));
        }
        Ok(())
    }

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError> {
        let row = sqlx::query("SELECT results FROM scan_results WHERE scan_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        match row {
            Some(row) => {
                let body: String = row.try_get("results")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }
}
