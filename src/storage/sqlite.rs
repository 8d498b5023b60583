//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Workers for different targets write concurrently
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Target names are stored `COLLATE NOCASE`, so lookups by [`TargetId`] match
//! regardless of the display name's casing. Timestamps are Unix milliseconds.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, HistoryRange, HistoryStore, Page, RequestStore, StateStore};
use super::error::{StorageError, StorageResult};
use crate::{Sample, Target, TargetId, TargetRequest};

const TARGET_COLUMNS: &str =
    "name, address, online, max_online, description, favicon, peak, peak_at";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    pub async fn close(&self) {
        info!("closing SQLite backend");
        self.pool.close().await;
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::Corrupt(format!("timestamp {millis} out of range")))
    }

    fn count_from(value: i64, column: &str) -> StorageResult<u32> {
        u32::try_from(value)
            .map_err(|_| StorageError::Corrupt(format!("{column} = {value} is not a valid count")))
    }

    fn target_from_row(row: &SqliteRow) -> StorageResult<Target> {
        Ok(Target {
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            online: Self::count_from(row.try_get("online")?, "online")?,
            max: Self::count_from(row.try_get("max_online")?, "max_online")?,
            description: row.try_get("description")?,
            favicon: row.try_get("favicon")?,
            peak: Self::count_from(row.try_get("peak")?, "peak")?,
            peak_at: Self::millis_to_timestamp(row.try_get("peak_at")?)?,
        })
    }
}

#[async_trait]
impl StateStore for SqliteBackend {
    #[instrument(skip(self), fields(target = %id))]
    async fn get(&self, id: &TargetId) -> StorageResult<Option<Target>> {
        let row = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE name = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::target_from_row).transpose()
    }

    #[instrument(skip(self, target), fields(target = %target.name))]
    async fn upsert(&self, target: &Target) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO targets (
                name, address, online, max_online, description, favicon, peak, peak_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                address = excluded.address,
                online = excluded.online,
                max_online = excluded.max_online,
                description = excluded.description,
                favicon = excluded.favicon,
                peak = excluded.peak,
                peak_at = excluded.peak_at
            "#,
        )
        .bind(&target.name)
        .bind(&target.address)
        .bind(target.online as i64)
        .bind(target.max as i64)
        .bind(&target.description)
        .bind(&target.favicon)
        .bind(target.peak as i64)
        .bind(target.peak_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(target = %id))]
    async fn delete(&self, id: &TargetId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM targets WHERE name = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> StorageResult<Vec<Target>> {
        let rows = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::target_from_row).collect()
    }

    async fn list_page(&self, page: Page) -> StorageResult<Vec<Target>> {
        let rows = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets ORDER BY online DESC, name ASC LIMIT ? OFFSET ?"
        ))
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::target_from_row).collect()
    }

    async fn count(&self) -> StorageResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM targets")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.max(0) as u64)
    }

    async fn total_online(&self) -> StorageResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COALESCE(SUM(online), 0) FROM targets")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.max(0) as u64)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }
}

#[async_trait]
impl HistoryStore for SqliteBackend {
    #[instrument(skip(self, sample), fields(target = %sample.target))]
    async fn append(&self, sample: &Sample) -> StorageResult<()> {
        sqlx::query("INSERT INTO samples (target, timestamp, online) VALUES (?, ?, ?)")
            .bind(sample.target.as_str())
            .bind(sample.timestamp.timestamp_millis())
            .bind(sample.online as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(target = %range.target))]
    async fn query_range(&self, range: HistoryRange) -> StorageResult<Vec<Sample>> {
        debug!(
            "querying samples for {} from {} to {}",
            range.target, range.start, range.end
        );

        // LIMIT -1 means "no limit" in SQLite
        let limit = range.limit.map(|l| l as i64).unwrap_or(-1);

        let rows = sqlx::query(
            r#"
            SELECT target, timestamp, online
            FROM samples
            WHERE target = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            LIMIT ?
            "#,
        )
        .bind(range.target.as_str())
        .bind(range.start.timestamp_millis())
        .bind(range.end.timestamp_millis())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let target: String = row.try_get("target")?;
                Ok(Sample {
                    target: TargetId::new(&target),
                    timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?)?,
                    online: Self::count_from(row.try_get("online")?, "online")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(target = %id))]
    async fn delete_all(&self, id: &TargetId) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM samples WHERE target = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!("deleted {} samples", deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl RequestStore for SqliteBackend {
    async fn submit(&self, request: &TargetRequest) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO target_requests (name, address, online, submitted_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&request.name)
        .bind(&request.address)
        .bind(request.online as i64)
        .bind(request.submitted_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_requests(&self) -> StorageResult<Vec<TargetRequest>> {
        let rows = sqlx::query(
            "SELECT name, address, online, submitted_at FROM target_requests ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TargetRequest {
                    name: row.try_get("name")?,
                    address: row.try_get("address")?,
                    online: Self::count_from(row.try_get("online")?, "online")?,
                    submitted_at: Self::millis_to_timestamp(row.try_get("submitted_at")?)?,
                })
            })
            .collect()
    }
}
