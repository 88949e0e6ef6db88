//! SQLite-backed history store.
//!
//! Two tables, created on connect when missing:
//!
//! - `sync_jobs`: one row per job attempt, completed in place
//! - `remote_calls`: one row per remote call, optionally linked to a job
//!
//! JSON payloads are stored as text.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use erp_sync_core::history::{HistoryStore, SqliteHistoryStore};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = SqliteHistoryStore::connect("sqlite://erp_sync_history.db", 4).await.unwrap();
//! let job = store
//!     .begin_job("product_sync", "create_product", &json!({"sku": "A1"}))
//!     .await
//!     .unwrap();
//! let calls = store.remote_calls(job).await.unwrap();
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::{
    duration_millis, HistoryJob, HistoryJobId, HistoryStore, RemoteCallRecord, StoredRemoteCall,
};
use crate::config::HistoryConfig;
use crate::error::Result;

const CREATE_SYNC_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS sync_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    request TEXT NOT NULL,
    success INTEGER,
    duration_ms INTEGER,
    outcome TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
)
"#;

const CREATE_REMOTE_CALLS: &str = r#"
CREATE TABLE IF NOT EXISTS remote_calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER REFERENCES sync_jobs(id),
    endpoint TEXT NOT NULL,
    request TEXT NOT NULL,
    response TEXT,
    success INTEGER NOT NULL,
    error TEXT,
    recorded_at TEXT NOT NULL
)
"#;

const CREATE_REMOTE_CALLS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_remote_calls_job_id ON remote_calls(job_id)";

#[derive(Debug, FromRow)]
struct SyncJobRow {
    id: i64,
    job_type: String,
    endpoint: String,
    request: Json<Value>,
    success: Option<bool>,
    duration_ms: Option<i64>,
    outcome: Option<Json<Value>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<SyncJobRow> for HistoryJob {
    fn from(row: SyncJobRow) -> Self {
        Self {
            id: HistoryJobId(row.id),
            job_type: row.job_type,
            endpoint: row.endpoint,
            request: row.request.0,
            success: row.success,
            duration_ms: row.duration_ms,
            outcome: row.outcome.map(|json| json.0),
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RemoteCallRow {
    id: i64,
    job_id: Option<i64>,
    endpoint: String,
    request: Json<Value>,
    response: Option<Json<Value>>,
    success: bool,
    error: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl From<RemoteCallRow> for StoredRemoteCall {
    fn from(row: RemoteCallRow) -> Self {
        Self {
            id: row.id,
            record: RemoteCallRecord {
                history_job: row.job_id.map(HistoryJobId),
                endpoint: row.endpoint,
                request: row.request.0,
                response: row.response.map(|json| json.0),
                success: row.success,
                error: row.error,
            },
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Opens (creating if needed) the database at `database_url` and ensures the
    /// schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        debug!(database_url = %database_url, "History store connected");
        Ok(store)
    }

    pub async fn from_config(config: &HistoryConfig) -> Result<Self> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    /// Wraps an existing pool. The schema is created if missing.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_SYNC_JOBS, CREATE_REMOTE_CALLS, CREATE_REMOTE_CALLS_INDEX] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn begin_job(
        &self,
        job_type: &str,
        endpoint: &str,
        request: &Value,
    ) -> Result<HistoryJobId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sync_jobs (job_type, endpoint, request, started_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(job_type)
        .bind(endpoint)
        .bind(Json(request))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(HistoryJobId(id))
    }

    async fn complete_job(
        &self,
        id: HistoryJobId,
        success: bool,
        duration: Duration,
        outcome: &Value,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sync_jobs SET success = ?, duration_ms = ?, outcome = ?, completed_at = ? WHERE id = ?",
        )
        .bind(success)
        .bind(duration_millis(duration))
        .bind(Json(outcome))
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_remote_call(&self, record: &RemoteCallRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO remote_calls (job_id, endpoint, request, response, success, error, recorded_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.history_job.map(|id| id.0))
        .bind(&record.endpoint)
        .bind(Json(&record.request))
        .bind(record.response.as_ref().map(Json))
        .bind(record.success)
        .bind(record.error.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<HistoryJob>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<SyncJobRow> = sqlx::query_as(
            "SELECT id, job_type, endpoint, request, success, duration_ms, outcome, started_at, completed_at FROM sync_jobs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryJob::from).collect())
    }

    async fn remote_calls(&self, id: HistoryJobId) -> Result<Vec<StoredRemoteCall>> {
        let rows: Vec<RemoteCallRow> = sqlx::query_as(
            "SELECT id, job_id, endpoint, request, response, success, error, recorded_at FROM remote_calls WHERE job_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredRemoteCall::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_store() -> SqliteHistoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteHistoryStore::with_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn open_jobs_have_no_outcome() {
        let store = memory_store().await;
        let id = store
            .begin_job("product_sync", "create_product", &json!({"sku": "A1"}))
            .await
            .unwrap();

        let jobs = store.recent_jobs(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].request, json!({"sku": "A1"}));
        assert!(jobs[0].success.is_none());
        assert!(jobs[0].completed_at.is_none());
    }

    #[tokio::test]
    async fn unlinked_calls_are_not_listed_under_jobs() {
        let store = memory_store().await;
        let id = store
            .begin_job("customer_sync", "create_customer", &json!({}))
            .await
            .unwrap();
        store
            .append_remote_call(&RemoteCallRecord {
                history_job: None,
                endpoint: "create_customer".to_string(),
                request: json!({}),
                response: None,
                success: false,
                error: Some("timeout".to_string()),
            })
            .await
            .unwrap();

        assert!(store.remote_calls(id).await.unwrap().is_empty());
    }
}
