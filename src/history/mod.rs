//! # Sync History
//!
//! Append-only log of synchronization job attempts and the remote calls made
//! during each attempt, kept for inspection and replay.
//!
//! Orchestrators never talk to a [`HistoryStore`] directly. They go through
//! [`HistoryRecorder`], which queues writes for a background writer, bounds each
//! one with a timeout and swallows failures. Bookkeeping never delays or changes
//! a synchronization outcome.

pub mod memory;
pub mod recorder;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub use memory::InMemoryHistoryStore;
pub use recorder::{HistoryRecorder, HistoryTicket};
pub use sqlite::SqliteHistoryStore;

/// Handle of a job row opened with [`HistoryStore::begin_job`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryJobId(pub i64);

impl fmt::Display for HistoryJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A job attempt as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryJob {
    pub id: HistoryJobId,
    pub job_type: String,
    pub endpoint: String,
    pub request: Value,
    /// `None` while the job is still open
    pub success: Option<bool>,
    pub duration_ms: Option<i64>,
    pub outcome: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One remote call, linked to the job attempt that issued it when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCallRecord {
    pub history_job: Option<HistoryJobId>,
    pub endpoint: String,
    pub request: Value,
    pub response: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
}

/// A remote call as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRemoteCall {
    pub id: i64,
    #[serde(flatten)]
    pub record: RemoteCallRecord,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn begin_job(&self, job_type: &str, endpoint: &str, request: &Value)
        -> Result<HistoryJobId>;

    async fn complete_job(
        &self,
        id: HistoryJobId,
        success: bool,
        duration: Duration,
        outcome: &Value,
    ) -> Result<()>;

    async fn append_remote_call(&self, record: &RemoteCallRecord) -> Result<()>;

    /// Most recent job attempts first.
    async fn recent_jobs(&self, limit: usize) -> Result<Vec<HistoryJob>>;

    /// Remote calls of one job attempt in the order they were made.
    async fn remote_calls(&self, id: HistoryJobId) -> Result<Vec<StoredRemoteCall>>;
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
