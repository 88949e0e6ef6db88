use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

use super::{
    duration_millis, HistoryJob, HistoryJobId, HistoryStore, RemoteCallRecord, StoredRemoteCall,
};
use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
struct Tables {
    jobs: Vec<HistoryJob>,
    calls: Vec<StoredRemoteCall>,
}

/// Process-local history store. Useful for tests and for running without a
/// database.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every remote call recorded so far, linked or not.
    pub fn all_remote_calls(&self) -> Vec<StoredRemoteCall> {
        self.tables.lock().calls.clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn begin_job(
        &self,
        job_type: &str,
        endpoint: &str,
        request: &Value,
    ) -> Result<HistoryJobId> {
        let mut tables = self.tables.lock();
        let id = HistoryJobId(tables.jobs.len() as i64 + 1);
        tables.jobs.push(HistoryJob {
            id,
            job_type: job_type.to_string(),
            endpoint: endpoint.to_string(),
            request: request.clone(),
            success: None,
            duration_ms: None,
            outcome: None,
            started_at: Utc::now(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn complete_job(
        &self,
        id: HistoryJobId,
        success: bool,
        duration: Duration,
        outcome: &Value,
    ) -> Result<()> {
        let mut tables = self.tables.lock();
        let job = tables
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| SyncError::History(format!("unknown history job {id}")))?;
        job.success = Some(success);
        job.duration_ms = Some(duration_millis(duration));
        job.outcome = Some(outcome.clone());
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn append_remote_call(&self, record: &RemoteCallRecord) -> Result<()> {
        let mut tables = self.tables.lock();
        let id = tables.calls.len() as i64 + 1;
        tables.calls.push(StoredRemoteCall {
            id,
            record: record.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<HistoryJob>> {
        Ok(self
            .tables
            .lock()
            .jobs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn remote_calls(&self, id: HistoryJobId) -> Result<Vec<StoredRemoteCall>> {
        Ok(self
            .tables
            .lock()
            .calls
            .iter()
            .filter(|call| call.record.history_job == Some(id))
            .cloned()
            .collect())
    }
}
