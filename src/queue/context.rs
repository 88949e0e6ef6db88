//! Explicit execution context
//!
//! Every function that may issue a remote call or attach a log line receives a
//! [`JobContext`]. It carries the owning queue job (if any), the cancellation
//! token the remote calls must honor, and the open history job of the current
//! orchestration run. Nothing here is stored in thread- or task-local state.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::job::JobId;
use crate::history::HistoryTicket;

/// Receives progress lines for a queued job.
pub trait JobLogSink: Send + Sync {
    fn append_log(&self, job_id: &JobId, endpoint: &str, success: bool, error: Option<&str>);
}

#[derive(Clone)]
pub struct JobContext {
    job_id: Option<JobId>,
    cancellation: CancellationToken,
    log_sink: Option<Arc<dyn JobLogSink>>,
    history_job: Option<HistoryTicket>,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("history_job", &self.history_job)
            .finish()
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::detached()
    }
}

impl JobContext {
    /// Context for work that does not belong to a queued job.
    pub fn detached() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Detached context bound to a caller-owned cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            job_id: None,
            cancellation,
            log_sink: None,
            history_job: None,
        }
    }

    pub(crate) fn for_job(
        job_id: JobId,
        cancellation: CancellationToken,
        log_sink: Arc<dyn JobLogSink>,
    ) -> Self {
        Self {
            job_id: Some(job_id),
            cancellation,
            log_sink: Some(log_sink),
            history_job: None,
        }
    }

    /// Same context, tagged with the history job opened for the current run.
    pub fn with_history_job(&self, history_job: Option<HistoryTicket>) -> Self {
        Self {
            history_job,
            ..self.clone()
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn history_job(&self) -> Option<HistoryTicket> {
        self.history_job
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Attaches a progress line to the owning job. No-op for detached contexts.
    pub fn log_remote_call(&self, endpoint: &str, success: bool, error: Option<&str>) {
        if let (Some(job_id), Some(sink)) = (&self.job_id, &self.log_sink) {
            sink.append_log(job_id, endpoint, success, error);
        }
    }
}
