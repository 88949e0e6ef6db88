//! # Bounded Job Queue
//!
//! Admits long-running synchronization jobs, runs at most
//! `max_concurrent_jobs` of them at once and keeps a per-job status record.
//!
//! ## Architecture
//!
//! - **Admission**: `enqueue` records the job as `Queued` and hands the work to a
//!   single dispatcher task over an unbounded channel, so permits are granted in
//!   admission order.
//! - **Execution**: each job runs in its own task while holding a semaphore
//!   permit, under a hard timeout. On timeout the job's cancellation token fires
//!   and the work future is dropped.
//! - **Retention**: finished jobs stay visible for `retention`, measured with the
//!   injected [`Clock`], then disappear. Expired records are dropped lazily on
//!   reads and periodically by a reaper task.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use erp_sync_core::queue::{BoundedJobQueue, JobQueueSettings, OperationKind};
//!
//! # async fn example() {
//! let queue = BoundedJobQueue::new(JobQueueSettings::default());
//! let job_id = queue.enqueue("A1", OperationKind::Full, |ctx| async move {
//!     ctx.log_remote_call("create_product", true, None);
//!     Ok(())
//! });
//! let job = queue.get_job(&job_id);
//! # }
//! ```

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::context::{JobContext, JobLogSink};
use super::job::{Job, JobFailure, JobId, JobLogEntry, JobStatus, OperationKind};
use crate::config::QueueConfig;
use crate::error::Result;
use crate::log_job;

type BoxedWork = Box<dyn FnOnce(JobContext) -> BoxFuture<'static, Result<()>> + Send>;

/// Runtime limits for a [`BoundedJobQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueueSettings {
    pub max_concurrent_jobs: usize,
    pub job_timeout: Duration,
    pub retention: Duration,
    pub reaper_interval: Duration,
}

impl Default for JobQueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for JobQueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            job_timeout: config.job_timeout(),
            retention: config.retention(),
            reaper_interval: config.reaper_interval(),
        }
    }
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-memory job records. Shared by the queue handle, the dispatcher and every
/// running job (as its log sink).
struct JobTable {
    jobs: DashMap<JobId, Job>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    next_sequence: AtomicU64,
}

impl JobTable {
    fn admit(&self, sku: String, kind: OperationKind) -> JobId {
        let id = JobId::new();
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .insert(id, Job::queued(id, sku, kind, sequence, self.clock.now()));
        id
    }

    fn mark_running(&self, id: &JobId) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Running;
                job.started_at = Some(self.clock.now());
            }
        }
    }

    fn finish(&self, id: &JobId, failure: Option<(JobFailure, String)>) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.status.is_terminal() {
                return;
            }
            job.completed_at = Some(self.clock.now());
            match failure {
                None => job.status = JobStatus::Completed,
                Some((kind, message)) => {
                    job.status = JobStatus::Failed;
                    job.failure = Some(kind);
                    job.error = Some(message);
                }
            }
        }
    }

    fn is_expired(&self, job: &Job, now: chrono::DateTime<chrono::Utc>) -> bool {
        job.status.is_terminal()
            && job
                .completed_at
                .map(|completed| now - completed >= self.retention)
                .unwrap_or(false)
    }

    fn get(&self, id: &JobId) -> Option<Job> {
        let now = self.clock.now();
        let snapshot = self.jobs.get(id).map(|job| job.clone())?;
        if self.is_expired(&snapshot, now) {
            self.jobs.remove_if(id, |_, job| self.is_expired(job, now));
            return None;
        }
        Some(snapshot)
    }

    fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !self.is_expired(job, now));
        before.saturating_sub(self.jobs.len())
    }
}

impl JobLogSink for JobTable {
    fn append_log(&self, job_id: &JobId, endpoint: &str, success: bool, error: Option<&str>) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.log.push(JobLogEntry {
                endpoint: endpoint.to_string(),
                success,
                error: error.map(str::to_string),
                timestamp: self.clock.now(),
            });
        }
    }
}

struct Submission {
    job_id: JobId,
    work: BoxedWork,
}

struct QueueInner {
    table: Arc<JobTable>,
    submissions: mpsc::UnboundedSender<Submission>,
    shutdown: CancellationToken,
    settings: JobQueueSettings,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Bounded, FIFO job queue with per-job status tracking. Cheap to clone.
///
/// Must be created inside a Tokio runtime: construction spawns the dispatcher
/// and the retention reaper.
#[derive(Clone)]
pub struct BoundedJobQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for BoundedJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedJobQueue")
            .field("settings", &self.inner.settings)
            .field("jobs", &self.inner.table.jobs.len())
            .finish()
    }
}

impl BoundedJobQueue {
    pub fn new(settings: JobQueueSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: JobQueueSettings, clock: Arc<dyn Clock>) -> Self {
        let retention =
            chrono::Duration::from_std(settings.retention).unwrap_or(chrono::Duration::MAX);
        let table = Arc::new(JobTable {
            jobs: DashMap::new(),
            clock,
            retention,
            next_sequence: AtomicU64::new(0),
        });
        let shutdown = CancellationToken::new();
        let (submissions, receiver) = mpsc::unbounded_channel();

        tokio::spawn(dispatch(
            receiver,
            Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            Arc::clone(&table),
            settings.job_timeout,
            shutdown.clone(),
        ));
        tokio::spawn(reap(
            Arc::clone(&table),
            settings.reaper_interval,
            shutdown.clone(),
        ));

        log_job!(info, "QUEUE_STARTED",
            max_concurrent_jobs: settings.max_concurrent_jobs,
            job_timeout_secs: settings.job_timeout.as_secs(),
            retention_secs: settings.retention.as_secs()
        );

        Self {
            inner: Arc::new(QueueInner {
                table,
                submissions,
                shutdown,
                settings,
            }),
        }
    }

    /// Admits `work` and returns immediately. The work starts once a slot is free
    /// and receives a [`JobContext`] bound to this job.
    pub fn enqueue<F, Fut>(&self, sku: impl Into<String>, kind: OperationKind, work: F) -> JobId
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let sku = sku.into();
        let job_id = self.inner.table.admit(sku.clone(), kind);
        let work: BoxedWork = Box::new(move |ctx| work(ctx).boxed());

        log_job!(debug, "ENQUEUED", job_id: job_id, sku: sku, kind: kind);

        if self
            .inner
            .submissions
            .send(Submission { job_id, work })
            .is_err()
        {
            self.inner.table.finish(
                &job_id,
                Some((JobFailure::Aborted, "job queue is shut down".to_string())),
            );
        }
        job_id
    }

    /// Snapshot of a job, or `None` once it has been evicted after retention.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.inner.table.get(id)
    }

    /// All retained jobs in admission order.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.inner.table.evict_expired();
        let mut jobs: Vec<Job> = self
            .inner
            .table
            .jobs
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.sequence);
        jobs
    }

    /// Attaches a progress line to a job. Unknown or evicted ids are ignored.
    pub fn append_log(&self, id: &JobId, endpoint: &str, success: bool, error: Option<&str>) {
        self.inner.table.append_log(id, endpoint, success, error);
    }

    /// Drops finished jobs whose retention has elapsed; returns how many.
    pub fn evict_expired(&self) -> usize {
        self.inner.table.evict_expired()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for entry in self.inner.table.jobs.iter() {
            match entry.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn settings(&self) -> &JobQueueSettings {
        &self.inner.settings
    }

    /// Polls until the job reaches a terminal state. Returns `None` if the job is
    /// unknown or was evicted while waiting.
    pub async fn wait_for(&self, id: &JobId, poll_interval: Duration) -> Option<Job> {
        loop {
            let job = self.get_job(id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stops admitting work. Jobs still waiting for a slot fail as aborted and
    /// running jobs see their cancellation token fire.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<Submission>,
    semaphore: Arc<Semaphore>,
    table: Arc<JobTable>,
    job_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let submission = tokio::select! {
            _ = shutdown.cancelled() => break,
            submission = receiver.recv() => match submission {
                Some(submission) => submission,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => {
                abort(&table, &submission.job_id);
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    abort(&table, &submission.job_id);
                    break;
                }
            },
        };

        tokio::spawn(run_job(
            Arc::clone(&table),
            submission,
            permit,
            job_timeout,
            shutdown.child_token(),
        ));
    }

    receiver.close();
    while let Ok(submission) = receiver.try_recv() {
        abort(&table, &submission.job_id);
    }
    debug!("Job queue dispatcher stopped");
}

fn abort(table: &JobTable, job_id: &JobId) {
    table.finish(
        job_id,
        Some((
            JobFailure::Aborted,
            "job queue shut down before the job started".to_string(),
        )),
    );
}

async fn run_job(
    table: Arc<JobTable>,
    submission: Submission,
    permit: OwnedSemaphorePermit,
    job_timeout: Duration,
    cancellation: CancellationToken,
) {
    let Submission { job_id, work } = submission;
    let sink: Arc<dyn JobLogSink> = Arc::clone(&table) as Arc<dyn JobLogSink>;
    let ctx = JobContext::for_job(job_id, cancellation.clone(), sink);

    table.mark_running(&job_id);
    log_job!(debug, "STARTED", job_id: job_id, timeout_secs: job_timeout.as_secs());

    let execution = AssertUnwindSafe(async move { work(ctx).await }).catch_unwind();
    let failure = match tokio::time::timeout(job_timeout, execution).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(error))) => Some((JobFailure::Error, error.to_string())),
        Ok(Err(_panic)) => Some((JobFailure::Panicked, "job panicked".to_string())),
        Err(_elapsed) => {
            cancellation.cancel();
            Some((
                JobFailure::TimedOut,
                format!("job timed out after {}s", job_timeout.as_secs_f64()),
            ))
        }
    };

    match &failure {
        None => {
            log_job!(info, "COMPLETED", job_id: job_id,);
        }
        Some((kind, message)) => {
            log_job!(warn, "FAILED", job_id: job_id, failure: kind, error: message);
        }
    }
    table.finish(&job_id, failure);
    drop(permit);
}

async fn reap(table: Arc<JobTable>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = table.evict_expired();
                if evicted > 0 {
                    debug!(evicted = evicted, "Evicted expired jobs");
                }
            }
        }
    }
    if !shutdown.is_cancelled() {
        warn!("Job reaper stopped unexpectedly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::queue::ManualClock;

    fn fast_settings() -> JobQueueSettings {
        JobQueueSettings {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(5),
            retention: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn successful_job_completes_with_log() {
        let queue = BoundedJobQueue::new(fast_settings());
        let id = queue.enqueue("A1", OperationKind::Create, |ctx| async move {
            ctx.log_remote_call("create_product", true, None);
            Ok(())
        });

        let job = queue.wait_for(&id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.sku, "A1");
        assert_eq!(job.log.len(), 1);
        assert_eq!(job.log[0].endpoint, "create_product");
        assert!(job.started_at.is_some() && job.completed_at.is_some());
        assert!(job.failure.is_none());
    }

    #[tokio::test]
    async fn failing_job_records_error() {
        let queue = BoundedJobQueue::new(fast_settings());
        let id = queue.enqueue("A2", OperationKind::Save, |_ctx| async move {
            Err(SyncError::validation("no sku"))
        });

        let job = queue.wait_for(&id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure, Some(JobFailure::Error));
        assert_eq!(job.error.as_deref(), Some("Validation error: no sku"));
    }

    #[tokio::test]
    async fn panicking_job_is_marked_failed() {
        let queue = BoundedJobQueue::new(fast_settings());
        let id = queue.enqueue("A3", OperationKind::Full, |_ctx| async move {
            if true {
                panic!("work blew up");
            }
            Ok(())
        });

        let job = queue.wait_for(&id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.failure, Some(JobFailure::Panicked));
    }

    #[tokio::test]
    async fn lists_jobs_in_admission_order() {
        let queue = BoundedJobQueue::new(fast_settings());
        let ids: Vec<JobId> = (0..4)
            .map(|i| {
                queue.enqueue(format!("SKU-{i}"), OperationKind::Full, |_ctx| async { Ok(()) })
            })
            .collect();

        let listed: Vec<JobId> = queue.list_jobs().into_iter().map(|job| job.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn append_log_ignores_unknown_jobs() {
        let queue = BoundedJobQueue::new(fast_settings());
        queue.append_log(&JobId::new(), "create_product", true, None);
        assert!(queue.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn expired_jobs_are_evicted_on_read() {
        let clock = Arc::new(ManualClock::default());
        let queue = BoundedJobQueue::with_clock(fast_settings(), clock.clone());
        let id = queue.enqueue("A4", OperationKind::Create, |_ctx| async { Ok(()) });
        queue.wait_for(&id, Duration::from_millis(5)).await.unwrap();

        clock.advance(Duration::from_secs(299));
        assert!(queue.get_job(&id).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(queue.get_job(&id).is_none());
        assert!(queue.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn shutdown_aborts_waiting_jobs() {
        let queue = BoundedJobQueue::new(JobQueueSettings {
            max_concurrent_jobs: 1,
            ..fast_settings()
        });
        let blocker = queue.enqueue("BLOCK", OperationKind::Full, |ctx| async move {
            ctx.cancellation().cancelled().await;
            Err(SyncError::Cancelled("shutdown".to_string()))
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let waiting = queue.enqueue("WAIT", OperationKind::Full, |_ctx| async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.shutdown();

        let waiting = queue.wait_for(&waiting, Duration::from_millis(5)).await.unwrap();
        assert_eq!(waiting.failure, Some(JobFailure::Aborted));
        let blocker = queue.wait_for(&blocker, Duration::from_millis(5)).await.unwrap();
        assert_eq!(blocker.status, JobStatus::Failed);
        assert_eq!(blocker.failure, Some(JobFailure::Error));
    }
}
