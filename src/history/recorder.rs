//! Fire-and-forget front for a [`HistoryStore`].
//!
//! Writes are queued on a bounded channel and applied in submission order by a
//! single writer task, so callers never wait on the store. Job rows are
//! addressed by a [`HistoryTicket`] handed out immediately; the writer maps it to
//! the store's [`HistoryJobId`] once `begin_job` has gone through.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{HistoryJobId, HistoryStore, RemoteCallRecord};
use crate::constants::limits;
use crate::error::Result;

/// Recorder-side handle of a job row. Valid only for the recorder that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryTicket(pub(crate) u64);

impl fmt::Display for HistoryTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

enum HistoryWrite {
    Begin {
        ticket: HistoryTicket,
        job_type: String,
        endpoint: String,
        request: Value,
    },
    Complete {
        ticket: HistoryTicket,
        success: bool,
        duration: Duration,
        outcome: Value,
    },
    Call {
        ticket: Option<HistoryTicket>,
        record: RemoteCallRecord,
    },
    Flush(oneshot::Sender<()>),
}

struct RecorderInner {
    store: Arc<dyn HistoryStore>,
    write_timeout: Duration,
    capacity: usize,
    next_ticket: AtomicU64,
    sender: OnceLock<mpsc::Sender<HistoryWrite>>,
}

impl RecorderInner {
    fn new(store: Arc<dyn HistoryStore>, write_timeout: Duration, capacity: usize) -> Self {
        Self {
            store,
            write_timeout,
            capacity: capacity.max(1),
            next_ticket: AtomicU64::new(1),
            sender: OnceLock::new(),
        }
    }

    /// Starts the writer on first use. Outside a Tokio runtime there is nothing
    /// to run it on and writes are dropped.
    fn sender(&self) -> Option<&mpsc::Sender<HistoryWrite>> {
        if let Some(sender) = self.sender.get() {
            return Some(sender);
        }
        let handle = Handle::try_current().ok()?;
        Some(self.sender.get_or_init(|| {
            let (sender, receiver) = mpsc::channel(self.capacity);
            handle.spawn(run_writer(
                Arc::clone(&self.store),
                receiver,
                self.write_timeout,
            ));
            sender
        }))
    }
}

/// Writes to an optional history store without blocking the caller. Every write
/// is bounded by `write_timeout`; failures, timeouts and writes that find the
/// backlog full are logged at `warn` and dropped.
#[derive(Clone, Default)]
pub struct HistoryRecorder {
    inner: Option<Arc<RecorderInner>>,
}

impl fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryRecorder")
            .field("enabled", &self.inner.is_some())
            .field("write_timeout", &self.inner.as_ref().map(|i| i.write_timeout))
            .finish()
    }
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            inner: Some(Arc::new(RecorderInner::new(
                store,
                Duration::from_millis(limits::HISTORY_WRITE_TIMEOUT_MS),
                limits::HISTORY_BACKLOG,
            ))),
        }
    }

    /// Recorder that drops everything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Must be applied before the first write.
    pub fn with_write_timeout(self, write_timeout: Duration) -> Self {
        self.rebuild(|inner| (write_timeout, inner.capacity))
    }

    /// Number of writes that may wait for the store before new ones are dropped.
    /// Must be applied before the first write.
    pub fn with_backlog(self, capacity: usize) -> Self {
        self.rebuild(|inner| (inner.write_timeout, capacity))
    }

    fn rebuild(self, settings: impl FnOnce(&RecorderInner) -> (Duration, usize)) -> Self {
        Self {
            inner: self.inner.map(|inner| {
                let (write_timeout, capacity) = settings(&inner);
                Arc::new(RecorderInner::new(
                    Arc::clone(&inner.store),
                    write_timeout,
                    capacity,
                ))
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn store(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.inner.as_ref().map(|inner| &inner.store)
    }

    /// Queues a new job row and returns the ticket later writes refer to it by.
    pub fn begin_job(&self, job_type: &str, endpoint: &str, request: &Value) -> Option<HistoryTicket> {
        let inner = self.inner.as_ref()?;
        let ticket = HistoryTicket(inner.next_ticket.fetch_add(1, Ordering::Relaxed));
        self.submit(HistoryWrite::Begin {
            ticket,
            job_type: job_type.to_string(),
            endpoint: endpoint.to_string(),
            request: request.clone(),
        })
        .then_some(ticket)
    }

    pub fn complete_job(
        &self,
        ticket: Option<HistoryTicket>,
        success: bool,
        duration: Duration,
        outcome: Value,
    ) {
        if let Some(ticket) = ticket {
            self.submit(HistoryWrite::Complete {
                ticket,
                success,
                duration,
                outcome,
            });
        }
    }

    /// Queues a remote call. `record.history_job` is filled in from `ticket`.
    pub fn append_remote_call(&self, ticket: Option<HistoryTicket>, record: RemoteCallRecord) {
        self.submit(HistoryWrite::Call { ticket, record });
    }

    /// Waits until every write queued before this call has been applied or
    /// dropped.
    pub async fn flush(&self) {
        let Some(sender) = self.inner.as_ref().and_then(|inner| inner.sender()) else {
            return;
        };
        let (done, applied) = oneshot::channel();
        if sender.send(HistoryWrite::Flush(done)).await.is_ok() {
            let _ = applied.await;
        }
    }

    fn submit(&self, write: HistoryWrite) -> bool {
        let Some(sender) = self.inner.as_ref().and_then(|inner| inner.sender()) else {
            return false;
        };
        match sender.try_send(write) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("History backlog full, write dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

async fn run_writer(
    store: Arc<dyn HistoryStore>,
    mut receiver: mpsc::Receiver<HistoryWrite>,
    write_timeout: Duration,
) {
    let mut open_jobs: HashMap<HistoryTicket, HistoryJobId> = HashMap::new();

    while let Some(write) = receiver.recv().await {
        match write {
            HistoryWrite::Begin {
                ticket,
                job_type,
                endpoint,
                request,
            } => {
                let begun = guarded(
                    "begin_job",
                    write_timeout,
                    store.begin_job(&job_type, &endpoint, &request),
                )
                .await;
                if let Some(id) = begun {
                    open_jobs.insert(ticket, id);
                }
            }
            HistoryWrite::Complete {
                ticket,
                success,
                duration,
                outcome,
            } => {
                if let Some(id) = open_jobs.remove(&ticket) {
                    guarded(
                        "complete_job",
                        write_timeout,
                        store.complete_job(id, success, duration, &outcome),
                    )
                    .await;
                }
            }
            HistoryWrite::Call { ticket, mut record } => {
                record.history_job = ticket.and_then(|t| open_jobs.get(&t).copied());
                guarded(
                    "append_remote_call",
                    write_timeout,
                    store.append_remote_call(&record),
                )
                .await;
            }
            HistoryWrite::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("History writer stopped");
}

async fn guarded<T>(
    action: &str,
    write_timeout: Duration,
    write: impl Future<Output = Result<T>>,
) -> Option<T> {
    match tokio::time::timeout(write_timeout, write).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            warn!(action = %action, error = %error, "History write failed");
            None
        }
        Err(_) => {
            warn!(
                action = %action,
                timeout_ms = write_timeout.as_millis() as u64,
                "History write timed out"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::history::{HistoryJob, InMemoryHistoryStore, StoredRemoteCall};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Instant;

    struct BrokenStore;

    #[async_trait]
    impl HistoryStore for BrokenStore {
        async fn begin_job(&self, _: &str, _: &str, _: &Value) -> Result<HistoryJobId> {
            Err(SyncError::History("disk full".to_string()))
        }
        async fn complete_job(&self, _: HistoryJobId, _: bool, _: Duration, _: &Value) -> Result<()> {
            Err(SyncError::History("disk full".to_string()))
        }
        async fn append_remote_call(&self, _: &RemoteCallRecord) -> Result<()> {
            std::future::pending().await
        }
        async fn recent_jobs(&self, _: usize) -> Result<Vec<HistoryJob>> {
            Ok(Vec::new())
        }
        async fn remote_calls(&self, _: HistoryJobId) -> Result<Vec<StoredRemoteCall>> {
            Ok(Vec::new())
        }
    }

    fn call(endpoint: &str) -> RemoteCallRecord {
        RemoteCallRecord {
            history_job: None,
            endpoint: endpoint.to_string(),
            request: json!({}),
            response: None,
            success: true,
            error: None,
        }
    }

    #[tokio::test]
    async fn failures_and_stalls_are_swallowed() {
        let recorder = HistoryRecorder::new(Arc::new(BrokenStore))
            .with_write_timeout(Duration::from_millis(20));

        let started = Instant::now();
        let ticket = recorder.begin_job("product_sync", "create_product", &json!({}));
        recorder.append_remote_call(ticket, call("create_product"));
        recorder.complete_job(ticket, true, Duration::ZERO, json!({}));
        assert!(started.elapsed() < Duration::from_millis(20));

        recorder.flush().await;
    }

    #[tokio::test]
    async fn writes_reach_the_store_in_order() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let recorder = HistoryRecorder::new(store.clone());

        let ticket = recorder.begin_job("customer_sync", "create_customer", &json!({"name": "ACME"}));
        recorder.append_remote_call(ticket, call("create_customer"));
        recorder.append_remote_call(ticket, call("create_address"));
        recorder.complete_job(ticket, true, Duration::from_millis(12), json!({"customerId": 1}));
        recorder.flush().await;

        let jobs = store.recent_jobs(1).await.unwrap();
        assert_eq!(jobs[0].success, Some(true));
        assert_eq!(jobs[0].duration_ms, Some(12));

        let endpoints: Vec<_> = store
            .remote_calls(jobs[0].id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.record.endpoint)
            .collect();
        assert_eq!(endpoints, vec!["create_customer", "create_address"]);
    }

    #[tokio::test]
    async fn full_backlog_drops_instead_of_waiting() {
        let recorder = HistoryRecorder::new(Arc::new(BrokenStore))
            .with_write_timeout(Duration::from_secs(60))
            .with_backlog(1);

        let started = Instant::now();
        for _ in 0..10 {
            recorder.append_remote_call(None, call("create_inventory"));
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn disabled_recorder_is_silent() {
        let recorder = HistoryRecorder::disabled();
        assert!(!recorder.is_enabled());
        assert!(recorder.begin_job("x", "y", &json!(null)).is_none());
        recorder.flush().await;
    }
}
