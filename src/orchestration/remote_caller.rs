//! # Remote Caller
//!
//! The single step every orchestrator is built from: post a typed payload,
//! check the body for a business failure, extract the id, and record the call on
//! the owning job and in history.

use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::history::{HistoryRecorder, HistoryTicket, RemoteCallRecord};
use crate::log_sync;
use crate::queue::JobContext;
use crate::remote::response::{display_message, ensure_success};
use crate::remote::{RemoteApiClient, RemoteError, RemotePayload};

/// Extracts the remote id from a successful response.
pub type IdExtractor = fn(&Value) -> Option<i64>;

#[derive(Clone)]
pub struct RemoteCaller {
    client: Arc<dyn RemoteApiClient>,
    history: HistoryRecorder,
}

impl std::fmt::Debug for RemoteCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCaller")
            .field("history", &self.history)
            .finish()
    }
}

impl RemoteCaller {
    pub fn new(client: Arc<dyn RemoteApiClient>, history: HistoryRecorder) -> Self {
        Self { client, history }
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    /// Posts `payload` and returns the response body once the remote service has
    /// accepted it.
    pub async fn send<P>(
        &self,
        ctx: &JobContext,
        operation: &str,
        url: &str,
        payload: &P,
    ) -> Result<Value>
    where
        P: RemotePayload + Sync,
    {
        let body = payload.to_body()?;
        self.call(ctx, operation, url, &body).await
    }

    /// Posts `payload` and extracts the remote id of the created or saved entity.
    pub async fn upsert<P>(
        &self,
        ctx: &JobContext,
        operation: &str,
        url: &str,
        payload: &P,
        extract_id: IdExtractor,
    ) -> Result<i64>
    where
        P: RemotePayload + Sync,
    {
        let response = self.send(ctx, operation, url, payload).await?;
        extract_id(&response).ok_or_else(|| SyncError::MissingRemoteId {
            operation: operation.to_string(),
            message: display_message(&response)
                .unwrap_or_else(|| "response contained no id".to_string()),
        })
    }

    /// Posts a raw body. Aborts with [`SyncError::Cancelled`] when the context is
    /// cancelled before or during the call.
    pub async fn call(
        &self,
        ctx: &JobContext,
        operation: &str,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        if ctx.is_cancelled() {
            return Err(SyncError::Cancelled(format!("{operation} not started")));
        }

        let started = Instant::now();
        let outcome = tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(RemoteError::Cancelled),
            response = self.client.post(url, body, ctx.cancellation()) => response,
        };

        let (result, response) = match outcome {
            Ok(response) => (ensure_success(operation, &response), Some(response)),
            Err(RemoteError::Cancelled) => (
                Err(SyncError::Cancelled(format!("{operation} interrupted"))),
                None,
            ),
            Err(error) => (
                Err(SyncError::RemoteCall {
                    operation: operation.to_string(),
                    message: error.to_string(),
                }),
                None,
            ),
        };

        let error = result.as_ref().err().map(ToString::to_string);
        ctx.log_remote_call(operation, result.is_ok(), error.as_deref());
        self.history.append_remote_call(
            ctx.history_job(),
            RemoteCallRecord {
                history_job: None,
                endpoint: operation.to_string(),
                request: body.clone(),
                response: response.clone(),
                success: result.is_ok(),
                error,
            },
        );

        debug!(
            operation = %operation,
            url = %url,
            success = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Remote call finished"
        );

        result?;
        Ok(response.unwrap_or(Value::Null))
    }

    /// Runs `work` inside a history job: opens it, hands `work` a context tagged
    /// with its id, and completes it with the serialized outcome. A run dropped
    /// before it finishes (queue timeout, caller gone) completes the job as
    /// failed.
    pub async fn tracked<T, F, Fut>(
        &self,
        ctx: &JobContext,
        job_type: &str,
        endpoint: &str,
        request: &Value,
        work: F,
    ) -> Result<T>
    where
        T: Serialize,
        F: FnOnce(JobContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let open = OpenHistoryJob {
            history: &self.history,
            ticket: self.history.begin_job(job_type, endpoint, request),
            started: Instant::now(),
            job_type,
            endpoint,
            finished: false,
        };
        let result = work(ctx.with_history_job(open.ticket)).await;

        let (success, outcome) = match &result {
            Ok(value) => (
                true,
                serde_json::to_value(value).unwrap_or_else(|e| json!({ "serializationError": e.to_string() })),
            ),
            Err(error) => (false, json!({ "error": error.to_string() })),
        };
        open.finish(success, outcome);

        if let Err(error) = &result {
            log_sync!(warn, job_type, endpoint: endpoint, error: error.to_string());
        }
        result
    }
}

/// History job opened by [`RemoteCaller::tracked`]. Completes the row as failed
/// when dropped without [`OpenHistoryJob::finish`].
struct OpenHistoryJob<'a> {
    history: &'a HistoryRecorder,
    ticket: Option<HistoryTicket>,
    started: Instant,
    job_type: &'a str,
    endpoint: &'a str,
    finished: bool,
}

impl OpenHistoryJob<'_> {
    fn finish(mut self, success: bool, outcome: Value) {
        self.finished = true;
        self.history
            .complete_job(self.ticket, success, self.started.elapsed(), outcome);
    }
}

impl Drop for OpenHistoryJob<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log_sync!(warn, self.job_type, endpoint: self.endpoint, error: ABANDONED_RUN);
        self.history.complete_job(
            self.ticket,
            false,
            self.started.elapsed(),
            json!({ "error": ABANDONED_RUN }),
        );
    }
}

const ABANDONED_RUN: &str = "run abandoned before completion";
