//! Scripted stand-in for the remote catalog service.
//!
//! Every call is recorded, then answered by a handler closure. An optional delay
//! keeps calls in flight long enough to observe concurrency; the delay honors
//! the caller's cancellation token.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::remote::{RemoteApiClient, RemoteError};

type Handler = dyn Fn(&str, &Value) -> Result<Value, RemoteError> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub body: Value,
}

pub struct ScriptedRemoteClient {
    handler: Box<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl std::fmt::Debug for ScriptedRemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRemoteClient")
            .field("delay", &self.delay)
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl ScriptedRemoteClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls whose URL ends with `suffix`.
    pub fn count_calls_to(&self, suffix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.url.ends_with(suffix))
            .count()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApiClient for ScriptedRemoteClient {
    async fn post(
        &self,
        url: &str,
        body: &Value,
        cancellation: &CancellationToken,
    ) -> Result<Value, RemoteError> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            body: body.clone(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let interrupted = match self.delay {
            Some(delay) => tokio::select! {
                _ = cancellation.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            },
            None => false,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if interrupted {
            return Err(RemoteError::Cancelled);
        }
        (self.handler)(url, body)
    }
}

/// Successful product upsert response.
pub fn product_response(id: i64) -> Value {
    json!({ "success": true, "product": { "id": id } })
}

/// Successful customer or address response.
pub fn data_response(id: i64) -> Value {
    json!({ "success": true, "data": { "id": id } })
}
