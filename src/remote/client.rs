use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Transport-level failures reported by a [`RemoteApiClient`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request cancelled")]
    Cancelled,
}

/// POSTs a JSON body and returns the JSON response, authenticating transparently.
///
/// Implementations must fail on non-2xx responses and should stop waiting once
/// `cancellation` fires. A 2xx body carrying `"success": false` is returned as
/// `Ok`; the orchestrators treat it as a business failure.
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: &Value,
        cancellation: &CancellationToken,
    ) -> Result<Value, RemoteError>;
}
