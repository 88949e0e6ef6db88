//! Error types for the synchronization core.
//!

use thiserror::Error;

/// Errors raised by orchestration, the job queue and their collaborators.
///
/// Payloads are plain strings so results can be cloned into job records and
/// compared in tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{operation} failed: {message}")]
    RemoteCall { operation: String, message: String },
    #[error("{operation} rejected by remote: {message}")]
    RemoteRejected { operation: String, message: String },
    #[error("{operation} returned no usable id: {message}")]
    MissingRemoteId { operation: String, message: String },
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Endpoint resolution error: {0}")]
    EndpointResolution(String),
    #[error("History store error: {0}")]
    History(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for errors reported by the remote service itself (as opposed to local
    /// validation or cancellation).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteCall { .. } | Self::RemoteRejected { .. } | Self::MissingRemoteId { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(error: sqlx::Error) -> Self {
        SyncError::History(error.to_string())
    }
}

impl From<crate::config::ConfigurationError> for SyncError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        SyncError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_classified() {
        let err = SyncError::RemoteRejected {
            operation: "save_product".to_string(),
            message: "SKU locked".to_string(),
        };
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "save_product rejected by remote: SKU locked");
        assert!(!SyncError::validation("missing sku").is_remote());
    }
}
