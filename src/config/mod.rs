//! # Sync Configuration
//!
//! Settings for the remote catalog endpoints, the job queue, bulk inventory
//! adjustment and the history store. Values are layered by [`ConfigManager`]:
//! built-in defaults, then `config/erp-sync.toml`, then
//! `config/erp-sync.{environment}.toml`, then `ERP_SYNC_*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use erp_sync_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let limit = manager.config().queue.max_concurrent_jobs;
//! let timeout = manager.config().queue.job_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::limits;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/erp-sync.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote catalog service location and operation paths
    pub remote: RemoteConfig,

    /// Bounded job queue limits
    pub queue: QueueConfig,

    /// Bulk inventory adjustment fan-out
    pub inventory: InventoryConfig,

    /// Job and remote-call history persistence
    pub history: HistoryConfig,
}

impl SyncConfig {
    /// Rejects values that would stall or disable the system.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "base_url",
                "remote",
            ));
        }
        if self.queue.max_concurrent_jobs == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.max_concurrent_jobs",
                0,
                "at least one job must be able to run",
            ));
        }
        if self.queue.job_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.job_timeout_seconds",
                0,
                "timeout must be positive",
            ));
        }
        if self.queue.reaper_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.reaper_interval_seconds",
                0,
                "reaper interval must be positive",
            ));
        }
        if self.inventory.max_concurrent_calls == 0 {
            return Err(ConfigurationError::invalid_value(
                "inventory.max_concurrent_calls",
                0,
                "at least one inventory call must be able to run",
            ));
        }
        if self.history.database_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database_url",
                "history",
            ));
        }
        if self.history.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "history.max_connections",
                0,
                "pool needs at least one connection",
            ));
        }
        if self.history.backlog == 0 {
            return Err(ConfigurationError::invalid_value(
                "history.backlog",
                0,
                "backlog must hold at least one write",
            ));
        }
        Ok(())
    }
}

/// Remote catalog service settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// OAuth client credentials handed to the transport
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub paths: EndpointPaths,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            request_timeout_ms: 30_000,
            client_id: None,
            client_secret: None,
            paths: EndpointPaths::default(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Operation paths relative to `base_url` (absolute URLs are used as-is)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub create_product: String,
    pub save_product: String,
    pub create_inventory: String,
    pub create_relation: String,
    pub create_customer: String,
    pub create_address: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            create_product: "products/create".to_string(),
            save_product: "products/save".to_string(),
            create_inventory: "inventory/create".to_string(),
            create_relation: "products/relations/create".to_string(),
            create_customer: "customers/create".to_string(),
            create_address: "customers/addresses/create".to_string(),
        }
    }
}

/// Bounded job queue settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout_seconds: u64,
    pub retention_seconds: u64,
    pub reaper_interval_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: limits::MAX_CONCURRENT_JOBS,
            job_timeout_seconds: limits::JOB_TIMEOUT_SECONDS,
            retention_seconds: limits::JOB_RETENTION_SECONDS,
            reaper_interval_seconds: limits::REAPER_INTERVAL_SECONDS,
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub max_concurrent_calls: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: limits::MAX_CONCURRENT_INVENTORY_CALLS,
        }
    }
}

/// History store settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub write_timeout_ms: u64,
    /// Writes allowed to wait for the store before new ones are dropped
    pub backlog: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://erp_sync_history.db".to_string(),
            max_connections: 4,
            write_timeout_ms: limits::HISTORY_WRITE_TIMEOUT_MS,
            backlog: limits::HISTORY_BACKLOG,
        }
    }
}

impl HistoryConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
