#![allow(clippy::doc_markdown)] // Allow technical terms like SQLite, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ERP Sync Core
//!
//! Synchronization core that pushes products, customers and stock from an
//! order/PIM backend into an ERP through the remote catalog service's JSON API.
//!
//! ## Overview
//!
//! One logical request ("create this product with its variants and stock")
//! becomes an ordered series of remote calls. Each call can fail on its own; the
//! orchestrators decide which failures are fatal (the master product) and which
//! degrade to a partial result (a single variant). Long-running requests go
//! through a bounded job queue that caps concurrency, enforces a hard timeout and
//! keeps per-job logs for a short retention window.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Product, customer and bulk inventory synchronization
//! - [`queue`] - Bounded job queue and the explicit per-run [`queue::JobContext`]
//! - [`remote`] - Remote client seam, endpoint resolution, typed payloads
//! - [`normalization`] - Attribute key normalization
//! - [`history`] - Append-only job and remote-call history (SQLite or in-memory)
//! - [`models`] - Product, customer and result records
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and domain macros
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use erp_sync_core::config::ConfigManager;
//! use erp_sync_core::models::ProductRecord;
//! use erp_sync_core::orchestration::{SyncMode, SyncService};
//! use erp_sync_core::queue::JobContext;
//! use erp_sync_core::remote::RemoteApiClient;
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn RemoteApiClient>) -> Result<(), Box<dyn std::error::Error>> {
//! erp_sync_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let service = SyncService::connect(manager.config(), client).await?;
//!
//! let product = ProductRecord::new("A1")
//!     .with_name("Desk lamp")
//!     .with_variant(ProductRecord::new("A1-RED"));
//! let result = service
//!     .sync_product(&JobContext::detached(), product, SyncMode::Create, false)
//!     .await?;
//! println!("master {} synced, partial: {}", result.master_id, !result.success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code; integration suites under `tests/` drive
//! the orchestrators against [`test_helpers::ScriptedRemoteClient`]:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod normalization;
pub mod orchestration;
pub mod queue;
pub mod remote;
pub mod test_helpers;

pub use config::{ConfigManager, SyncConfig};
pub use error::{Result, SyncError};
pub use history::{HistoryRecorder, HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
pub use models::{
    AddressRecord, CustomerRecord, CustomerSyncResult, InventoryLine, ProductRecord, SyncResult,
    VariantOutcome,
};
pub use orchestration::{
    CustomerSyncOrchestrator, InventoryAdjuster, ProductSyncOrchestrator, SyncMode, SyncService,
};
pub use queue::{BoundedJobQueue, Job, JobContext, JobId, JobStatus, OperationKind};
pub use remote::{CachedEndpointResolver, EndpointSet, RemoteApiClient, RemoteError};
