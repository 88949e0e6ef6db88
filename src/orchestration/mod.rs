//! # Synchronization Orchestration
//!
//! Turns one logical request into an ordered series of remote catalog calls and
//! aggregates the outcome.
//!
//! ## Core Components
//!
//! - **ProductSyncOrchestrator**: master upsert, inventory, variant upsert and
//!   linking, with per-variant partial failure
//! - **CustomerSyncOrchestrator**: customer followed by its primary address
//! - **InventoryAdjuster**: bulk stock postings, bounded overall and serialized
//!   per warehouse
//! - **RemoteCaller**: the shared "post, check, extract id, record" step
//! - **SyncService**: facade over all of the above plus the job queue

pub mod customer_sync;
pub mod inventory_adjustment;
pub mod product_sync;
pub mod remote_caller;
pub mod service;

pub use customer_sync::CustomerSyncOrchestrator;
pub use inventory_adjustment::{InventoryAdjuster, InventoryAdjustmentReport};
pub use product_sync::{ProductSyncOrchestrator, SyncMode};
pub use remote_caller::{IdExtractor, RemoteCaller};
pub use service::SyncService;
