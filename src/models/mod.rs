pub mod customer;
pub mod product;
pub mod sync_result;

// Re-export core models for easy access
pub use customer::{AddressRecord, CustomerRecord};
pub use product::{InventoryLine, PriceFields, ProductRecord};
pub use sync_result::{CustomerSyncResult, SyncResult, VariantOutcome};
