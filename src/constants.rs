//! # System Constants
//!
//! Operation names, attribute keys and limits shared by the orchestrators, the
//! job queue and the history store.

/// Logical remote operations. Used as endpoint labels in job logs and history.
pub mod operations {
    pub const CREATE_PRODUCT: &str = "create_product";
    pub const SAVE_PRODUCT: &str = "save_product";
    pub const CREATE_INVENTORY: &str = "create_inventory";
    pub const CREATE_RELATION: &str = "create_relation";
    pub const CREATE_CUSTOMER: &str = "create_customer";
    pub const CREATE_ADDRESS: &str = "create_address";
}

/// History job types.
pub mod job_types {
    pub const PRODUCT_SYNC: &str = "product_sync";
    pub const CUSTOMER_SYNC: &str = "customer_sync";
    pub const INVENTORY_ADJUSTMENT: &str = "inventory_adjustment";
}

/// Canonical attribute keys understood by the remote catalog service.
pub mod attributes {
    /// Variant-set membership; server-owned on save.
    pub const VARIANT_SET: &str = "variantSet";
    /// Carries the INDI marker on variants.
    pub const VARIANT_TYPE: &str = "variantType";
}

/// INDI variant handling.
pub mod indi {
    /// Case-insensitive marker searched for in the variant-type attribute.
    pub const MARKER: &str = "INDI";
    /// Appended to the master SKU to form the synthetic INDI product SKU.
    pub const SKU_SUFFIX: &str = "-INDI";
    pub const DISPLAY_NAME: &str = "Individual configuration";
}

/// Default limits.
pub mod limits {
    pub const MAX_CONCURRENT_JOBS: usize = 5;
    pub const JOB_TIMEOUT_SECONDS: u64 = 30 * 60;
    pub const JOB_RETENTION_SECONDS: u64 = 5 * 60;
    pub const REAPER_INTERVAL_SECONDS: u64 = 30;
    pub const MAX_CONCURRENT_INVENTORY_CALLS: usize = 8;
    pub const HISTORY_WRITE_TIMEOUT_MS: u64 = 2_000;
    pub const HISTORY_BACKLOG: usize = 1_024;
}

/// Placeholder used in error strings for nodes without a SKU.
pub const MISSING_SKU_LABEL: &str = "<missing sku>";
