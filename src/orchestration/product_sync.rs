//! # Product Synchronization Orchestrator
//!
//! Drives one product family into the remote catalog.
//!
//! ## Call order
//!
//! 1. Master upsert (`create_product` or `save_product` per [`SyncMode`]). Any
//!    failure here, or a response without an id, fails the whole run.
//! 2. Master inventory lines, one call each, in order.
//! 3. Variants, in input order. Each variant picks create or save from its own
//!    remote id, is linked to the master only when newly created, then posts its
//!    own inventory lines. INDI variants are posted as a synthetic
//!    `"{master}-INDI"` product instead.
//!
//! A failing variant becomes a `"{sku}: {message}"` entry in
//! [`SyncResult::errors`] and never stops its siblings. Nothing is rolled back.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::remote_caller::RemoteCaller;
use crate::constants::{job_types, operations};
use crate::error::{Result, SyncError};
use crate::log_sync;
use crate::models::{InventoryLine, ProductRecord, SyncResult, VariantOutcome};
use crate::normalization::normalize_record;
use crate::queue::{JobContext, OperationKind};
use crate::remote::response::extract_product_id;
use crate::remote::{
    CachedEndpointResolver, EndpointSet, InventoryPayload, ProductPayload, RelationPayload,
};

/// Whether the master product is created or saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Create,
    Save,
}

impl SyncMode {
    /// Upsert mode implied by the record's remote id.
    pub fn for_record(record: &ProductRecord) -> Self {
        if record.is_new() {
            SyncMode::Create
        } else {
            SyncMode::Save
        }
    }

    /// Mode for a queued job. `Full` decides from the record itself.
    pub fn for_kind(kind: OperationKind, record: &ProductRecord) -> Self {
        match kind {
            OperationKind::Create => SyncMode::Create,
            OperationKind::Save => SyncMode::Save,
            OperationKind::Full => Self::for_record(record),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            SyncMode::Create => operations::CREATE_PRODUCT,
            SyncMode::Save => operations::SAVE_PRODUCT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductSyncOrchestrator {
    caller: RemoteCaller,
    endpoints: Arc<CachedEndpointResolver>,
}

impl ProductSyncOrchestrator {
    pub fn new(caller: RemoteCaller, endpoints: Arc<CachedEndpointResolver>) -> Self {
        Self { caller, endpoints }
    }

    /// Synchronizes `product` and its variants.
    ///
    /// Fails only when the master step fails, the master SKU is missing, the
    /// endpoints cannot be resolved, or the context is cancelled. Variant problems
    /// are reported in the returned [`SyncResult`].
    pub async fn synchronize(
        &self,
        ctx: &JobContext,
        product: ProductRecord,
        mode: SyncMode,
        strip_variant_metadata: bool,
    ) -> Result<SyncResult> {
        let master_sku = product.require_sku()?.to_string();
        let endpoints = self.endpoints.endpoints().await?;
        let request = serde_json::to_value(&product)?;

        log_sync!(info, "PRODUCT_SYNC_STARTED",
            sku: master_sku,
            mode: mode,
            variants: product.variants.len(),
            job_id: ctx.job_id()
        );

        let result = self
            .caller
            .tracked(
                ctx,
                job_types::PRODUCT_SYNC,
                mode.operation(),
                &request,
                |ctx| async move {
                    self.run(&ctx, &endpoints, product, mode, strip_variant_metadata)
                        .await
                },
            )
            .await?;

        info!(
            sku = %master_sku,
            master_id = result.master_id,
            variants_synced = result.variants.len(),
            variant_errors = result.errors.len(),
            "Product synchronization finished"
        );
        Ok(result)
    }

    async fn run(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        mut product: ProductRecord,
        mode: SyncMode,
        strip_variant_metadata: bool,
    ) -> Result<SyncResult> {
        normalize_record(&mut product, strip_variant_metadata);
        let variants = std::mem::take(&mut product.variants);
        let inventory = std::mem::take(&mut product.inventory);
        let master_sku = product.sku.trim().to_string();

        let (operation, url) = endpoints.product_upsert(mode == SyncMode::Create);
        let master_id = self
            .caller
            .upsert(
                ctx,
                operation,
                url,
                &ProductPayload::from_record(&product),
                extract_product_id,
            )
            .await?;
        debug!(sku = %master_sku, master_id = master_id, "Master product upserted");

        let mut result = SyncResult::new(master_id);

        if let Err(error) = self
            .post_inventory(ctx, endpoints, &master_sku, &inventory)
            .await
        {
            if matches!(error, SyncError::Cancelled(_)) {
                return Err(error);
            }
            result.errors.push(format!("{master_sku}: {error}"));
        }

        for variant in variants {
            let label = variant.sku_label().to_string();
            match self
                .sync_variant(ctx, endpoints, &master_sku, master_id, variant)
                .await
            {
                Ok(outcome) => result.variants.push(outcome),
                Err(SyncError::Cancelled(reason)) => return Err(SyncError::Cancelled(reason)),
                Err(error) => {
                    log_sync!(warn, "VARIANT_FAILED", sku: label, error: error.to_string());
                    result.errors.push(format!("{label}: {error}"));
                }
            }
        }

        Ok(result)
    }

    async fn sync_variant(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        master_sku: &str,
        master_id: i64,
        mut variant: ProductRecord,
    ) -> Result<VariantOutcome> {
        let sku = variant.require_sku()?.trim().to_string();
        if variant.is_indi_variant() {
            return self
                .sync_indi_variant(ctx, endpoints, master_sku, master_id, &sku, &variant)
                .await;
        }

        normalize_record(&mut variant, false);
        variant.variants.clear();
        let inventory = std::mem::take(&mut variant.inventory);
        let created = variant.is_new();

        let (operation, url) = endpoints.product_upsert(created);
        let remote_id = self
            .caller
            .upsert(
                ctx,
                operation,
                url,
                &ProductPayload::from_record(&variant),
                extract_product_id,
            )
            .await?;

        if created {
            self.link(ctx, endpoints, master_id, remote_id).await?;
        }
        self.post_inventory(ctx, endpoints, &sku, &inventory).await?;

        Ok(VariantOutcome { sku, remote_id })
    }

    /// Posts the synthetic INDI product for `variant`, then the variant's
    /// inventory lines under the synthetic SKU. The outcome is reported under the
    /// variant's own SKU.
    async fn sync_indi_variant(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        master_sku: &str,
        master_id: i64,
        sku: &str,
        variant: &ProductRecord,
    ) -> Result<VariantOutcome> {
        let payload = ProductPayload::indi(master_sku, variant);
        let created = variant.is_new();

        let (operation, url) = endpoints.product_upsert(created);
        let remote_id = self
            .caller
            .upsert(ctx, operation, url, &payload, extract_product_id)
            .await?;
        if created {
            self.link(ctx, endpoints, master_id, remote_id).await?;
        }
        self.post_inventory(ctx, endpoints, &payload.sku, &variant.inventory)
            .await?;

        debug!(sku = %sku, indi_sku = %payload.sku, remote_id = remote_id, "INDI variant synced");
        Ok(VariantOutcome {
            sku: sku.to_string(),
            remote_id,
        })
    }

    async fn link(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        master_id: i64,
        variant_id: i64,
    ) -> Result<()> {
        self.caller
            .send(
                ctx,
                operations::CREATE_RELATION,
                &endpoints.create_relation,
                &RelationPayload {
                    master_id,
                    variant_id,
                },
            )
            .await?;
        Ok(())
    }

    /// One call per line, in order. Stops at the first failure.
    async fn post_inventory(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        owner_sku: &str,
        lines: &[InventoryLine],
    ) -> Result<()> {
        for line in lines {
            self.caller
                .send(
                    ctx,
                    operations::CREATE_INVENTORY,
                    &endpoints.create_inventory,
                    &InventoryPayload::new(owner_sku, line),
                )
                .await?;
        }
        Ok(())
    }
}
