//! # Sync Service
//!
//! Wires configuration, the remote client, history, the orchestrators and the
//! job queue into one handle. Callers either synchronize immediately (and await
//! the result) or submit a job and poll it by id.

use std::sync::Arc;

use super::customer_sync::CustomerSyncOrchestrator;
use super::inventory_adjustment::{InventoryAdjuster, InventoryAdjustmentReport};
use super::product_sync::{ProductSyncOrchestrator, SyncMode};
use super::remote_caller::RemoteCaller;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::history::{HistoryRecorder, SqliteHistoryStore};
use crate::log_job;
use crate::models::{CustomerRecord, CustomerSyncResult, InventoryLine, ProductRecord, SyncResult};
use crate::queue::{BoundedJobQueue, Job, JobContext, JobId, JobQueueSettings, OperationKind};
use crate::remote::{
    CachedEndpointResolver, EndpointResolver, RemoteApiClient, SettingsEndpointResolver,
};

#[derive(Debug, Clone)]
pub struct SyncService {
    products: Arc<ProductSyncOrchestrator>,
    customers: Arc<CustomerSyncOrchestrator>,
    inventory: Arc<InventoryAdjuster>,
    endpoints: Arc<CachedEndpointResolver>,
    queue: BoundedJobQueue,
}

impl SyncService {
    /// Builds the service with endpoints from `config.remote`. Must be called
    /// inside a Tokio runtime.
    pub fn new(
        config: &SyncConfig,
        client: Arc<dyn RemoteApiClient>,
        history: HistoryRecorder,
    ) -> Self {
        let resolver: Arc<dyn EndpointResolver> =
            Arc::new(SettingsEndpointResolver::new(config.remote.clone()));
        Self::with_resolver(config, client, history, resolver)
    }

    /// Like [`SyncService::new`] but with a caller-supplied endpoint resolver.
    pub fn with_resolver(
        config: &SyncConfig,
        client: Arc<dyn RemoteApiClient>,
        history: HistoryRecorder,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Self {
        Self::with_queue(
            config,
            client,
            history,
            resolver,
            BoundedJobQueue::new(JobQueueSettings::from(&config.queue)),
        )
    }

    pub fn with_queue(
        config: &SyncConfig,
        client: Arc<dyn RemoteApiClient>,
        history: HistoryRecorder,
        resolver: Arc<dyn EndpointResolver>,
        queue: BoundedJobQueue,
    ) -> Self {
        let endpoints = Arc::new(CachedEndpointResolver::new(resolver));
        let caller = RemoteCaller::new(client, history);
        Self {
            products: Arc::new(ProductSyncOrchestrator::new(
                caller.clone(),
                Arc::clone(&endpoints),
            )),
            customers: Arc::new(CustomerSyncOrchestrator::new(
                caller.clone(),
                Arc::clone(&endpoints),
            )),
            inventory: Arc::new(InventoryAdjuster::with_limit(
                caller,
                Arc::clone(&endpoints),
                config.inventory.max_concurrent_calls,
            )),
            endpoints,
            queue,
        }
    }

    /// Opens the SQLite history store named in `config.history` and builds the
    /// service on top of it.
    pub async fn connect(config: &SyncConfig, client: Arc<dyn RemoteApiClient>) -> Result<Self> {
        let store = SqliteHistoryStore::from_config(&config.history).await?;
        let history = HistoryRecorder::new(Arc::new(store))
            .with_write_timeout(config.history.write_timeout())
            .with_backlog(config.history.backlog);
        Ok(Self::new(config, client, history))
    }

    pub async fn sync_product(
        &self,
        ctx: &JobContext,
        product: ProductRecord,
        mode: SyncMode,
        strip_variant_metadata: bool,
    ) -> Result<SyncResult> {
        self.products
            .synchronize(ctx, product, mode, strip_variant_metadata)
            .await
    }

    /// Queues a product synchronization. A run that ends with variant errors
    /// still completes the job; the errors are in the job log.
    pub fn submit_product(
        &self,
        product: ProductRecord,
        kind: OperationKind,
        strip_variant_metadata: bool,
    ) -> JobId {
        let products = Arc::clone(&self.products);
        let mode = SyncMode::for_kind(kind, &product);
        let sku = product.sku_label().to_string();

        self.queue.enqueue(sku, kind, move |ctx| async move {
            let result = products
                .synchronize(&ctx, product, mode, strip_variant_metadata)
                .await?;
            if !result.success() {
                log_job!(warn, "PARTIAL_RESULT",
                    job_id: ctx.job_id().map(|id| id.to_string()).unwrap_or_default(),
                    errors: result.errors
                );
            }
            Ok(())
        })
    }

    pub async fn sync_customer(
        &self,
        ctx: &JobContext,
        customer: CustomerRecord,
    ) -> Result<CustomerSyncResult> {
        self.customers.synchronize(ctx, customer).await
    }

    pub fn submit_customer(&self, customer: CustomerRecord) -> JobId {
        let customers = Arc::clone(&self.customers);
        let label = customer
            .customer_number
            .clone()
            .unwrap_or_else(|| customer.name.trim().to_string());

        self.queue
            .enqueue(label, OperationKind::Create, move |ctx| async move {
                customers.synchronize(&ctx, customer).await.map(|_| ())
            })
    }

    pub async fn adjust_inventory(
        &self,
        ctx: &JobContext,
        lines: Vec<InventoryLine>,
    ) -> Result<InventoryAdjustmentReport> {
        self.inventory.adjust(ctx, lines).await
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.queue.get_job(id)
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.queue.list_jobs()
    }

    pub fn queue(&self) -> &BoundedJobQueue {
        &self.queue
    }

    /// Drops the cached endpoint set; the next run resolves it again.
    pub fn invalidate_endpoints(&self) {
        self.endpoints.invalidate();
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}
