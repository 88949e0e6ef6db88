//! # Inventory Adjuster
//!
//! Posts stock lines for many SKUs at once. Lines run concurrently up to a global
//! limit, but lines that target the same warehouse are serialized: the remote
//! catalog does not tolerate concurrent stock writes to one warehouse.
//!
//! A warehouse lock lives only while some line for that warehouse is posting or
//! waiting; the last holder removes it from the table.

use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use super::remote_caller::RemoteCaller;
use crate::constants::{job_types, limits, operations, MISSING_SKU_LABEL};
use crate::error::{Result, SyncError};
use crate::log_sync;
use crate::models::InventoryLine;
use crate::queue::JobContext;
use crate::remote::{CachedEndpointResolver, EndpointSet, InventoryPayload};

/// Outcome of one bulk adjustment. Both lists keep input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustmentReport {
    pub succeeded: Vec<InventoryLine>,
    /// `"{sku}@{warehouse}: {message}"` per failed line
    pub errors: Vec<String>,
}

impl InventoryAdjustmentReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct InventoryAdjuster {
    caller: RemoteCaller,
    endpoints: Arc<CachedEndpointResolver>,
    permits: Semaphore,
    warehouse_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl InventoryAdjuster {
    pub fn new(caller: RemoteCaller, endpoints: Arc<CachedEndpointResolver>) -> Self {
        Self::with_limit(caller, endpoints, limits::MAX_CONCURRENT_INVENTORY_CALLS)
    }

    pub fn with_limit(
        caller: RemoteCaller,
        endpoints: Arc<CachedEndpointResolver>,
        max_concurrent_calls: usize,
    ) -> Self {
        Self {
            caller,
            endpoints,
            permits: Semaphore::new(max_concurrent_calls.max(1)),
            warehouse_locks: DashMap::new(),
        }
    }

    /// Posts every line. Line failures are collected in the report; the call only
    /// fails when the endpoints cannot be resolved or the context is cancelled.
    pub async fn adjust(
        &self,
        ctx: &JobContext,
        lines: Vec<InventoryLine>,
    ) -> Result<InventoryAdjustmentReport> {
        let endpoints = self.endpoints.endpoints().await?;
        let request = serde_json::to_value(&lines)?;

        let report = self
            .caller
            .tracked(
                ctx,
                job_types::INVENTORY_ADJUSTMENT,
                operations::CREATE_INVENTORY,
                &request,
                |ctx| async move {
                    let outcomes =
                        join_all(lines.iter().map(|line| self.post_line(&ctx, &endpoints, line)))
                            .await;

                    let mut report = InventoryAdjustmentReport::default();
                    for (line, outcome) in lines.iter().zip(outcomes) {
                        match outcome {
                            Ok(()) => report.succeeded.push(line.clone()),
                            Err(SyncError::Cancelled(reason)) => {
                                return Err(SyncError::Cancelled(reason))
                            }
                            Err(error) => report.errors.push(format!(
                                "{}@{}: {}",
                                line.sku.as_deref().unwrap_or(MISSING_SKU_LABEL),
                                line.warehouse_id,
                                error
                            )),
                        }
                    }
                    Ok(report)
                },
            )
            .await?;

        log_sync!(info, "INVENTORY_ADJUSTED",
            succeeded: report.succeeded.len(),
            failed: report.errors.len()
        );
        Ok(report)
    }

    async fn post_line(
        &self,
        ctx: &JobContext,
        endpoints: &EndpointSet,
        line: &InventoryLine,
    ) -> Result<()> {
        let sku = match line.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => sku,
            _ => return Err(SyncError::validation("inventory line has no sku")),
        };

        let warehouse = self.lease_warehouse(line.warehouse_id);
        let _serialized = warehouse.lock.lock().await;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SyncError::Cancelled("inventory adjuster closed".to_string()))?;

        self.caller
            .send(
                ctx,
                operations::CREATE_INVENTORY,
                &endpoints.create_inventory,
                &InventoryPayload::new(sku, line),
            )
            .await?;
        Ok(())
    }

    fn lease_warehouse(&self, warehouse_id: i64) -> WarehouseLease<'_> {
        WarehouseLease {
            locks: &self.warehouse_locks,
            warehouse_id,
            lock: Arc::clone(&self.warehouse_locks.entry(warehouse_id).or_default()),
        }
    }

    /// Warehouses with a line currently posting or waiting.
    pub fn warehouses_in_use(&self) -> usize {
        self.warehouse_locks.len()
    }
}

/// Shared handle on one warehouse's lock. Dropping the last lease removes the
/// lock from the table.
struct WarehouseLease<'a> {
    locks: &'a DashMap<i64, Arc<Mutex<()>>>,
    warehouse_id: i64,
    lock: Arc<Mutex<()>>,
}

impl Drop for WarehouseLease<'_> {
    fn drop(&mut self) {
        // Table entry plus this lease. The shard lock held by `remove_if` keeps
        // new leases out while the count is checked.
        self.locks
            .remove_if(&self.warehouse_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryRecorder;
    use crate::test_helpers::ScriptedRemoteClient;
    use serde_json::json;

    #[tokio::test]
    async fn lines_without_sku_are_reported() {
        let client = Arc::new(ScriptedRemoteClient::new(|_, _| Ok(json!({"success": true}))));
        let endpoints = Arc::new(CachedEndpointResolver::new(Arc::new(
            EndpointSet::with_base_url("http://catalog.test"),
        )));
        let adjuster =
            InventoryAdjuster::new(RemoteCaller::new(client.clone(), HistoryRecorder::disabled()), endpoints);

        let report = adjuster
            .adjust(
                &JobContext::detached(),
                vec![
                    InventoryLine::new(1, 10, 5).for_sku("A1"),
                    InventoryLine::new(2, 10, 5),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(
            report.errors,
            vec!["<missing sku>@2: Validation error: inventory line has no sku".to_string()]
        );
        assert_eq!(client.calls().len(), 1);
        assert_eq!(adjuster.warehouses_in_use(), 0);
    }
}
