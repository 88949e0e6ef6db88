//! Shared fixtures for the integration suites.

use erp_sync_core::history::{HistoryRecorder, HistoryStore, InMemoryHistoryStore};
use erp_sync_core::orchestration::{
    CustomerSyncOrchestrator, InventoryAdjuster, ProductSyncOrchestrator, RemoteCaller,
};
use erp_sync_core::remote::{CachedEndpointResolver, RemoteError};
use erp_sync_core::test_helpers::{catalog_endpoints, product_response, ScriptedRemoteClient};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Orchestrators wired to one scripted client and an in-memory history store.
pub struct Harness {
    pub client: Arc<ScriptedRemoteClient>,
    pub history: Arc<InMemoryHistoryStore>,
    pub endpoints: Arc<CachedEndpointResolver>,
    pub caller: RemoteCaller,
}

impl Harness {
    pub fn new(client: ScriptedRemoteClient) -> Self {
        let client = Arc::new(client);
        let history = Arc::new(InMemoryHistoryStore::new());
        let store: Arc<dyn HistoryStore> = history.clone();
        let endpoints = Arc::new(CachedEndpointResolver::new(Arc::new(catalog_endpoints())));
        let caller = RemoteCaller::new(client.clone(), HistoryRecorder::new(store));
        Self {
            client,
            history,
            endpoints,
            caller,
        }
    }

    pub fn products(&self) -> ProductSyncOrchestrator {
        ProductSyncOrchestrator::new(self.caller.clone(), Arc::clone(&self.endpoints))
    }

    pub fn customers(&self) -> CustomerSyncOrchestrator {
        CustomerSyncOrchestrator::new(self.caller.clone(), Arc::clone(&self.endpoints))
    }

    pub fn inventory(&self, max_concurrent_calls: usize) -> InventoryAdjuster {
        InventoryAdjuster::with_limit(
            self.caller.clone(),
            Arc::clone(&self.endpoints),
            max_concurrent_calls,
        )
    }

    /// Waits for queued history writes to reach the store.
    pub async fn flush_history(&self) {
        self.caller.history().flush().await;
    }

    /// URL suffix of every call made so far, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.client
            .calls()
            .into_iter()
            .map(|call| {
                call.url
                    .trim_start_matches(erp_sync_core::test_helpers::TEST_BASE_URL)
                    .to_string()
            })
            .collect()
    }
}

/// Catalog that answers product upserts with the request's own id, or the next
/// id from `first_new_id` for creates. Other operations just succeed.
pub fn catalog_responder(
    first_new_id: i64,
) -> impl Fn(&str, &Value) -> Result<Value, RemoteError> + Send + Sync + 'static {
    let next_id = AtomicI64::new(first_new_id);
    move |url, body| {
        if url.ends_with("/products/create") {
            Ok(product_response(next_id.fetch_add(1, Ordering::SeqCst)))
        } else if url.ends_with("/products/save") {
            let id = body["product"]["id"].as_i64().unwrap_or_default();
            Ok(product_response(id))
        } else {
            Ok(serde_json::json!({ "success": true }))
        }
    }
}
