//! Endpoint resolution
//!
//! Orchestrators resolve the endpoint set once per run through a
//! [`CachedEndpointResolver`] owned by the caller. The cache lives as long as the
//! resolver object and is dropped with [`CachedEndpointResolver::invalidate`].

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::constants::operations;
use crate::error::{Result, SyncError};

/// Concrete URLs for every remote operation used by the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    pub create_product: String,
    pub save_product: String,
    pub create_inventory: String,
    pub create_relation: String,
    pub create_customer: String,
    pub create_address: String,
}

impl EndpointSet {
    /// All endpoints under one base URL, using the default paths.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            create_product: format!("{base}/products/create"),
            save_product: format!("{base}/products/save"),
            create_inventory: format!("{base}/inventory/create"),
            create_relation: format!("{base}/products/relations/create"),
            create_customer: format!("{base}/customers/create"),
            create_address: format!("{base}/customers/addresses/create"),
        }
    }

    /// Operation label and URL for a product upsert.
    pub fn product_upsert(&self, create: bool) -> (&'static str, &str) {
        if create {
            (operations::CREATE_PRODUCT, &self.create_product)
        } else {
            (operations::SAVE_PRODUCT, &self.save_product)
        }
    }
}

#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self) -> Result<EndpointSet>;
}

/// A fixed endpoint set resolves to itself.
#[async_trait]
impl EndpointResolver for EndpointSet {
    async fn resolve(&self) -> Result<EndpointSet> {
        Ok(self.clone())
    }
}

/// Builds the endpoint set from the `[remote]` settings.
#[derive(Debug, Clone)]
pub struct SettingsEndpointResolver {
    config: RemoteConfig,
}

impl SettingsEndpointResolver {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn join(&self, path: &str) -> Result<String> {
        let base = self.config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(SyncError::EndpointResolution(
                "remote.base_url is empty".to_string(),
            ));
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(format!("{base}/{}", path.trim_start_matches('/')))
    }

    /// Resolves synchronously; the settings never change after construction.
    pub fn endpoint_set(&self) -> Result<EndpointSet> {
        let paths = &self.config.paths;
        Ok(EndpointSet {
            create_product: self.join(&paths.create_product)?,
            save_product: self.join(&paths.save_product)?,
            create_inventory: self.join(&paths.create_inventory)?,
            create_relation: self.join(&paths.create_relation)?,
            create_customer: self.join(&paths.create_customer)?,
            create_address: self.join(&paths.create_address)?,
        })
    }
}

#[async_trait]
impl EndpointResolver for SettingsEndpointResolver {
    async fn resolve(&self) -> Result<EndpointSet> {
        self.endpoint_set()
    }
}

/// Caches the first successful resolution until [`invalidate`](Self::invalidate).
pub struct CachedEndpointResolver {
    inner: Arc<dyn EndpointResolver>,
    cached: RwLock<Option<Arc<EndpointSet>>>,
}

impl std::fmt::Debug for CachedEndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEndpointResolver")
            .field("cached", &self.is_cached())
            .finish()
    }
}

impl CachedEndpointResolver {
    pub fn new(inner: Arc<dyn EndpointResolver>) -> Self {
        Self {
            inner,
            cached: RwLock::new(None),
        }
    }

    pub async fn endpoints(&self) -> Result<Arc<EndpointSet>> {
        let cached = self.cached.read().clone();
        if let Some(endpoints) = cached {
            return Ok(endpoints);
        }

        let resolved = Arc::new(self.inner.resolve().await?);
        debug!(create_product = %resolved.create_product, "Resolved remote endpoint set");
        *self.cached.write() = Some(Arc::clone(&resolved));
        Ok(resolved)
    }

    pub fn invalidate(&self) {
        self.cached.write().take();
    }

    pub fn is_cached(&self) -> bool {
        self.cached.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EndpointResolver for CountingResolver {
        async fn resolve(&self) -> Result<EndpointSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EndpointSet::with_base_url("https://catalog.test"))
        }
    }

    #[tokio::test]
    async fn caches_until_invalidated() {
        let counting = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let resolver = CachedEndpointResolver::new(counting.clone());

        resolver.endpoints().await.unwrap();
        resolver.endpoints().await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        resolver.invalidate();
        assert!(!resolver.is_cached());
        resolver.endpoints().await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn settings_resolver_joins_paths() {
        let config = RemoteConfig {
            base_url: "https://erp.example.com/api/".to_string(),
            ..RemoteConfig::default()
        };
        let endpoints = SettingsEndpointResolver::new(config).resolve().await.unwrap();
        assert_eq!(
            endpoints.create_product,
            "https://erp.example.com/api/products/create"
        );
        assert_eq!(endpoints.product_upsert(false).0, operations::SAVE_PRODUCT);
    }

    #[tokio::test]
    async fn settings_resolver_requires_base_url() {
        let config = RemoteConfig {
            base_url: String::new(),
            ..RemoteConfig::default()
        };
        let err = SettingsEndpointResolver::new(config).resolve().await.unwrap_err();
        assert!(matches!(err, SyncError::EndpointResolution(_)));
    }
}
