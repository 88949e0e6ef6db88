//! # Test Utilities
//!
//! Environment and configuration helpers shared by the test suites.

use std::env;
use std::path::Path;

use crate::config::SyncConfig;
use crate::remote::EndpointSet;

/// Base URL every test endpoint set lives under.
pub const TEST_BASE_URL: &str = "http://catalog.test";

/// Setup test environment variables if they're not already present
pub fn setup_test_environment() {
    if env::var("ERP_SYNC_ENV").is_err() {
        env::set_var("ERP_SYNC_ENV", "test");
    }
}

/// Endpoint set under [`TEST_BASE_URL`] with the default paths.
pub fn catalog_endpoints() -> EndpointSet {
    EndpointSet::with_base_url(TEST_BASE_URL)
}

/// SQLite URL for a history database inside `dir`.
pub fn test_history_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("history.db").display())
}

/// Default configuration pointed at the test catalog, with short queue limits.
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.remote.base_url = TEST_BASE_URL.to_string();
    config.queue.job_timeout_seconds = 60;
    config.queue.reaper_interval_seconds = 1;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        assert!(test_config().validate().is_ok());
        assert_eq!(
            catalog_endpoints().create_relation,
            "http://catalog.test/products/relations/create"
        );
    }

    #[test]
    fn history_url_points_into_directory() {
        let url = test_history_url(Path::new("/tmp/sync"));
        assert_eq!(url, "sqlite:///tmp/sync/history.db");
    }
}
