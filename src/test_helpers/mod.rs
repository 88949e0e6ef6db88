// Test Helpers Module - Integration Testing Infrastructure
//
// Provides a scripted remote catalog client and shared setup functions for unit
// and integration tests. Nothing in here talks to a real network or database
// server.

pub mod scripted_client;
pub mod test_utils;

pub use scripted_client::{data_response, product_response, RecordedCall, ScriptedRemoteClient};

pub use test_utils::{
    catalog_endpoints, setup_test_environment, test_config, test_history_url, TEST_BASE_URL,
};
