mod common;

use common::Harness;
use erp_sync_core::history::HistoryStore;
use erp_sync_core::models::{AddressRecord, CustomerRecord, CustomerSyncResult};
use erp_sync_core::queue::JobContext;
use erp_sync_core::test_helpers::{data_response, ScriptedRemoteClient};
use erp_sync_core::SyncError;
use serde_json::json;

fn acme() -> CustomerRecord {
    CustomerRecord {
        name: "ACME GmbH".to_string(),
        customer_number: Some("K-1001".to_string()),
        email: Some("orders@acme.test".to_string()),
        primary_address: AddressRecord {
            street: "Hauptstr. 1".to_string(),
            zip: "10115".to_string(),
            city: "Berlin".to_string(),
            country: "DE".to_string(),
            addition: None,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn customer_then_primary_address() {
    let harness = Harness::new(ScriptedRemoteClient::new(|url, _| {
        if url.ends_with("/customers/create") {
            Ok(data_response(41))
        } else {
            Ok(json!({"success": true, "data": {"id": "9001"}}))
        }
    }));

    let result = harness
        .customers()
        .synchronize(&JobContext::detached(), acme())
        .await
        .unwrap();

    assert_eq!(
        result,
        CustomerSyncResult {
            customer_id: 41,
            address_id: 9001
        }
    );
    assert_eq!(
        harness.call_log(),
        vec!["/customers/create", "/customers/addresses/create"]
    );

    let calls = harness.client.calls();
    assert_eq!(calls[0].body["customerNumber"], json!("K-1001"));
    assert_eq!(
        calls[1].body,
        json!({
            "customerId": 41,
            "street": "Hauptstr. 1",
            "zip": "10115",
            "city": "Berlin",
            "country": "DE",
            "primary": true
        })
    );
}

#[tokio::test]
async fn rejected_customer_stops_the_chain() {
    let harness = Harness::new(ScriptedRemoteClient::new(|_, _| {
        Ok(json!({"success": false, "error": {"message": "duplicate customer number"}}))
    }));

    let err = harness
        .customers()
        .synchronize(&JobContext::detached(), acme())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SyncError::RemoteRejected {
            operation: "create_customer".to_string(),
            message: "duplicate customer number".to_string(),
        }
    );
    assert_eq!(harness.client.calls().len(), 1);

    harness.flush_history().await;
    let jobs = harness.history.recent_jobs(1).await.unwrap();
    assert_eq!(jobs[0].job_type, "customer_sync");
    assert_eq!(jobs[0].success, Some(false));
}

#[tokio::test]
async fn address_without_id_fails_after_customer_was_created() {
    let harness = Harness::new(ScriptedRemoteClient::new(|url, _| {
        if url.ends_with("/customers/create") {
            Ok(data_response(41))
        } else {
            Ok(json!({"success": true, "data": {}}))
        }
    }));

    let err = harness
        .customers()
        .synchronize(&JobContext::detached(), acme())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MissingRemoteId { ref operation, .. } if operation == "create_address"));
    assert_eq!(harness.client.calls().len(), 2);
}
