mod common;

use common::catalog_responder;
use erp_sync_core::history::HistoryRecorder;
use erp_sync_core::models::ProductRecord;
use erp_sync_core::orchestration::SyncService;
use erp_sync_core::queue::{
    BoundedJobQueue, JobFailure, JobQueueSettings, JobStatus, ManualClock, OperationKind,
};
use erp_sync_core::remote::{EndpointResolver, RemoteError};
use erp_sync_core::test_helpers::{catalog_endpoints, test_config, ScriptedRemoteClient};
use erp_sync_core::SyncError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(5);

fn settings(max_concurrent_jobs: usize, job_timeout: Duration) -> JobQueueSettings {
    JobQueueSettings {
        max_concurrent_jobs,
        job_timeout,
        retention: Duration::from_secs(300),
        reaper_interval: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn never_runs_more_than_five_jobs_at_once() {
    let queue = BoundedJobQueue::new(settings(5, Duration::from_secs(30)));
    let running = Arc::new(AtomicUsize::new(0));
    let observed_max = Arc::new(AtomicUsize::new(0));

    let ids: Vec<_> = (0..20)
        .map(|i| {
            let running = Arc::clone(&running);
            let observed_max = Arc::clone(&observed_max);
            queue.enqueue(format!("SKU-{i}"), OperationKind::Full, move |_ctx| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                observed_max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    for id in &ids {
        let job = queue.wait_for(id, POLL).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    let max = observed_max.load(Ordering::SeqCst);
    assert!(max <= 5, "observed {max} concurrent jobs");
    assert!(max >= 2, "jobs never overlapped");
}

#[tokio::test]
async fn queued_jobs_start_in_admission_order() {
    let queue = BoundedJobQueue::new(settings(1, Duration::from_secs(30)));
    let ids: Vec<_> = (0..5)
        .map(|i| {
            queue.enqueue(format!("SKU-{i}"), OperationKind::Create, |_ctx| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            })
        })
        .collect();

    let mut started = Vec::new();
    for id in &ids {
        let job = queue.wait_for(id, POLL).await.unwrap();
        started.push(job.started_at.unwrap());
    }
    assert!(started.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn timeout_is_distinguishable_from_business_failure() {
    let queue = BoundedJobQueue::new(settings(2, Duration::from_millis(50)));

    let slow = queue.enqueue("SLOW", OperationKind::Full, |ctx| async move {
        tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(SyncError::Cancelled("timed out".to_string())),
            _ = tokio::time::sleep(Duration::from_secs(10)) => Ok(()),
        }
    });
    let broken = queue.enqueue("BROKEN", OperationKind::Full, |_ctx| async {
        Err(SyncError::RemoteRejected {
            operation: "save_product".to_string(),
            message: "SKU locked".to_string(),
        })
    });

    let slow = queue.wait_for(&slow, POLL).await.unwrap();
    let broken = queue.wait_for(&broken, POLL).await.unwrap();

    assert_eq!(slow.status, JobStatus::Failed);
    assert!(slow.timed_out());
    assert_eq!(slow.failure, Some(JobFailure::TimedOut));
    assert!(slow.error.as_deref().unwrap().contains("timed out"));

    assert_eq!(broken.status, JobStatus::Failed);
    assert!(!broken.timed_out());
    assert_eq!(broken.failure, Some(JobFailure::Error));
    assert_eq!(
        broken.error.as_deref(),
        Some("save_product rejected by remote: SKU locked")
    );
}

#[tokio::test]
async fn completed_job_disappears_after_retention() {
    let clock = Arc::new(ManualClock::default());
    let queue = BoundedJobQueue::with_clock(settings(5, Duration::from_secs(30)), clock.clone());

    let id = queue.enqueue("A1", OperationKind::Create, |_ctx| async { Ok(()) });
    let job = queue.wait_for(&id, POLL).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    clock.advance(Duration::from_secs(4 * 60));
    assert!(queue.get_job(&id).is_some());

    clock.advance(Duration::from_secs(61));
    assert!(queue.get_job(&id).is_none());
    assert_eq!(queue.stats().completed, 0);
}

#[tokio::test]
async fn running_jobs_are_never_evicted() {
    let clock = Arc::new(ManualClock::default());
    let queue = BoundedJobQueue::with_clock(settings(1, Duration::from_secs(30)), clock.clone());

    let id = queue.enqueue("LONG", OperationKind::Save, |_ctx| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    clock.advance(Duration::from_secs(3600));
    assert_eq!(queue.evict_expired(), 0);
    assert_eq!(queue.get_job(&id).unwrap().status, JobStatus::Running);
}

#[tokio::test]
async fn submitted_product_job_carries_call_log() {
    let client = Arc::new(ScriptedRemoteClient::new(catalog_responder(100)));
    let resolver: Arc<dyn EndpointResolver> = Arc::new(catalog_endpoints());
    let service = SyncService::with_resolver(
        &test_config(),
        client.clone(),
        HistoryRecorder::disabled(),
        resolver,
    );

    let product = ProductRecord::new("A1")
        .with_variant(ProductRecord::new("A1-RED"))
        .with_variant(ProductRecord::new("A1-BLUE").with_id(55));
    let id = service.submit_product(product, OperationKind::Full, false);

    let job = service.queue().wait_for(&id, POLL).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.sku, "A1");
    let endpoints: Vec<_> = job.log.iter().map(|entry| entry.endpoint.as_str()).collect();
    assert_eq!(
        endpoints,
        vec!["create_product", "create_product", "create_relation", "save_product"]
    );
    assert!(job.log.iter().all(|entry| entry.success));
}

#[tokio::test]
async fn partial_product_result_still_completes_the_job() {
    let client = Arc::new(ScriptedRemoteClient::new(|url, body| {
        if body["product"]["sku"] == serde_json::json!("A1-RED") {
            return Err(RemoteError::Transport("boom".to_string()));
        }
        catalog_responder(100)(url, body)
    }));
    let resolver: Arc<dyn EndpointResolver> = Arc::new(catalog_endpoints());
    let service =
        SyncService::with_resolver(&test_config(), client, HistoryRecorder::disabled(), resolver);

    let id = service.submit_product(
        ProductRecord::new("A1").with_variant(ProductRecord::new("A1-RED")),
        OperationKind::Create,
        false,
    );

    let job = service.queue().wait_for(&id, POLL).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    assert_eq!(job.log.len(), 2);
    assert!(!job.log[1].success);
    assert_eq!(
        job.log[1].error.as_deref(),
        Some("create_product failed: transport error: boom")
    );
}
