//! Test: Operator-driven retry of failed items

use crate::helpers::*;
use provisioner::{ProvisionError, ProvisionEvent};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_retry_failed_store_completes_run() {
    let client = MockAdminClient::new().on(
        &store_label(1),
        Behavior::FailOnce("Service unavailable".to_string()),
    );
    let mut controller = controller(&client, seed(3, 2));
    let events = record_events(&mut controller);

    let handle = controller.start("secret").unwrap();
    let snapshot = handle.wait_until_settled().await;
    assert_halted_at(&snapshot, 3, "Service unavailable");

    // The error has to be dismissed first
    assert!(matches!(
        handle.retry_failed().await,
        Err(ProvisionError::Halted(_))
    ));

    assert!(handle.clear_error().await.unwrap());
    assert_eq!(handle.retry_failed().await.unwrap(), 1);

    assert_completed(&handle.wait_until_settled().await);
    assert_eq!(client.call_count(&store_label(1)), 2);
    assert_eq!(client.call_count(&store_label(0)), 1);
    assert_eq!(client.call_count(&store_label(2)), 1);

    let events = events.lock().unwrap().clone();
    assert!(events
        .iter()
        .any(|e| matches!(e, ProvisionEvent::ItemsRetried { stage_index: 3, count: 1 })));
    assert_eq!(successes_in_stage(&events, 3), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_single_stage() {
    let client = MockAdminClient::new().on(
        "UpdateCloudScript",
        Behavior::FailOnce("Script too large".to_string()),
    );
    let controller = controller(&client, seed(1, 1));

    let handle = controller.start("secret").unwrap();
    assert_halted_at(&handle.wait_until_settled().await, 5, "Script too large");

    handle.clear_error().await.unwrap();
    assert_eq!(handle.retry_failed().await.unwrap(), 1);
    assert_completed(&handle.wait_until_settled().await);
    assert_eq!(client.calls_to("UpdateCloudScript").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_nothing_failed() {
    let client = MockAdminClient::new().on(&store_label(0), Behavior::Hang);
    let controller = controller(&client, seed(2, 1));

    let handle = controller.start("secret").unwrap();
    handle.wait_for(|s| s.stage_index == 3).await;

    assert_eq!(handle.retry_failed().await.unwrap(), 0);
}

/// A retry issued while later stores are still queued goes out after them
#[tokio::test(start_paused = true)]
async fn test_retry_queues_behind_scheduled_items() {
    let client = MockAdminClient::new().on(&store_label(0), Behavior::FailOnce("Busy".to_string()));
    let controller = controller(&client, seed(4, 1));

    let handle = controller.start("secret").unwrap();
    assert_halted_at(&handle.wait_until_settled().await, 3, "Busy");
    assert_eq!(client.call_count(&store_label(3)), 0);

    handle.clear_error().await.unwrap();
    assert_eq!(handle.retry_failed().await.unwrap(), 1);
    assert_completed(&handle.wait_until_settled().await);

    let stores = client.calls_to("SetStoreItems");
    let labels: Vec<&str> = stores.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            store_label(0).as_str(),
            store_label(1).as_str(),
            store_label(2).as_str(),
            store_label(3).as_str(),
            store_label(0).as_str(),
        ]
    );
    for pair in stores.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(500));
    }
}
