//! Test: Aborting a run

use crate::helpers::*;
use provisioner::{PipelinePhase, ProvisionError};
use std::time::Duration;

/// Items scheduled but not yet dispatched never go out after an abort
#[tokio::test(start_paused = true)]
async fn test_abort_cancels_scheduled_items() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(3, 2));

    let handle = controller.start("secret").unwrap();
    handle.wait_for(|s| s.stage_index == 3).await;
    handle.abort().await.unwrap();

    assert_eq!(handle.snapshot().phase, PipelinePhase::Aborted);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.call_count(&store_label(2)), 0);
    assert!(client.calls_to("SetTitleData").is_empty());
    assert!(client.calls_to("UpdateCloudScript").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abort_while_halted() {
    let client = MockAdminClient::new().on("SetCatalogItems", Behavior::Fail("nope".to_string()));
    let controller = controller(&client, seed(1, 1));

    let handle = controller.start("secret").unwrap();
    assert_halted_at(&handle.wait_until_settled().await, 1, "nope");

    handle.abort().await.unwrap();
    let snapshot = handle.wait_until_settled().await;
    assert_eq!(snapshot.phase, PipelinePhase::Aborted);
    assert_eq!(snapshot.error.as_deref(), Some("nope"));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(
        handle.clear_error().await,
        Err(ProvisionError::ControllerGone)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_aborts_run() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(3, 2));

    let handle = controller.start("secret").unwrap();
    handle.wait_for(|s| s.stage_index == 2).await;
    drop(handle);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(client.calls_to("SetStoreItems").is_empty());
}
