//! Test: Halting on errors and dismissing them

use crate::helpers::*;
use provisioner::PipelinePhase;
use std::time::Duration;

/// Clearing an error never resubmits the failed call
#[tokio::test(start_paused = true)]
async fn test_clear_does_not_replay_single_stage() {
    let client = MockAdminClient::new().on(
        "SetCatalogItems",
        Behavior::Fail("Catalog version is locked".to_string()),
    );
    let controller = controller(&client, seed(2, 2));

    let handle = controller.start("secret").unwrap();
    let snapshot = handle.wait_until_settled().await;
    assert_halted_at(&snapshot, 1, "Catalog version is locked");

    assert!(handle.clear_error().await.unwrap());
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, PipelinePhase::Awaiting(1));
    assert_eq!(snapshot.stage_index, 1);
    assert_eq!(client.call_count("SetCatalogItems"), 1);
    assert!(client.calls_to("UpdateRandomResultTables").is_empty());
}

/// A later failure replaces the message shown to the operator
#[tokio::test(start_paused = true)]
async fn test_later_error_overwrites_earlier() {
    let client = MockAdminClient::new()
        .on(&store_label(1), Behavior::Fail("first".to_string()))
        .on(&store_label(2), Behavior::Fail("second".to_string()));
    let controller = controller(&client, seed(3, 1));

    let handle = controller.start("secret").unwrap();
    let snapshot = handle.wait_until_settled().await;
    assert_halted_at(&snapshot, 3, "first");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_halted_at(&handle.snapshot(), 3, "second");
}

#[tokio::test(start_paused = true)]
async fn test_clear_without_error() {
    let client = MockAdminClient::new().on(&store_label(0), Behavior::Hang);
    let controller = controller(&client, seed(1, 1));

    let handle = controller.start("secret").unwrap();
    handle.wait_for(|s| s.stage_index == 3).await;

    assert!(!handle.clear_error().await.unwrap());
    assert_eq!(handle.snapshot().stage_index, 3);
}

/// Halted runs do not dispatch the next stage
#[tokio::test(start_paused = true)]
async fn test_halt_blocks_next_stage() {
    let client = MockAdminClient::new().on(
        "AddVirtualCurrencyTypes",
        Behavior::Fail("Currency code already exists".to_string()),
    );
    let controller = controller(&client, seed(1, 1));

    let handle = controller.start("secret").unwrap();
    let snapshot = handle.wait_until_settled().await;
    assert_halted_at(&snapshot, 0, "Currency code already exists");
    assert_eq!(snapshot.stage_title.as_deref(), Some("currencies"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.calls().len(), 1);
}
