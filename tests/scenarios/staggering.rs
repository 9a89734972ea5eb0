//! Test: Fan-out dispatch staggering

use crate::helpers::*;
use std::time::Duration;

/// Item i of a fan-out stage goes out no earlier than i * interval after
/// the first one
#[tokio::test(start_paused = true)]
async fn test_fan_out_items_are_spaced() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(3, 4));

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);

    for operation in ["SetStoreItems", "SetTitleData"] {
        let calls = client.calls_to(operation);
        let start = calls[0].at;
        for (index, call) in calls.iter().enumerate() {
            assert!(
                call.at.duration_since(start) >= Duration::from_millis(500) * index as u32,
                "{} #{} dispatched too early",
                operation,
                index
            );
        }
    }
}

/// A slow item does not hold back the items scheduled after it
#[tokio::test(start_paused = true)]
async fn test_slow_item_does_not_starve_others() {
    let client = MockAdminClient::new().on(&store_label(0), Behavior::Delay(Duration::from_secs(5)));
    let controller = controller(&client, seed(3, 1));

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);

    let stores = client.calls_to("SetStoreItems");
    assert_eq!(stores.len(), 3);
    let start = stores[0].at;
    assert!(stores[2].at.duration_since(start) < Duration::from_secs(5));

    // The stage still waits for the slow item before moving on
    let title_data = &client.calls_to("SetTitleData")[0];
    assert!(title_data.at.duration_since(start) >= Duration::from_millis(5500));
}

/// Completion order does not matter, only the count
#[tokio::test(start_paused = true)]
async fn test_out_of_order_completions_count_once() {
    let client = MockAdminClient::new()
        .on(&store_label(0), Behavior::Delay(Duration::from_secs(3)))
        .on(&store_label(1), Behavior::Delay(Duration::from_secs(1)));
    let mut controller = controller(&client, seed(3, 1));
    let events = record_events(&mut controller);

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);

    let events = events.lock().unwrap().clone();
    assert_eq!(successes_in_stage(&events, 3), 3);
    assert_eq!(completed_stages(&events), vec![0, 1, 2, 3, 4, 5]);
}
