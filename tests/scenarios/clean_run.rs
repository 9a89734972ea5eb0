//! Test: Clean run - every stage dispatched once, in order

use crate::helpers::*;
use std::collections::BTreeMap;
use std::time::Duration;

/// 2 currencies, one 3-node drop table, 3 stores, 4 title-data keys, 1 script
#[tokio::test(start_paused = true)]
async fn test_end_to_end_provisioning() {
    let client = MockAdminClient::new();
    let mut controller = controller(&client, seed(3, 4));
    let events = record_events(&mut controller);

    let handle = controller.start("secret").unwrap();

    // Peak of the fan-out counter per stage, as published
    let mut progress = handle.progress();
    let observer = tokio::spawn(async move {
        let mut peaks: BTreeMap<usize, usize> = BTreeMap::new();
        loop {
            {
                let snapshot = progress.borrow_and_update();
                if let Some(total) = snapshot.subtasks_total {
                    assert!(snapshot.subtasks_completed <= total);
                }
                let peak = peaks.entry(snapshot.stage_index).or_default();
                *peak = (*peak).max(snapshot.subtasks_completed);
            }
            if progress.changed().await.is_err() {
                return peaks;
            }
        }
    });

    let snapshot = handle.wait_until_settled().await;

    assert_completed(&snapshot);
    assert!(snapshot.complete);
    assert_eq!(snapshot.fraction, 1.0);

    let peaks = observer.await.unwrap();
    assert_eq!(peaks.get(&3), Some(&3));
    assert_eq!(peaks.get(&4), Some(&4));
    assert_eq!(peaks.get(&0), Some(&0));

    let events = events.lock().unwrap().clone();
    assert_eq!(completed_stages(&events), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(successes_in_stage(&events, 3), 3);
    assert_eq!(successes_in_stage(&events, 4), 4);

    let operations: Vec<String> = client.calls().into_iter().map(|c| c.operation).collect();
    assert_eq!(
        operations,
        vec![
            "AddVirtualCurrencyTypes",
            "SetCatalogItems",
            "UpdateRandomResultTables",
            "SetStoreItems",
            "SetStoreItems",
            "SetStoreItems",
            "SetTitleData",
            "SetTitleData",
            "SetTitleData",
            "SetTitleData",
            "UpdateCloudScript",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_payloads_sent_per_stage() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(3, 4));

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);

    let currencies = &client.calls_to("AddVirtualCurrencyTypes")[0].body;
    assert_eq!(currencies["VirtualCurrencies"].as_array().unwrap().len(), 2);

    let catalog = &client.calls_to("SetCatalogItems")[0].body;
    assert_eq!(catalog["CatalogVersion"], "Main");
    assert_eq!(catalog["SetAsDefaultCatalog"], true);

    // Drop tables are reshaped into a list of { TableId, Nodes }
    let tables = &client.calls_to("UpdateRandomResultTables")[0].body["Tables"];
    assert_eq!(tables.as_array().unwrap().len(), 1);
    assert_eq!(tables[0]["TableId"], "loot");
    assert_eq!(tables[0]["Nodes"].as_array().unwrap().len(), 3);

    let store_ids: Vec<String> = client
        .calls_to("SetStoreItems")
        .iter()
        .map(|c| c.body["StoreId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(store_ids, vec!["a", "b", "c"]);

    let script = &client.calls_to("UpdateCloudScript")[0].body;
    assert_eq!(script["Publish"], true);
}

/// A stage never starts before the previous one completed and settled
#[tokio::test(start_paused = true)]
async fn test_settle_delay_between_stages() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(2, 1));

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);

    let calls = client.calls();
    let currency = &calls[0];
    let catalog = &calls[1];
    assert!(catalog.at.duration_since(currency.at) >= Duration::from_millis(500));

    let last_store = client.calls_to("SetStoreItems").pop().unwrap();
    let first_title_data = &client.calls_to("SetTitleData")[0];
    assert!(first_title_data.at.duration_since(last_store.at) >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_empty_fan_out_stage_completes() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(2, 0));

    let handle = controller.start("secret").unwrap();
    assert_completed(&handle.wait_until_settled().await);
    assert!(client.calls_to("SetTitleData").is_empty());
    assert_eq!(client.calls_to("UpdateCloudScript").len(), 1);
}

#[tokio::test]
async fn test_empty_credential_dispatches_nothing() {
    let client = MockAdminClient::new();
    let controller = controller(&client, seed(1, 1));

    let result = controller.start("");
    assert!(matches!(
        result,
        Err(provisioner::ProvisionError::EmptyCredential)
    ));

    tokio::task::yield_now().await;
    assert!(client.calls().is_empty());
}
