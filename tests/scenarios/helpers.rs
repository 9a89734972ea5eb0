//! Test utilities for provisioning scenarios

use async_trait::async_trait;
use provisioner::core::seed::{DropTableListing, ScriptFile, SeedData, StoreDefinition};
use provisioner::core::{PipelinePhase, ProgressSnapshot};
use provisioner::{
    AdminClient, AdminError, AdminRequest, AdminResponse, Credential, PipelineController,
    ProvisionEvent, StageCatalog, StallPolicy, Throttle,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// How the mock answers calls with a given label
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Fail every call
    Fail(String),
    /// Fail the first call, succeed afterwards
    FailOnce(String),
    /// Succeed after a delay
    Delay(Duration),
    /// Never complete
    Hang,
}

/// One call seen by the mock
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub operation: String,
    pub label: String,
    pub body: Value,
    pub at: Instant,
}

/// Admin client with scripted failures, delays and stalls
pub struct MockAdminClient {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<CallRecord>>,
}

impl MockAdminClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Script the answer for calls labelled `label`, e.g. `SetStoreItems [b]`
    pub fn on(self: &Arc<Self>, label: &str, behavior: Behavior) -> Arc<Self> {
        self.behaviors
            .lock()
            .unwrap()
            .insert(label.to_string(), behavior);
        self.clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    pub fn call_count(&self, label: &str) -> usize {
        self.calls().iter().filter(|call| call.label == label).count()
    }
}

#[async_trait]
impl AdminClient for MockAdminClient {
    async fn execute(
        &self,
        _credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        let label = request.label();
        self.calls.lock().unwrap().push(CallRecord {
            operation: request.operation().to_string(),
            label: label.clone(),
            body: request.body(),
            at: Instant::now(),
        });

        let behavior = {
            let mut behaviors = self.behaviors.lock().unwrap();
            match behaviors.get(&label).cloned() {
                Some(Behavior::FailOnce(message)) => {
                    behaviors.remove(&label);
                    Some(Behavior::Fail(message))
                }
                other => other,
            }
        };

        match behavior {
            Some(Behavior::Fail(message)) => Err(AdminError::Api {
                code: Some(1000),
                error: Some("InvalidParams".to_string()),
                message,
            }),
            Some(Behavior::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(AdminResponse::new(json!({})))
            }
            Some(Behavior::Hang) => std::future::pending().await,
            Some(Behavior::FailOnce(_)) | None => Ok(AdminResponse::new(json!({}))),
        }
    }
}

/// Seed with 2 currencies, one 3-node drop table and a script, plus the
/// given number of stores and title-data keys
pub fn seed(stores: usize, title_keys: usize) -> SeedData {
    let mut drop_tables = BTreeMap::new();
    drop_tables.insert(
        "loot".to_string(),
        DropTableListing {
            table_id: "loot".to_string(),
            nodes: vec![
                json!({"ResultItemType": "ItemId", "ResultItem": "sword", "Weight": 1}),
                json!({"ResultItemType": "ItemId", "ResultItem": "shield", "Weight": 1}),
                json!({"ResultItemType": "ItemId", "ResultItem": "potion", "Weight": 2}),
            ],
            catalog_version: None,
        },
    );

    let mut title_data = BTreeMap::new();
    for index in 0..title_keys {
        title_data.insert(format!("Key{}", index), format!("{{\"value\":{}}}", index));
    }

    SeedData {
        currencies: vec![
            json!({"CurrencyCode": "GD", "DisplayName": "Gold"}),
            json!({"CurrencyCode": "SP", "DisplayName": "Spirit"}),
        ],
        catalog: vec![json!({"ItemId": "sword"}), json!({"ItemId": "shield"})],
        drop_tables,
        stores: (0..stores)
            .map(|index| StoreDefinition {
                store_id: store_id(index),
                store: vec![json!({"ItemId": "sword"})],
                marketing_data: None,
            })
            .collect(),
        title_data,
        script: Some(ScriptFile {
            filename: "main.js".to_string(),
            file_contents: "handlers.hello = function () { return 1; };".to_string(),
        }),
    }
}

/// Store ids are `a`, `b`, `c`, ...
pub fn store_id(index: usize) -> String {
    ((b'a' + index as u8) as char).to_string()
}

pub fn store_label(index: usize) -> String {
    format!("SetStoreItems [{}]", store_id(index))
}

/// Controller with the production default spacing (500 ms) and no watchdog
pub fn controller(
    client: &Arc<MockAdminClient>,
    seed: SeedData,
) -> PipelineController<Arc<MockAdminClient>> {
    let catalog = StageCatalog::new(seed, "Main").unwrap();
    PipelineController::new(client.clone(), catalog)
        .with_throttle(Throttle::default())
        .with_stall_policy(StallPolicy { item_timeout: None })
}

/// Record every event the controller emits
pub fn record_events(
    controller: &mut PipelineController<Arc<MockAdminClient>>,
) -> Arc<Mutex<Vec<ProvisionEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    controller.add_event_handler(move |event| sink.lock().unwrap().push(event));
    events
}

/// Number of successes reported for a stage
pub fn successes_in_stage(events: &[ProvisionEvent], stage: usize) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(event, ProvisionEvent::ItemSucceeded { stage_index, .. } if *stage_index == stage)
        })
        .count()
}

pub fn completed_stages(events: &[ProvisionEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            ProvisionEvent::StageCompleted { stage_index, .. } => Some(*stage_index),
            _ => None,
        })
        .collect()
}

/// Assert the run finished every stage
pub fn assert_completed(snapshot: &ProgressSnapshot) {
    assert_eq!(
        snapshot.phase,
        PipelinePhase::Complete,
        "Run did not complete: {:?}",
        snapshot
    );
    assert_eq!(snapshot.stage_index, snapshot.total_stages);
    assert!(snapshot.error.is_none());
}

/// Assert the run is halted at `stage` showing `message`
pub fn assert_halted_at(snapshot: &ProgressSnapshot, stage: usize, message: &str) {
    assert_eq!(
        snapshot.phase,
        PipelinePhase::Halted(stage),
        "Run not halted at stage {}: {:?}",
        stage,
        snapshot
    );
    assert_eq!(snapshot.error.as_deref(), Some(message));
}
