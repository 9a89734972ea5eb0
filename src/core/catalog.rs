//! Stage catalog - turns seed data into per-stage admin calls

use crate::admin::AdminRequest;
use crate::core::seed::{flatten_drop_tables, SeedData};
use crate::core::stage::{StageDescriptor, StageKey, STAGES};
use crate::core::ProvisionError;
use serde::Serialize;

/// Catalog version used when none is configured
pub const DEFAULT_CATALOG_VERSION: &str = "Main";

/// Work summary for one stage, for validation output
#[derive(Debug, Clone, Serialize)]
pub struct StagePlan {
    pub key: String,
    pub title: String,
    pub kind: String,
    pub calls: usize,
}

/// Static stage list plus the payload each stage dispatches
#[derive(Debug, Clone)]
pub struct StageCatalog {
    seed: SeedData,
    catalog_version: String,
}

impl StageCatalog {
    /// Build a catalog from validated seed data
    pub fn new(seed: SeedData, catalog_version: impl Into<String>) -> Result<Self, ProvisionError> {
        let catalog_version = catalog_version.into();
        if catalog_version.is_empty() {
            return Err(ProvisionError::InvalidSeed(
                "catalog version must not be empty".to_string(),
            ));
        }
        seed.validate()?;
        Ok(Self {
            seed,
            catalog_version,
        })
    }

    pub fn total_stages(&self) -> usize {
        STAGES.len()
    }

    pub fn catalog_version(&self) -> &str {
        &self.catalog_version
    }

    /// The calls a stage dispatches: exactly one for `Single`, one per
    /// store or title-data key for `FanOut`
    pub fn work_items(&self, stage: &StageDescriptor) -> Vec<AdminRequest> {
        let version = self.catalog_version.clone();
        match stage.key {
            StageKey::Currency => vec![AdminRequest::AddVirtualCurrencyTypes {
                currencies: self.seed.currencies.clone(),
            }],
            StageKey::Catalog => vec![AdminRequest::SetCatalogItems {
                catalog_version: version,
                items: self.seed.catalog.clone(),
                set_as_default: true,
            }],
            StageKey::DropTable => vec![AdminRequest::UpdateRandomResultTables {
                catalog_version: version,
                tables: flatten_drop_tables(&self.seed.drop_tables),
            }],
            StageKey::Store => self
                .seed
                .stores
                .iter()
                .map(|store| AdminRequest::SetStoreItems {
                    store_id: store.store_id.clone(),
                    items: store.store.clone(),
                    marketing: store.marketing_data.clone(),
                    catalog_version: version.clone(),
                })
                .collect(),
            StageKey::TitleData => self
                .seed
                .title_data
                .iter()
                .map(|(key, value)| AdminRequest::SetTitleData {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            StageKey::CloudScript => self
                .seed
                .script
                .iter()
                .map(|script| AdminRequest::UpdateCloudScript {
                    filename: script.filename.clone(),
                    source: script.file_contents.clone(),
                    publish: true,
                })
                .collect(),
        }
    }

    /// Per-stage call counts
    pub fn plan(&self) -> Vec<StagePlan> {
        STAGES
            .iter()
            .map(|stage| StagePlan {
                key: stage.key.to_string(),
                title: stage.title.to_string(),
                kind: format!("{:?}", stage.kind),
                calls: self.work_items(stage).len(),
            })
            .collect()
    }
}
