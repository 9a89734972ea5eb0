//! Seed content loaded from the data directory
//!
//! File names and JSON shapes follow the backend's own export format, so a
//! title exported from the admin console can be replayed unchanged.

use crate::admin::RandomResultTable;
use crate::core::ProvisionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

pub const CURRENCY_FILE: &str = "virtual-currency.json";
pub const CATALOG_FILE: &str = "catalogs.json";
pub const DROP_TABLE_FILE: &str = "drop-tables.json";
pub const STORE_FILE: &str = "stores.json";
pub const TITLE_DATA_FILE: &str = "title-data.json";
pub const CLOUD_SCRIPT_FILE: &str = "cloud-script.json";

/// Read shape of a drop table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DropTableListing {
    pub table_id: String,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,
}

/// One store and the items it sells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreDefinition {
    pub store_id: String,
    #[serde(default)]
    pub store: Vec<Value>,
    #[serde(default)]
    pub marketing_data: Option<Value>,
}

/// A server script file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptFile {
    #[serde(default = "default_script_filename")]
    pub filename: String,
    pub file_contents: String,
}

fn default_script_filename() -> String {
    "main.js".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrencyFile {
    virtual_currencies: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogFile {
    catalog: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DropTableFile {
    tables: BTreeMap<String, DropTableListing>,
}

#[derive(Deserialize)]
struct StoreFile {
    data: Vec<StoreDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TitleDataFile {
    data: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CloudScriptFile {
    files: Vec<ScriptFile>,
}

/// Everything the pipeline uploads
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub currencies: Vec<Value>,
    pub catalog: Vec<Value>,
    pub drop_tables: BTreeMap<String, DropTableListing>,
    pub stores: Vec<StoreDefinition>,
    pub title_data: BTreeMap<String, String>,
    pub script: Option<ScriptFile>,
}

impl SeedData {
    /// Load the six seed files from `dir`
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ProvisionError> {
        let dir = dir.as_ref();
        debug!("Loading seed data from {}", dir.display());

        let currencies: CurrencyFile = read_json(&dir.join(CURRENCY_FILE))?;
        let catalog: CatalogFile = read_json(&dir.join(CATALOG_FILE))?;
        let drop_tables: DropTableFile = read_json(&dir.join(DROP_TABLE_FILE))?;
        let stores: StoreFile = read_json(&dir.join(STORE_FILE))?;
        let title_data: TitleDataFile = read_json(&dir.join(TITLE_DATA_FILE))?;
        let script: CloudScriptFile = read_json(&dir.join(CLOUD_SCRIPT_FILE))?;

        let seed = SeedData {
            currencies: currencies.virtual_currencies,
            catalog: catalog.catalog,
            drop_tables: drop_tables.tables,
            stores: stores.data,
            title_data: title_data.data,
            script: script.files.into_iter().next(),
        };
        seed.validate()?;
        Ok(seed)
    }

    /// Check the seed is dispatchable
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.currencies.is_empty() {
            return Err(invalid("no virtual currencies defined"));
        }
        if self.catalog.is_empty() {
            return Err(invalid("catalog has no items"));
        }

        for (key, table) in &self.drop_tables {
            if &table.table_id != key {
                return Err(invalid(format!(
                    "drop table '{}' is listed under key '{}'",
                    table.table_id, key
                )));
            }
            if table.nodes.is_empty() {
                return Err(invalid(format!("drop table '{}' has no nodes", key)));
            }
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.store_id.is_empty() {
                return Err(invalid("store with an empty StoreId"));
            }
            if !seen.insert(store.store_id.as_str()) {
                return Err(invalid(format!("duplicate store '{}'", store.store_id)));
            }
        }

        if self.script.is_none() {
            return Err(invalid("cloud script has no files"));
        }

        Ok(())
    }
}

/// Flatten the id → listing map into the write shape the admin API expects
pub fn flatten_drop_tables(tables: &BTreeMap<String, DropTableListing>) -> Vec<RandomResultTable> {
    tables
        .values()
        .map(|table| RandomResultTable {
            table_id: table.table_id.clone(),
            nodes: table.nodes.clone(),
        })
        .collect()
}

fn invalid(message: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidSeed(message.into())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProvisionError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProvisionError::SeedIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProvisionError::SeedParse {
        path: path.to_path_buf(),
        source,
    })
}
