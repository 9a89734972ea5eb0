//! Admin API request shapes

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Write shape of a drop table, as accepted by `UpdateRandomResultTables`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RandomResultTable {
    pub table_id: String,
    pub nodes: Vec<Value>,
}

/// One administrative call and its payload
#[derive(Debug, Clone, PartialEq)]
pub enum AdminRequest {
    AddVirtualCurrencyTypes {
        currencies: Vec<Value>,
    },
    SetCatalogItems {
        catalog_version: String,
        items: Vec<Value>,
        set_as_default: bool,
    },
    UpdateRandomResultTables {
        catalog_version: String,
        tables: Vec<RandomResultTable>,
    },
    SetStoreItems {
        store_id: String,
        items: Vec<Value>,
        marketing: Option<Value>,
        catalog_version: String,
    },
    SetTitleData {
        key: String,
        value: String,
    },
    UpdateCloudScript {
        filename: String,
        source: String,
        publish: bool,
    },
}

impl AdminRequest {
    /// Name of the admin API operation, also the last URL path segment
    pub fn operation(&self) -> &'static str {
        match self {
            AdminRequest::AddVirtualCurrencyTypes { .. } => "AddVirtualCurrencyTypes",
            AdminRequest::SetCatalogItems { .. } => "SetCatalogItems",
            AdminRequest::UpdateRandomResultTables { .. } => "UpdateRandomResultTables",
            AdminRequest::SetStoreItems { .. } => "SetStoreItems",
            AdminRequest::SetTitleData { .. } => "SetTitleData",
            AdminRequest::UpdateCloudScript { .. } => "UpdateCloudScript",
        }
    }

    /// Short label for logs: the store id or title-data key for fan-out calls
    pub fn label(&self) -> String {
        match self {
            AdminRequest::SetStoreItems { store_id, .. } => {
                format!("{} [{}]", self.operation(), store_id)
            }
            AdminRequest::SetTitleData { key, .. } => format!("{} [{}]", self.operation(), key),
            _ => self.operation().to_string(),
        }
    }

    /// JSON request body
    pub fn body(&self) -> Value {
        match self {
            AdminRequest::AddVirtualCurrencyTypes { currencies } => json!({
                "VirtualCurrencies": currencies,
            }),
            AdminRequest::SetCatalogItems {
                catalog_version,
                items,
                set_as_default,
            } => json!({
                "CatalogVersion": catalog_version,
                "Catalog": items,
                "SetAsDefaultCatalog": set_as_default,
            }),
            AdminRequest::UpdateRandomResultTables {
                catalog_version,
                tables,
            } => json!({
                "CatalogVersion": catalog_version,
                "Tables": tables,
            }),
            AdminRequest::SetStoreItems {
                store_id,
                items,
                marketing,
                catalog_version,
            } => {
                let mut body = json!({
                    "StoreId": store_id,
                    "Store": items,
                    "CatalogVersion": catalog_version,
                });
                if let Some(marketing) = marketing {
                    body["MarketingData"] = marketing.clone();
                }
                body
            }
            AdminRequest::SetTitleData { key, value } => json!({
                "Key": key,
                "Value": value,
            }),
            AdminRequest::UpdateCloudScript {
                filename,
                source,
                publish,
            } => json!({
                "Files": [{ "Filename": filename, "FileContents": source }],
                "Publish": publish,
            }),
        }
    }
}
