//! Stage descriptors

use serde::Serialize;
use std::fmt;

/// Identifies a provisioning stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKey {
    Currency,
    Catalog,
    DropTable,
    Store,
    TitleData,
    CloudScript,
}

impl StageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKey::Currency => "currency",
            StageKey::Catalog => "catalog",
            StageKey::DropTable => "droptable",
            StageKey::Store => "store",
            StageKey::TitleData => "titledata",
            StageKey::CloudScript => "cloudscript",
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage's work is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// One call carrying the whole payload
    Single,
    /// N independent calls spaced by the throttle interval
    FanOut,
}

/// Static description of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    pub key: StageKey,
    pub title: &'static str,
    pub kind: StageKind,
    /// Page of the backend console showing what the stage created
    pub console_path: &'static str,
}

/// The provisioning stages, in dispatch order
///
/// Stores reference catalog items, so currencies and catalog come first.
pub const STAGES: [StageDescriptor; 6] = [
    StageDescriptor {
        key: StageKey::Currency,
        title: "currencies",
        kind: StageKind::Single,
        console_path: "economy/currency",
    },
    StageDescriptor {
        key: StageKey::Catalog,
        title: "catalog items",
        kind: StageKind::Single,
        console_path: "economy/catalogs/TWFpbg%3d%3d/items",
    },
    StageDescriptor {
        key: StageKey::DropTable,
        title: "drop tables",
        kind: StageKind::Single,
        console_path: "economy/catalogs/TWFpbg%3d%3d/drop-tables",
    },
    StageDescriptor {
        key: StageKey::Store,
        title: "stores",
        kind: StageKind::FanOut,
        console_path: "economy/catalogs/TWFpbg%3d%3d/stores",
    },
    StageDescriptor {
        key: StageKey::TitleData,
        title: "title data",
        kind: StageKind::FanOut,
        console_path: "content/title-data",
    },
    StageDescriptor {
        key: StageKey::CloudScript,
        title: "Cloud Script",
        kind: StageKind::Single,
        console_path: "automation/cloud-script/revisions",
    },
];

/// Base URL of the backend's web console
pub const CONSOLE_BASE_URL: &str = "https://developer.playfab.com/en-us/r/t";

/// Descriptor at `index`, or `None` past the last stage
pub fn stage_at(index: usize) -> Option<&'static StageDescriptor> {
    STAGES.get(index)
}

/// Console pages listing what a run creates, one per stage
///
/// Catalog pages point at the default catalog ("Main", base64 in the path).
pub fn title_links(title_id: &str) -> Vec<(&'static str, String)> {
    STAGES
        .iter()
        .map(|stage| {
            (
                stage.title,
                format!("{}/{}/{}", CONSOLE_BASE_URL, title_id, stage.console_path),
            )
        })
        .collect()
}
