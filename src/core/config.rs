//! Provisioning configuration from YAML

use crate::admin::AdminClientConfig;
use crate::core::catalog::DEFAULT_CATALOG_VERSION;
use crate::execution::{StallPolicy, Throttle};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level provisioning configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Title to provision
    #[serde(default)]
    pub title_id: String,

    /// Catalog version every catalog, drop table and store call targets
    #[serde(default = "default_catalog_version")]
    pub catalog_version: String,

    /// Directory holding the seed JSON files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL override for the admin API
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Timeout for a single HTTP request (in seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub stall: StallConfig,
}

/// Dispatch spacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Spacing between the calls of one fan-out stage
    #[serde(default = "default_interval_ms")]
    pub subtask_interval_ms: u64,

    /// Wait between a stage completing and the next one starting
    #[serde(default = "default_interval_ms")]
    pub stage_settle_delay_ms: u64,
}

/// Watchdog for calls that never complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallConfig {
    /// Fail a call that has not completed after this many seconds;
    /// `null` waits forever
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: Option<u64>,
}

fn default_catalog_version() -> String {
    DEFAULT_CATALOG_VERSION.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    500
}

fn default_item_timeout() -> Option<u64> {
    Some(60)
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            subtask_interval_ms: default_interval_ms(),
            stage_settle_delay_ms: default_interval_ms(),
        }
    }
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            item_timeout_secs: default_item_timeout(),
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            title_id: String::new(),
            catalog_version: default_catalog_version(),
            data_dir: default_data_dir(),
            endpoint: None,
            request_timeout_secs: default_request_timeout(),
            throttle: ThrottleConfig::default(),
            stall: StallConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    ///
    /// The title id may still be empty here; it can come from the command
    /// line. Call `validate` once overrides are applied.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProvisionConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.title_id.is_empty() {
            anyhow::bail!("No title id configured");
        }

        let title_pattern = Regex::new(r"^[A-Za-z0-9]+$")?;
        if !title_pattern.is_match(&self.title_id) {
            anyhow::bail!("Title id '{}' must be alphanumeric", self.title_id);
        }

        if self.catalog_version.trim().is_empty() {
            anyhow::bail!("Catalog version must not be empty");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }

        if self.stall.item_timeout_secs == Some(0) {
            anyhow::bail!("stall.item_timeout_secs must be greater than zero (or null to disable)");
        }

        Ok(())
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::new(
            Duration::from_millis(self.throttle.subtask_interval_ms),
            Duration::from_millis(self.throttle.stage_settle_delay_ms),
        )
    }

    pub fn stall_policy(&self) -> StallPolicy {
        StallPolicy {
            item_timeout: self.stall.item_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn admin_client_config(&self) -> AdminClientConfig {
        let mut config =
            AdminClientConfig::new(self.title_id.clone()).with_timeout(self.request_timeout_secs);
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        config
    }
}
