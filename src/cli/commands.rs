//! CLI command definitions

use crate::core::config::ProvisionConfig;
use clap::Args;
use std::path::PathBuf;

/// Provision a title
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Title to provision (overrides the config file)
    #[arg(short, long)]
    pub title_id: Option<String>,

    /// Secret key of the title
    #[arg(long, env = "PROVISION_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Directory holding the seed JSON files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Catalog version to upload into
    #[arg(long)]
    pub catalog_version: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Exit on the first error instead of prompting
    #[arg(long)]
    pub non_interactive: bool,
}

impl RunCommand {
    /// Apply command-line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut ProvisionConfig) {
        if let Some(title_id) = &self.title_id {
            config.title_id = title_id.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(version) = &self.catalog_version {
            config.catalog_version = version.clone();
        }
    }
}

/// Validate seed data
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Directory holding the seed JSON files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the provisioning stages
#[derive(Debug, Args, Clone)]
pub struct StagesCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Title to filter by
    #[arg(short, long)]
    pub title_id: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run by ID
    #[arg(long)]
    pub run_id: Option<String>,
}
