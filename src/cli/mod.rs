//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, RunCommand, StagesCommand, ValidateCommand};
use std::ffi::OsString;

/// Seeds a game-backend title with its starting content
#[derive(Debug, Parser, Clone)]
#[command(name = "provisioner")]
#[command(version = "0.1.0")]
#[command(about = "Seeds a fresh game-backend title with currencies, catalog, stores, title data and Cloud Script", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to provisioning configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Provision a title
    Run(RunCommand),

    /// Validate seed data without calling the backend
    Validate(ValidateCommand),

    /// List the provisioning stages
    Stages(StagesCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
