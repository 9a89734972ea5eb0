//! Provisioning error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Secret key must not be empty")]
    EmptyCredential,

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    #[error("Failed to read seed file {path}: {source}")]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {path}: {source}")]
    SeedParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Pipeline is halted: {0}")]
    Halted(String),

    #[error("Pipeline controller has stopped")]
    ControllerGone,
}
