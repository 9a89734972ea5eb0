//! provisioner - seeds a game-backend title with its starting content

pub mod admin;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use crate::admin::{AdminClient, AdminClientConfig, AdminError, AdminRequest, AdminResponse, PlayFabAdminClient};
pub use crate::core::{Credential, PipelinePhase, ProgressSnapshot, ProvisionError, StageCatalog, STAGES};
pub use crate::core::seed::SeedData;
pub use crate::execution::{PipelineController, PipelineHandle, ProvisionEvent, StallPolicy, Throttle};
