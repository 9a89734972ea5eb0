//! Core domain models for provisioning
//!
//! This module defines the stages, the seed content they upload, and the
//! state of a provisioning run.

pub mod catalog;
pub mod config;
pub mod credential;
pub mod error;
pub mod progress;
pub mod seed;
pub mod stage;
pub mod state;

pub use catalog::*;
pub use credential::*;
pub use error::*;
pub use progress::*;
pub use stage::*;
pub use state::*;
