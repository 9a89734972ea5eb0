//! Administrative client for the game backend

pub mod client;
pub mod playfab;
pub mod request;
pub mod response;

use async_trait::async_trait;
pub use client::AdminClientConfig;
pub use playfab::PlayFabAdminClient;
pub use request::{AdminRequest, RandomResultTable};
pub use response::{AdminError, AdminResponse};

use crate::core::Credential;

/// Trait for admin call execution - allows for different transports
///
/// Every provisioning stage goes through this seam; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Issue one administrative call authorized by `credential`
    async fn execute(
        &self,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError>;
}

#[async_trait]
impl<T: AdminClient + ?Sized> AdminClient for std::sync::Arc<T> {
    async fn execute(
        &self,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        (**self).execute(credential, request).await
    }
}
