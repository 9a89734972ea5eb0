//! HTTPS admin client for the PlayFab admin API

use crate::admin::response::ApiEnvelope;
use crate::admin::{AdminClient, AdminClientConfig, AdminError, AdminRequest, AdminResponse};
use crate::core::Credential;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the title secret key
pub const SECRET_KEY_HEADER: &str = "X-SecretKey";

/// Client for the backend's `/Admin/*` endpoints
#[derive(Debug, Clone)]
pub struct PlayFabAdminClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl PlayFabAdminClient {
    /// Create a new admin client
    ///
    /// # Errors
    /// Returns `AdminError::Transport` if the HTTP client cannot be built
    /// (for example when no TLS backend is available).
    pub fn new(config: &AdminClientConfig) -> Result<Self, AdminError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdminError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Full URL of an admin operation
    pub fn url_for(&self, request: &AdminRequest) -> String {
        format!("{}/Admin/{}", self.base_url, request.operation())
    }
}

#[async_trait]
impl AdminClient for PlayFabAdminClient {
    async fn execute(
        &self,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.url_for(request);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(SECRET_KEY_HEADER, credential.expose())
            .json(&request.body())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdminError::Timeout(Duration::from_secs(self.timeout_secs))
                } else {
                    AdminError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdminError::Transport(e.to_string()))?;

        let envelope: ApiEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(AdminError::Decode(e.to_string())),
            Err(_) => {
                warn!("{} answered HTTP {} without an API envelope", request.operation(), status);
                return Err(AdminError::Api {
                    code: None,
                    error: None,
                    message: format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        body.chars().take(200).collect::<String>()
                    ),
                });
            }
        };

        let result = envelope.into_result();
        if let Err(e) = &result {
            warn!("{} failed: {}", request.label(), e);
        }
        result
    }
}
