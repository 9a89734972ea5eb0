//! Admin response types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Error types for admin calls
///
/// `Display` is what the operator sees; API errors pass the backend's
/// message through unchanged.
#[derive(Debug, Clone, Error)]
pub enum AdminError {
    #[error("{message}")]
    Api {
        code: Option<i64>,
        error: Option<String>,
        message: String,
    },

    #[error("Connection failed: {0}")]
    Transport(String),

    #[error("Timeout after {}", describe_limit(.0))]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    Decode(String),
}

fn describe_limit(limit: &Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{} ms", limit.as_millis())
    }
}

/// Successful admin call result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminResponse {
    /// HTTP-level status code reported in the envelope
    pub code: u16,

    /// Operation-specific result payload
    pub data: Value,
}

impl AdminResponse {
    pub fn new(data: Value) -> Self {
        Self { code: 200, data }
    }
}

/// Envelope every admin endpoint answers with
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiEnvelope {
    pub code: u16,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ApiEnvelope {
    /// Split the envelope into a result or an error
    pub(crate) fn into_result(self) -> Result<AdminResponse, AdminError> {
        if (200..300).contains(&self.code) && self.error.is_none() {
            return Ok(AdminResponse {
                code: self.code,
                data: self.data.unwrap_or(Value::Null),
            });
        }

        let message = self
            .error_message
            .or_else(|| self.error.clone())
            .or(self.status)
            .unwrap_or_else(|| format!("HTTP {}", self.code));

        Err(AdminError::Api {
            code: self.error_code,
            error: self.error,
            message,
        })
    }
}
