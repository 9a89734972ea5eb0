//! Administrative credential

use crate::core::ProvisionError;
use std::fmt;

/// Title secret key authorizing every provisioning call
///
/// The value is never printed; `Debug` and `Display` redact it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret key, rejecting an empty one
    pub fn new(secret: impl Into<String>) -> Result<Self, ProvisionError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ProvisionError::EmptyCredential);
        }
        Ok(Self(secret))
    }

    /// The raw secret, for the transport layer only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}
