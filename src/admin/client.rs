//! Admin client configuration

/// Configuration for the admin client
#[derive(Debug, Clone)]
pub struct AdminClientConfig {
    /// Title whose admin API is called
    pub title_id: String,

    /// Base URL override
    ///
    /// When unset, requests go to `https://{title_id}.playfabapi.com`.
    pub endpoint: Option<String>,

    /// Timeout for a single HTTP request in seconds
    pub timeout_secs: u64,
}

impl Default for AdminClientConfig {
    fn default() -> Self {
        Self {
            title_id: String::new(),
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

impl AdminClientConfig {
    pub fn new(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.playfabapi.com", self.title_id),
        }
    }
}
