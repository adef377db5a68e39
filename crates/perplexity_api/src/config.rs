use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_BASE_URL;

/// Transport configuration for Perplexity API requests.
#[derive(Debug, Clone)]
pub struct PerplexityApiConfig {
    /// Bearer token passed to `Authorization`.
    pub api_token: String,
    /// Base URL for the completions endpoint.
    pub base_url: String,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional connect timeout. Streaming bodies are long-lived, so no total
    /// request timeout is applied.
    pub connect_timeout: Option<Duration>,
}

impl Default for PerplexityApiConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            extra_headers: BTreeMap::new(),
            connect_timeout: None,
        }
    }
}

impl PerplexityApiConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
