use std::time::Duration;

use crate::errors::ProviderError;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CEREBRAS_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai";

/// Configuration for the Cerebras provider client.
#[derive(Clone, Debug)]
pub struct CerebrasConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Default HTTP timeout for a whole streamed request.
    pub timeout: Duration,
}

impl CerebrasConfig {
    /// Creates a config with default endpoint and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Builds a config from `CEREBRAS_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ProviderError::config(
                "cerebras",
                format!("{API_KEY_ENV} is not configured"),
            ));
        }
        Ok(Self::new(api_key))
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let config = CerebrasConfig::new("k").base_url("http://localhost:9000/");
        assert_eq!(
            config.completions_url(),
            "http://localhost:9000/v1/chat/completions"
        );
    }
}
