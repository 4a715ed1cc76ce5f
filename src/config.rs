//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use crate::error::ApiError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the gateway and streaming channel.
///
/// `base_url` includes the API prefix (e.g. `http://host:8000/api`). Both
/// timeouts bound every remote call so a hung authority degrades into a
/// transport failure instead of stalling the navigation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    /// Build a config with default timeouts for the given base URL.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Build typed client config from environment variables.
    ///
    /// Required:
    /// - `TICKERDESK_API_URL`: base URL including the API prefix
    ///
    /// Optional:
    /// - `TICKERDESK_REQUEST_TIMEOUT_SECS`: default 60
    /// - `TICKERDESK_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] when `TICKERDESK_API_URL` is not set.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = std::env::var("TICKERDESK_API_URL")
            .map_err(|_| ApiError::Config("TICKERDESK_API_URL not set".to_string()))?;
        let mut config = Self::new(&base_url);
        config.request_timeout_secs = env_parse_u64("TICKERDESK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);
        config.connect_timeout_secs = env_parse_u64("TICKERDESK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS);
        Ok(config)
    }

    /// Absolute URL for an endpoint path (`path` starts with `/`).
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
