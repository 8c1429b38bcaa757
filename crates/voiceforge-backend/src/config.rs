//! Configuration for the HTTP speech backend.

use std::time::Duration;

use voiceforge_core::{Settings, UNIT_REQUEST_TIMEOUT};

/// Configuration for [`HttpSpeechBackend`](crate::HttpSpeechBackend).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use voiceforge_backend::BackendConfig;
///
/// let config = BackendConfig::new()
///     .with_base_url("http://tts.local:5050")
///     .with_max_retries(1)
///     .with_backoff_factor(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the synthesis service, without a trailing slash
    pub(crate) base_url: String,
    /// Path of the speech endpoint
    pub(crate) endpoint: String,
    /// Path of the model listing endpoint
    pub(crate) models_endpoint: String,
    /// Token used when a call does not carry its own key
    pub(crate) token: Option<String>,
    /// Timeout for a single synthesis request
    pub(crate) request_timeout: Duration,
    /// Timeout for establishing a connection
    pub(crate) connect_timeout: Duration,
    /// Timeout for the model listing request
    pub(crate) models_timeout: Duration,
    /// Transport-level retries for transient failures
    pub(crate) max_retries: u8,
    /// Base delay for exponential backoff
    pub(crate) backoff_factor: Duration,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5050".to_string(),
            endpoint: "/v1/audio/speech".to_string(),
            models_endpoint: "/models".to_string(),
            token: None,
            request_timeout: UNIT_REQUEST_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            models_timeout: Duration::from_secs(10),
            max_retries: 2,
            backoff_factor: Duration::from_secs(1),
            user_agent: concat!("voiceforge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl BackendConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a configuration from process settings.
    ///
    /// A blank default API key leaves the token unset.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let token = Some(settings.default_api_key.clone()).filter(|key| !key.is_empty());
        Self::new()
            .with_base_url(settings.api_base_url.clone())
            .with_endpoint(settings.api_endpoint.clone())
            .with_models_endpoint(settings.models_endpoint.clone())
            .with_optional_token(token)
    }

    /// Set the base URL. A trailing slash is stripped.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the speech endpoint path.
    ///
    /// Defaults to `/v1/audio/speech`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model listing endpoint path.
    ///
    /// Defaults to `/models`.
    #[must_use]
    pub fn with_models_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.models_endpoint = endpoint.into();
        self
    }

    /// Set the fallback bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set an optional fallback bearer token.
    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the timeout for one synthesis request.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout for the model listing request.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub const fn with_models_timeout(mut self, timeout: Duration) -> Self {
        self.models_timeout = timeout;
        self
    }

    /// Set the number of transport-level retries.
    ///
    /// Defaults to 2.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff factor. Retry `n` waits `factor * 2^(n-1)`.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub const fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Wait before transport retry `retry` (1-based).
    pub(crate) fn backoff(&self, retry: u8) -> Duration {
        self.backoff_factor * 2u32.pow(u32::from(retry.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BackendConfig::new();
        assert_eq!(config.base_url, "http://127.0.0.1:5050");
        assert_eq!(config.endpoint, "/v1/audio/speech");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.models_timeout, Duration::from_secs(10));
        assert!(config.token.is_none());
        assert_eq!(config.max_retries, 2);
        assert!(config.user_agent.starts_with("voiceforge/"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = BackendConfig::new()
            .with_base_url("http://tts.local:9000/")
            .with_endpoint("/speak")
            .with_token("secret")
            .with_max_retries(4);

        assert_eq!(config.base_url, "http://tts.local:9000");
        assert_eq!(config.endpoint, "/speak");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.max_retries, 4);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = BackendConfig::new();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            api_base_url: "http://upstream:5050".to_string(),
            default_api_key: String::new(),
            ..Settings::default()
        };
        let config = BackendConfig::from_settings(&settings);
        assert_eq!(config.base_url, "http://upstream:5050");
        assert!(config.token.is_none());

        let settings = Settings {
            default_api_key: "sk-1".to_string(),
            ..Settings::default()
        };
        let config = BackendConfig::from_settings(&settings);
        assert_eq!(config.token.as_deref(), Some("sk-1"));
    }
}
