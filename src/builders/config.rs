//! Configuration Builder
//!
//! Fluent builder for the authenticated client configuration.

use std::time::Duration;
use url::Url;

use crate::error::ConfigurationError;
use crate::types::{
    AuthClientConfig, AuthEndpoints, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_TIMEOUT_MS,
    MAX_REFRESH_RETRIES,
};

/// Authenticated client configuration builder.
#[derive(Default)]
pub struct AuthClientConfigBuilder {
    base_url: Option<String>,
    login_path: Option<String>,
    refresh_path: Option<String>,
    logout_path: Option<String>,
    timeout: Option<Duration>,
    refresh_threshold: Option<Duration>,
    max_refresh_retries: Option<u32>,
    user_agent: Option<String>,
}

impl AuthClientConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set login endpoint path.
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Set refresh endpoint path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Set logout endpoint path.
    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = Some(path.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set proactive refresh window.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = Some(threshold);
        self
    }

    /// Set consecutive refresh failures tolerated before forced logout.
    pub fn max_refresh_retries(mut self, retries: u32) -> Self {
        self.max_refresh_retries = Some(retries);
        self
    }

    /// Set user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Values already set on the builder are overwritten by the environment.
    pub fn from_env(mut self) -> Self {
        if let Ok(url) = std::env::var("TOLL_API_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Ok(val) = std::env::var("TOLL_API_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.timeout = Some(Duration::from_millis(ms));
            }
        }
        if let Ok(val) = std::env::var("TOLL_AUTH_REFRESH_THRESHOLD_SECS") {
            if let Ok(secs) = val.parse() {
                self.refresh_threshold = Some(Duration::from_secs(secs));
            }
        }
        if let Ok(val) = std::env::var("TOLL_AUTH_MAX_REFRESH_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.max_refresh_retries = Some(retries);
            }
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<AuthClientConfig, ConfigurationError> {
        let raw_url = self.base_url.ok_or_else(|| ConfigurationError::MissingField {
            field: "base_url".to_string(),
        })?;

        let base_url = Url::parse(&raw_url).map_err(|e| ConfigurationError::InvalidBaseUrl {
            url: raw_url.clone(),
            message: e.to_string(),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigurationError::InvalidBaseUrl {
                url: raw_url,
                message: "scheme must be http or https".to_string(),
            });
        }

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            });
        }

        let max_refresh_retries = self.max_refresh_retries.unwrap_or(MAX_REFRESH_RETRIES);
        if max_refresh_retries == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "max_refresh_retries must allow at least one attempt".to_string(),
            });
        }

        let defaults = AuthEndpoints::default();

        Ok(AuthClientConfig {
            base_url,
            endpoints: AuthEndpoints {
                login: self.login_path.unwrap_or(defaults.login),
                refresh: self.refresh_path.unwrap_or(defaults.refresh),
                logout: self.logout_path.unwrap_or(defaults.logout),
            },
            timeout,
            refresh_threshold: self
                .refresh_threshold
                .unwrap_or(Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS)),
            max_refresh_retries,
            user_agent: self.user_agent,
        })
    }
}

/// Create a new configuration builder.
pub fn auth_client_config() -> AuthClientConfigBuilder {
    AuthClientConfigBuilder::new()
}
