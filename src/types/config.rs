//! Configuration Types
//!
//! Authenticated client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::AuthError;

/// Default configuration values.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
pub const MAX_REFRESH_RETRIES: u32 = 2;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_REFRESH_PATH: &str = "/refresh";
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";

/// Authenticated client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthClientConfig {
    /// Backend base URL; request paths are resolved against it.
    pub base_url: Url,
    /// Endpoint paths.
    pub endpoints: AuthEndpoints,
    /// Per-request timeout unless a call overrides it.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Refresh proactively when the access token expires within this window.
    #[serde(with = "duration_secs")]
    pub refresh_threshold: Duration,
    /// Consecutive failed refresh attempts tolerated before forced logout.
    pub max_refresh_retries: u32,
    /// User agent sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AuthClientConfig {
    /// Resolve a request path against the base URL.
    ///
    /// Paths are appended to the base path so a base of `https://host/api`
    /// and a path of `/cuentas` yield `https://host/api/cuentas`.
    pub fn resolve(&self, path: &str) -> Result<Url, AuthError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| AuthError::Validation {
                message: format!("invalid request URL {}: {}", path, e),
            });
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path)).map_err(|e| AuthError::Validation {
            message: format!("invalid request path {}: {}", path, e),
        })
    }

    /// Whether `url` shares scheme, host and port with the base URL.
    pub fn is_backend_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }
}

/// Endpoint paths of the auth API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_PATH.to_string(),
            refresh: DEFAULT_REFRESH_PATH.to_string(),
            logout: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
