//! Auth Error Types
//!
//! Closed error taxonomy for the authenticated request layer. Every failure that
//! leaves this crate is one of the [`AuthError`] variants, so callers can match
//! exhaustively instead of inspecting a type string.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the authenticated request layer.
///
/// Cloneable because one refresh outcome settles every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    /// `timeout` is the client-side deadline that elapsed; `None` when the
    /// backend reported the timeout (HTTP 408 or a `TIMEOUT_ERROR` body).
    #[error("Request timeout{}", describe_deadline(.timeout))]
    Timeout { timeout: Option<Duration> },

    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Token expired: {message}")]
    TokenExpired { message: String },

    #[error("Parsing error: {message}")]
    Parsing { message: String },

    #[error("Unknown error: {message}")]
    Unknown { status: Option<u16>, message: String },
}

/// Taxonomy member of an [`AuthError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    InvalidCredentials,
    AccessDenied,
    Server,
    ServiceUnavailable,
    TokenExpired,
    Parsing,
    Unknown,
}

impl ErrorKind {
    /// Wire/telemetry code of this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Server => "SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::Parsing => "PARSING_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Parse a wire code back into a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "VALIDATION_ERROR" => Self::Validation,
            "NETWORK_ERROR" => Self::Network,
            "TIMEOUT_ERROR" => Self::Timeout,
            "INVALID_CREDENTIALS" => Self::InvalidCredentials,
            "ACCESS_DENIED" => Self::AccessDenied,
            "SERVER_ERROR" => Self::Server,
            "SERVICE_UNAVAILABLE" => Self::ServiceUnavailable,
            "TOKEN_EXPIRED" => Self::TokenExpired,
            "PARSING_ERROR" => Self::Parsing,
            "UNKNOWN_ERROR" => Self::Unknown,
            _ => return None,
        };
        Some(kind)
    }
}

impl AuthError {
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::TokenExpired {
            message: message.into(),
        }
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        Self::Parsing {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Client-side deadline of `timeout` elapsed.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout: Some(timeout),
        }
    }

    /// Taxonomy member of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Server { .. } => ErrorKind::Server,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Self::TokenExpired { .. } => ErrorKind::TokenExpired,
            Self::Parsing { .. } => ErrorKind::Parsing,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Get error code for telemetry.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// HTTP status associated with the error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::InvalidCredentials { .. } | Self::TokenExpired { .. } => Some(401),
            Self::AccessDenied { .. } => Some(403),
            Self::Server { status, .. } | Self::ServiceUnavailable { status, .. } => Some(*status),
            Self::Unknown { status, .. } => *status,
            Self::Network { .. } | Self::Timeout { .. } | Self::Parsing { .. } => None,
        }
    }

    /// Transient failures the caller may retry on its own.
    ///
    /// This layer never retries them itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::ServiceUnavailable { .. }
        )
    }

    /// Check if error requires re-authentication.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired { .. } | Self::InvalidCredentials { .. }
        )
    }
}

/// Store failure modes a [`CredentialStore`](crate::token::CredentialStore)
/// implementation reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Record of {size} bytes exceeds store capacity of {limit} bytes")]
    CapacityExceeded { size: usize, limit: usize },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Unknown {
            status: None,
            message: format!("credential store: {}", err),
        }
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Structured error body returned by the backend.
///
/// The backend answers failures with the same envelope it uses for success
/// (`success: false` plus `message` and `status`); some endpoints also carry a
/// taxonomy code in `type`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default, rename = "type", alias = "code")]
    pub error_type: Option<String>,
}

impl ApiErrorBody {
    fn is_meaningful(&self) -> bool {
        self.message.is_some() || self.error_type.is_some()
    }
}

/// Whether a 401 arrived on a call that carried session credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedContext {
    /// Login or other unauthenticated call: 401 means bad credentials.
    Login,
    /// Authenticated call: 401 means the session token is no longer accepted.
    Session,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<ApiErrorBody> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .filter(ApiErrorBody::is_meaningful)
}

/// Create error from HTTP response.
pub fn create_error_from_response(
    status: u16,
    body: &str,
    context: UnauthorizedContext,
) -> AuthError {
    let parsed = parse_error_response(body);
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| default_status_message(status));

    if let Some(kind) = parsed
        .as_ref()
        .and_then(|b| b.error_type.as_deref())
        .and_then(ErrorKind::from_code)
    {
        return error_of_kind(kind, status, message);
    }

    let kind = match status {
        400 | 422 => ErrorKind::Validation,
        401 => match context {
            UnauthorizedContext::Login => ErrorKind::InvalidCredentials,
            UnauthorizedContext::Session => ErrorKind::TokenExpired,
        },
        403 => ErrorKind::AccessDenied,
        408 => ErrorKind::Timeout,
        502..=504 => ErrorKind::ServiceUnavailable,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    };

    error_of_kind(kind, status, message)
}

fn error_of_kind(kind: ErrorKind, status: u16, message: String) -> AuthError {
    match kind {
        ErrorKind::Validation => AuthError::Validation { message },
        ErrorKind::Network => AuthError::Network { message },
        ErrorKind::Timeout => AuthError::Timeout { timeout: None },
        ErrorKind::InvalidCredentials => AuthError::InvalidCredentials { message },
        ErrorKind::AccessDenied => AuthError::AccessDenied { message },
        ErrorKind::Server => AuthError::Server { status, message },
        ErrorKind::ServiceUnavailable => AuthError::ServiceUnavailable { status, message },
        ErrorKind::TokenExpired => AuthError::TokenExpired { message },
        ErrorKind::Parsing => AuthError::Parsing { message },
        ErrorKind::Unknown => AuthError::Unknown {
            status: Some(status),
            message,
        },
    }
}

fn describe_deadline(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(timeout) => format!(" after {:?}", timeout),
        None => " reported by server".to_string(),
    }
}

fn default_status_message(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &AuthError) -> String {
    match error {
        AuthError::TokenExpired { .. } => {
            "Your session has expired. Please sign in again.".to_string()
        }
        AuthError::InvalidCredentials { .. } => {
            "The username or password is incorrect.".to_string()
        }
        AuthError::AccessDenied { .. } => {
            "You do not have permission to perform this action.".to_string()
        }
        AuthError::Validation { message } => message.clone(),
        AuthError::Timeout { .. } => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        AuthError::Network { .. } => {
            "Unable to reach the server. Please check your connection.".to_string()
        }
        AuthError::Server { .. } | AuthError::ServiceUnavailable { .. } => {
            "The service is temporarily unavailable. Please try again later.".to_string()
        }
        AuthError::Parsing { .. } | AuthError::Unknown { .. } => {
            "An unexpected error occurred. Please try again.".to_string()
        }
    }
}
