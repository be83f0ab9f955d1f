//! Session Types
//!
//! Session snapshot, lifecycle state and the persisted credential record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Token, TokenClaims};

/// Lifecycle state of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No credentials yet.
    Unauthenticated,
    /// Login request in progress.
    Authenticating,
    /// Credentials held and usable.
    Authenticated,
    /// Refresh exchange in progress.
    Refreshing,
    /// Credentials cleared; only a new login leaves this state.
    LoggedOut,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Authenticating => "AUTHENTICATING",
            Self::Authenticated => "AUTHENTICATED",
            Self::Refreshing => "REFRESHING",
            Self::LoggedOut => "LOGGED_OUT",
        }
    }

    /// States in which authenticated calls may be issued.
    pub fn has_credentials(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Refreshing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot of the current session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub access_token: Option<Token>,
    pub refresh_token: Option<Token>,
    pub identity: Option<TokenClaims>,
    pub authenticated: bool,
}

impl Session {
    /// Snapshot of a session with no credentials.
    pub fn anonymous() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            identity: None,
            authenticated: false,
        }
    }
}

/// Composite credential record committed to the store in one write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<TokenClaims>,
    /// When the record was committed.
    pub stored_at: DateTime<Utc>,
}

impl StoredCredentials {
    /// Full record for a freshly issued token pair.
    pub fn issued(access_token: Token, refresh_token: Token, identity: TokenClaims) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            identity: Some(identity),
            stored_at: Utc::now(),
        }
    }

    /// Record with no fields set.
    pub fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            identity: None,
            stored_at: Utc::now(),
        }
    }

    /// Both tokens present and non-empty.
    pub fn is_complete(&self) -> bool {
        let present = |t: &Option<Token>| t.as_ref().map(|t| !t.is_empty()).unwrap_or(false);
        present(&self.access_token) && present(&self.refresh_token)
    }
}
