//! Wire Types
//!
//! Request and response bodies of the login, refresh and logout endpoints.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::types::Token;

/// Body of `POST /login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Body of `POST /refresh`.
#[derive(Clone, Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: Token,
}

/// Token pair issued by login and refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub bearer: Token,
    pub refresh: Token,
}

/// Envelope shared by the login and refresh endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<TokenPair>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}
