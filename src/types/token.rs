//! Token Types
//!
//! Compact bearer/refresh token wrapper.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Compact three-segment token (`header.payload.signature`).
///
/// The value is held as a secret and redacted from `Debug` output.
#[derive(Clone)]
pub struct Token {
    value: SecretString,
}

impl Token {
    /// Wrap a raw token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::new(value.into()),
        }
    }

    /// Raw token value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Token {}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Token").field(&"[REDACTED]").finish()
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Token::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = Token::new("aaa.bbb.ccc");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("aaa"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_authorization_header() {
        let token = Token::new("aaa.bbb.ccc");
        assert_eq!(token.authorization_header(), "Bearer aaa.bbb.ccc");
    }

    #[test]
    fn test_serde_is_plain_string() {
        let token: Token = serde_json::from_str(r#""aaa.bbb.ccc""#).unwrap();
        assert_eq!(token.expose(), "aaa.bbb.ccc");
        assert_eq!(serde_json::to_string(&token).unwrap(), r#""aaa.bbb.ccc""#);
    }
}
