//! Token Codec
//!
//! Reads claims out of compact `header.payload.signature` tokens. Signatures
//! are never checked here; the backend is trusted to have issued the token.
//!
//! Every function is fail-closed: a token that cannot be decoded is reported
//! as invalid and as expired, never as an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::{Token, TokenClaims};

const SEGMENT_COUNT: usize = 3;

/// Stateless decoder for compact tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCodec;

impl TokenCodec {
    /// Decode the payload segment into claims.
    ///
    /// Returns `None` for a wrong segment count, an undecodable payload, or a
    /// payload without a string `sub` and a numeric `exp`.
    pub fn decode(token: &Token) -> Option<TokenClaims> {
        let segments = split(token.expose())?;
        let payload = decode_segment(segments[1])?;
        serde_json::from_slice::<TokenClaims>(&payload).ok()
    }

    /// Whether the token has expired at `now`. Undecodable tokens are expired.
    pub fn is_expired(token: &Token, now: DateTime<Utc>) -> bool {
        match Self::decode(token) {
            Some(claims) => claims.exp <= now.timestamp(),
            None => true,
        }
    }

    /// Whether the token expires within `threshold` of `now`. Undecodable
    /// tokens always expire soon.
    pub fn will_expire_soon(token: &Token, threshold: Duration, now: DateTime<Utc>) -> bool {
        match Self::decode(token) {
            Some(claims) => {
                let threshold = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
                claims.seconds_until_expiry(now) <= threshold
            }
            None => true,
        }
    }

    /// Check segment count and that header and payload are base64.
    ///
    /// The signature segment is accepted as-is.
    pub fn validate_structure(token: &Token) -> bool {
        match split(token.expose()) {
            Some(segments) => segments[..2]
                .iter()
                .all(|s| decode_segment(s).map(|b| !b.is_empty()).unwrap_or(false)),
            None => false,
        }
    }

    /// Identity carried by the token; same rules as [`TokenCodec::decode`].
    pub fn extract_identity(token: &Token) -> Option<TokenClaims> {
        Self::decode(token)
    }
}

fn split(raw: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = raw.trim().split('.').collect();
    if segments.len() != SEGMENT_COUNT {
        return None;
    }
    Some(segments)
}

/// Base64 decode accepting both alphabets, with or without padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()
}


#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_decode_valid_token() {
        let token = token_for("operador1", 3600);
        let claims = TokenCodec::decode(&token).unwrap();
        assert_eq!(claims.sub, "operador1");
        assert_eq!(claims.role.as_deref(), Some("OPERADOR"));
        assert!(TokenCodec::validate_structure(&token));
    }

    #[test]
    fn test_decode_accepts_standard_alphabet_with_padding() {
        let header = STANDARD.encode(br#"{"alg":"none"}"#);
        let payload = STANDARD.encode(br#"{"sub":"a?b>","exp":4102444800}"#);
        let token = Token::new(format!("{}.{}.sig", header, payload));
        assert_eq!(TokenCodec::decode(&token).unwrap().sub, "a?b>");
    }

    #[test]
    fn test_wrong_segment_count_fails_closed() {
        let now = Utc::now();
        for raw in ["", "abc", "a.b", "a.b.c.d"] {
            let token = Token::new(raw);
            assert!(TokenCodec::decode(&token).is_none(), "{raw}");
            assert!(!TokenCodec::validate_structure(&token), "{raw}");
            assert!(TokenCodec::is_expired(&token, now), "{raw}");
            assert!(
                TokenCodec::will_expire_soon(&token, Duration::ZERO, now),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_bad_base64_payload_fails_closed() {
        let token = Token::new("eyJhbGciOiJIUzI1NiJ9.!!not-base64!!.sig");
        assert!(TokenCodec::decode(&token).is_none());
        assert!(!TokenCodec::validate_structure(&token));
        assert!(TokenCodec::is_expired(&token, Utc::now()));
    }

    #[test]
    fn test_missing_required_claims_fail_decode() {
        let no_exp = encode(&serde_json::json!({"sub": "a"}));
        let no_sub = encode(&serde_json::json!({"exp": 4102444800i64}));
        let text_exp = encode(&serde_json::json!({"sub": "a", "exp": "tomorrow"}));

        for token in [no_exp, no_sub, text_exp] {
            assert!(TokenCodec::decode(&token).is_none());
            // Structure is still fine: both segments are base64.
            assert!(TokenCodec::validate_structure(&token));
            assert!(TokenCodec::is_expired(&token, Utc::now()));
        }
    }

    #[test]
    fn test_signature_is_not_decoded() {
        let token = token_for("a", 60);
        let raw = token.expose().replace(".signature", ".%%%not*base64%%%");
        assert!(TokenCodec::validate_structure(&Token::new(raw)));
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let at_now = encode(&serde_json::json!({"sub": "a", "exp": now.timestamp()}));
        let later = encode(&serde_json::json!({"sub": "a", "exp": now.timestamp() + 1}));
        assert!(TokenCodec::is_expired(&at_now, now));
        assert!(!TokenCodec::is_expired(&later, now));
    }

    #[test]
    fn test_will_expire_soon_threshold() {
        let now = Utc::now();
        let token = encode(&serde_json::json!({"sub": "a", "exp": now.timestamp() + 120}));
        assert!(TokenCodec::will_expire_soon(&token, Duration::from_secs(120), now));
        assert!(TokenCodec::will_expire_soon(&token, Duration::from_secs(300), now));
        assert!(!TokenCodec::will_expire_soon(&token, Duration::from_secs(60), now));
    }

    #[test]
    fn test_extreme_exp_values_do_not_panic() {
        let now = Utc::now();
        let threshold = Duration::from_secs(300);

        let min = encode(&serde_json::json!({"sub": "a", "exp": i64::MIN}));
        let huge_negative = encode(&serde_json::json!({"sub": "a", "exp": -1.0e300}));
        for token in [min, huge_negative] {
            assert!(TokenCodec::decode(&token).is_some());
            assert!(TokenCodec::is_expired(&token, now));
            assert!(TokenCodec::will_expire_soon(&token, threshold, now));
        }

        let max = encode(&serde_json::json!({"sub": "a", "exp": i64::MAX}));
        assert!(!TokenCodec::is_expired(&max, now));
        assert!(!TokenCodec::will_expire_soon(&max, threshold, now));
    }

    #[test]
    fn test_extract_identity_matches_decode() {
        let token = token_for("supervisor", 10);
        assert_eq!(TokenCodec::extract_identity(&token), TokenCodec::decode(&token));
    }
}
