//! Token Claims
//!
//! Identity claims read from the payload segment of an access token.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Claims decoded from a token payload.
///
/// Claims are derived data: a new token yields a new value and the previous one
/// is dropped, never patched in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (username).
    pub sub: String,
    /// Expiry as epoch seconds.
    #[serde(deserialize_with = "deserialize_epoch_seconds")]
    pub exp: i64,
    /// Issued-at as epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered permission list.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Additional claims.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Expiry as a timestamp. Out-of-range values clamp to "already expired".
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Seconds until expiry relative to `now`; negative once expired.
    /// Saturates for `exp` values at the edges of the `i64` range.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.exp.saturating_sub(now.timestamp())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(role))
            .unwrap_or(false)
    }

    /// Human-readable name, falling back to the subject.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }

        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();

        if parts.is_empty() {
            self.sub.clone()
        } else {
            parts.join(" ")
        }
    }
}

fn deserialize_epoch_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(secs) = value.as_i64() {
        return Ok(secs);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.floor() as i64)
        .ok_or_else(|| serde::de::Error::custom("exp is not a representable number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(json: serde_json::Value) -> TokenClaims {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_minimal_claims() {
        let c = claims(serde_json::json!({"sub": "operador1", "exp": 1700000000}));
        assert_eq!(c.sub, "operador1");
        assert_eq!(c.exp, 1700000000);
        assert!(c.permissions.is_empty());
        assert_eq!(c.display_name(), "operador1");
    }

    #[test]
    fn test_fractional_exp_is_floored() {
        let c = claims(serde_json::json!({"sub": "a", "exp": 1700000000.9}));
        assert_eq!(c.exp, 1700000000);
    }

    #[test]
    fn test_string_exp_is_rejected() {
        let result: Result<TokenClaims, _> =
            serde_json::from_value(serde_json::json!({"sub": "a", "exp": "soon"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_permissions_keep_order() {
        let c = claims(serde_json::json!({
            "sub": "admin",
            "exp": 1,
            "role": "ADMIN",
            "permissions": ["peajes.ver", "cuentas.editar", "usuarios.crear"]
        }));
        assert_eq!(c.permissions, vec!["peajes.ver", "cuentas.editar", "usuarios.crear"]);
        assert!(c.has_permission("cuentas.editar"));
        assert!(!c.has_permission("cuentas.borrar"));
        assert!(c.has_role("admin"));
    }

    #[test]
    fn test_display_name_from_parts() {
        let c = claims(serde_json::json!({
            "sub": "jperez",
            "exp": 1,
            "given_name": "Juan",
            "family_name": "Perez"
        }));
        assert_eq!(c.display_name(), "Juan Perez");
    }

    #[test]
    fn test_expires_at() {
        let c = claims(serde_json::json!({"sub": "a", "exp": 1700000000}));
        assert_eq!(c.expires_at().timestamp(), 1700000000);

        let far = claims(serde_json::json!({"sub": "a", "exp": i64::MAX}));
        assert_eq!(far.expires_at(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_seconds_until_expiry_saturates() {
        let now = Utc::now();
        let past = claims(serde_json::json!({"sub": "a", "exp": i64::MIN}));
        assert_eq!(past.seconds_until_expiry(now), i64::MIN);

        let huge_negative = claims(serde_json::json!({"sub": "a", "exp": -1.0e300}));
        assert_eq!(huge_negative.exp, i64::MIN);
        assert!(huge_negative.seconds_until_expiry(now) < 0);

        let future = claims(serde_json::json!({"sub": "a", "exp": i64::MAX}));
        assert!(future.seconds_until_expiry(now) > 0);
    }

    #[test]
    fn test_unknown_claims_are_kept() {
        let c = claims(serde_json::json!({"sub": "a", "exp": 1, "plaza": "Norte"}));
        assert_eq!(c.extra.get("plaza"), Some(&serde_json::json!("Norte")));
    }
}
