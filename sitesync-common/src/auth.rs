//! Session token signing and verification
//!
//! Credentials are checked elsewhere; this module only issues and verifies the
//! session tokens that carry an already-authenticated identity to the hub.
//!
//! # Token format
//!
//! `<claims>.<hash>` where
//! - `claims` is the canonical JSON of [`SessionClaims`], base64url (no padding)
//! - `hash` is SHA-256 (64 hex chars) of the canonical JSON followed by the shared
//!   secret as a decimal i64 string
//!
//! A shared secret of `0` disables signature checking (development mode). Expiry is
//! enforced regardless.
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies; the hub wraps these in its extractors.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Identity, Role};
use crate::time::now_millis;

/// Session token validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// Token is not `<claims>.<hash>` or claims do not decode
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Hash does not match calculated value
    #[error("Invalid token signature")]
    InvalidSignature { provided: String, calculated: String },

    /// Token lifetime is over
    #[error("Token expired at {expires_at} (now {now})")]
    Expired { expires_at: i64, now: i64 },
}

/// Claims carried inside a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    pub role: Role,
    /// Unix epoch milliseconds
    pub expires_at: i64,
}

impl SessionClaims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.username.clone(), self.role)
    }
}

/// Generate a crypto-random, non-zero shared secret
pub fn generate_shared_secret() -> i64 {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    }
}

/// Calculate the SHA-256 signature of a JSON value with the shared secret
pub fn calculate_hash(json_value: &Value, shared_secret: i64) -> String {
    let canonical = to_canonical_json(json_value);
    let to_hash = format!("{}{}", canonical, shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use sitesync_common::auth::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 3, "a": 1}));
/// assert_eq!(canonical, r#"{"a":1,"z":3}"#);
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        // Display on scalar values is compact JSON with proper escaping
        scalar => scalar.to_string(),
    }
}

/// Issue a signed session token valid for `ttl_secs`
pub fn issue_token(identity: &Identity, ttl_secs: i64, shared_secret: i64) -> String {
    let claims = SessionClaims {
        username: identity.username.clone(),
        role: identity.role,
        expires_at: now_millis() + ttl_secs * 1000,
    };
    sign_claims(&claims, shared_secret)
}

/// Encode and sign arbitrary claims
pub fn sign_claims(claims: &SessionClaims, shared_secret: i64) -> String {
    let value = serde_json::json!({
        "username": claims.username,
        "role": claims.role,
        "expires_at": claims.expires_at,
    });
    let payload = URL_SAFE_NO_PAD.encode(to_canonical_json(&value));
    format!("{}.{}", payload, calculate_hash(&value, shared_secret))
}

/// Verify a session token and return the identity it carries
pub fn verify_token(token: &str, shared_secret: i64) -> Result<Identity, AuthError> {
    let (payload, provided) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| AuthError::Malformed("missing signature".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::Malformed(format!("claims not base64: {}", e)))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Malformed(format!("claims not JSON: {}", e)))?;

    // Secret 0 disables signature checking
    if shared_secret != 0 {
        let calculated = calculate_hash(&value, shared_secret);
        if provided != calculated {
            return Err(AuthError::InvalidSignature {
                provided: provided.to_string(),
                calculated,
            });
        }
    }

    let claims: SessionClaims = serde_json::from_value(value)
        .map_err(|e| AuthError::Malformed(format!("invalid claims: {}", e)))?;

    let now = now_millis();
    if claims.expires_at <= now {
        return Err(AuthError::Expired {
            expires_at: claims.expires_at,
            now,
        });
    }

    Ok(claims.identity())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: i64 = 123456789;

    #[test]
    fn test_issued_token_verifies() {
        let alice = Identity::new("alice", Role::User);
        let token = issue_token(&alice, 3600, SECRET);

        assert_eq!(verify_token(&token, SECRET), Ok(alice));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(&Identity::new("alice", Role::User), 3600, SECRET);

        assert!(matches!(
            verify_token(&token, 987654321),
            Err(AuthError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_tampered_role_rejected() {
        let token = issue_token(&Identity::new("mallory", Role::User), 3600, SECRET);
        let (_, hash) = token.split_once('.').unwrap();

        let forged = serde_json::json!({
            "username": "mallory",
            "role": "admin",
            "expires_at": now_millis() + 3_600_000,
        });
        let forged_token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(to_canonical_json(&forged)),
            hash
        );

        assert!(matches!(
            verify_token(&forged_token, SECRET),
            Err(AuthError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = SessionClaims {
            username: "alice".to_string(),
            role: Role::User,
            expires_at: now_millis() - 1,
        };
        let token = sign_claims(&claims, SECRET);

        assert!(matches!(
            verify_token(&token, SECRET),
            Err(AuthError::Expired { .. })
        ));
    }

    #[test]
    fn test_zero_secret_skips_signature_but_not_expiry() {
        let token = issue_token(&Identity::new("dev", Role::Admin), 60, SECRET);
        assert!(verify_token(&token, 0).is_ok());

        let stale = sign_claims(
            &SessionClaims {
                username: "dev".to_string(),
                role: Role::Admin,
                expires_at: 0,
            },
            0,
        );
        assert!(verify_token(&stale, 0).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(verify_token("nodot", SECRET), Err(AuthError::Malformed(_))));
        assert!(matches!(verify_token("!!!.abc", SECRET), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_canonical_json_sorting_and_escaping() {
        let json = serde_json::json!({
            "z_field": "quote\"d",
            "a_field": [1, true, null],
        });

        let canonical = to_canonical_json(&json);
        assert_eq!(canonical, r#"{"a_field":[1,true,null],"z_field":"quote\"d"}"#);
    }

    #[test]
    fn test_generated_secret_nonzero() {
        for _ in 0..100 {
            assert_ne!(generate_shared_secret(), 0);
        }
    }
}
