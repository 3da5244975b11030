//! Per-connection identity resolution
//!
//! A connection's identity is resolved once, at handshake, from its session token and
//! then passed explicitly into every broadcaster call.

use axum::http::{header, HeaderMap};
use sitesync_common::auth::verify_token;
use sitesync_common::Identity;
use tracing::{debug, warn};

/// Identity bound to a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityContext {
    Authenticated(Identity),
    Unauthenticated,
}

impl IdentityContext {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityContext::Authenticated(identity) => Some(identity),
            IdentityContext::Unauthenticated => None,
        }
    }
}

impl From<Identity> for IdentityContext {
    fn from(identity: Identity) -> Self {
        IdentityContext::Authenticated(identity)
    }
}

/// Verifies session tokens against the shared secret
#[derive(Debug, Clone)]
pub struct SessionVerifier {
    shared_secret: i64,
}

impl SessionVerifier {
    pub fn new(shared_secret: i64) -> Self {
        Self { shared_secret }
    }

    pub fn shared_secret(&self) -> i64 {
        self.shared_secret
    }

    /// Resolve a token; anything missing or invalid is `Unauthenticated`
    pub fn resolve(&self, token: Option<&str>) -> IdentityContext {
        let Some(token) = token else {
            debug!("No session token presented");
            return IdentityContext::Unauthenticated;
        };

        match verify_token(token, self.shared_secret) {
            Ok(identity) => {
                debug!(username = %identity.username, role = %identity.role, "Session verified");
                IdentityContext::Authenticated(identity)
            }
            Err(e) => {
                warn!("Session token rejected: {}", e);
                IdentityContext::Unauthenticated
            }
        }
    }
}

/// Extract a session token from `Authorization: Bearer` or the `token` query value
///
/// The header wins when both are present. Browsers cannot set headers on WebSocket
/// upgrades, hence the query fallback.
pub fn session_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or(query_token.filter(|token| !token.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use sitesync_common::auth::issue_token;
    use sitesync_common::Role;

    #[test]
    fn test_resolve_valid_token() {
        let verifier = SessionVerifier::new(77);
        let alice = Identity::new("alice", Role::User);
        let token = issue_token(&alice, 60, 77);

        assert_eq!(
            verifier.resolve(Some(&token)),
            IdentityContext::Authenticated(alice)
        );
    }

    #[test]
    fn test_resolve_missing_or_bad_token() {
        let verifier = SessionVerifier::new(77);
        assert_eq!(verifier.resolve(None), IdentityContext::Unauthenticated);
        assert_eq!(
            verifier.resolve(Some("garbage")),
            IdentityContext::Unauthenticated
        );

        let foreign = issue_token(&Identity::new("eve", Role::Admin), 60, 78);
        assert_eq!(
            verifier.resolve(Some(&foreign)),
            IdentityContext::Unauthenticated
        );
    }

    #[test]
    fn test_header_preferred_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(session_token(&headers, Some("from-query")), Some("from-header"));
        assert_eq!(session_token(&HeaderMap::new(), Some("from-query")), Some("from-query"));
        assert_eq!(session_token(&HeaderMap::new(), Some("")), None);
    }
}
