//! Session middleware for the HTTP API
//!
//! Resolves the caller's session token and makes the [`Identity`] available to handlers
//! as a request extension. Requests without a valid token get 401.

use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use sitesync_common::Identity;

use crate::error::ApiError;
use crate::identity::{session_token, IdentityContext};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// Authentication middleware applied to every `/api` route
pub async fn session_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity: Identity = match state
        .sessions
        .resolve(session_token(&headers, query.token.as_deref()))
    {
        IdentityContext::Authenticated(identity) => identity,
        IdentityContext::Unauthenticated => {
            return Err(ApiError::Unauthenticated(
                "Valid session token required".to_string(),
            ))
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
