//! Request-level authentication gate.
//!
//! Reads the credential from `Authorization: Bearer` or, failing that, the
//! auth cookie, verifies it, and builds the [`UserContext`] handed to every
//! protected handler. Permission and scope checks happen in the handler via
//! [`UserContext::authorize`].

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::context::UserContext;
use crate::auth::token::{SessionClaims, TokenService};
use crate::error::EisError;
use crate::web::AppState;

/// Extract the token from a `Bearer <token>` header value. The scheme is
/// matched case-insensitively.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let (scheme, token) = auth_header?.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Find and verify the session credential on a request.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    cookie_name: &str,
) -> Option<SessionClaims> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    if let Some(token) = extract_bearer_token(header) {
        return tokens.verify(token);
    }

    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(cookie_name)?;
    tokens.verify(cookie.value())
}

/// The authenticated caller. Rejects with 401 when no valid credential exists.
///
/// Use `Option<CurrentUser>` for routes that accept anonymous callers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserContext);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = EisError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = authenticate(
            &parts.headers,
            &state.tokens,
            &state.config.auth_cookie_name,
        )
        .ok_or(EisError::Unauthenticated)?;

        Ok(CurrentUser(UserContext::from_claims(&claims)))
    }
}
