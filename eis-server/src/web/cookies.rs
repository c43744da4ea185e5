use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::auth::token::{REFRESH_TTL_SECONDS, SESSION_TTL_SECONDS};

/// Refresh credentials are only ever sent to the auth routes.
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Create session cookie.
pub(super) fn session_cookie(name: &str, token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(SESSION_TTL_SECONDS))
        .build()
}

/// Create refresh cookie.
pub(super) fn refresh_cookie(name: &str, token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(REFRESH_COOKIE_PATH)
        .max_age(Duration::seconds(REFRESH_TTL_SECONDS))
        .build()
}

/// Create removal cookie for session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Create removal cookie for refresh.
pub(super) fn clear_refresh_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path(REFRESH_COOKIE_PATH)
        .max_age(Duration::ZERO)
        .build()
}
