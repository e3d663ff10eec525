pub mod password_reset;
pub mod users;

use axum::{
    http::{header::SET_COOKIE, HeaderName},
    response::AppendHeaders,
};

use crate::{
    state::AppState,
    utils::cookies::{build_clear_cookie, build_session_cookie, SESSION_COOKIE_NAME},
};

type CookieHeader = AppendHeaders<[(HeaderName, String); 1]>;

/// `Set-Cookie` carrying a freshly issued session token.
pub(crate) fn set_session_cookie(state: &AppState, token: &str) -> CookieHeader {
    let max_age = state
        .sessions
        .ttl()
        .and_then(|ttl| ttl.to_std().ok());
    let cookie = build_session_cookie(token, max_age, state.config.cookie_options());
    AppendHeaders([(SET_COOKIE, cookie)])
}

pub(crate) fn clear_session_cookie(state: &AppState) -> CookieHeader {
    let cookie = build_clear_cookie(SESSION_COOKIE_NAME, state.config.cookie_options());
    AppendHeaders([(SET_COOKIE, cookie)])
}
