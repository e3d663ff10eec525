use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, AuthError},
    models::user::User,
    state::AppState,
    utils::cookies::{extract_cookie_value, SESSION_COOKIE_NAME},
};

/// The signed-in user, attached to request extensions by [`current_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| extract_cookie_value(cookies, SESSION_COOKIE_NAME))
}

/// Resolves the session cookie, if any, to a user. Requests without a valid
/// session continue anonymously; only storage failures stop them.
pub async fn current_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(request.headers()) {
        match state.sessions.user(&token).await {
            Ok(user) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Err(AuthError::NotFound) => {
                tracing::debug!("session cookie does not match an active session");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(next.run(request).await)
}

/// Guard for user-only routes. Must run inside [`current_user`].
pub async fn require_user(request: Request, next: Next) -> Result<Response, AppError> {
    if request.extensions().get::<CurrentUser>().is_none() {
        return Err(AppError::Unauthorized("Sign in required".to_string()));
    }
    Ok(next.run(request).await)
}
