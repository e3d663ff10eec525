use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{clear_session_cookie, set_session_cookie},
    middleware::{auth::session_token, CsrfToken, CurrentUser},
    models::{
        user::{SigninRequest, SignupRequest, UserResponse},
        CsrfTokenResponse, MessageResponse,
    },
    state::AppState,
};

/// Registers an account and signs it in.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state.users.create(&payload.email, &payload.password).await?;
    let token = state.sessions.create(user.id).await?;

    Ok((
        StatusCode::CREATED,
        set_session_cookie(&state, &token),
        Json(UserResponse::from(user)),
    ))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;
    let token = state.sessions.create(user.id).await?;
    tracing::info!(user_id = %user.id, "user signed in");

    Ok((
        set_session_cookie(&state, &token),
        Json(UserResponse::from(user)),
    ))
}

/// Deletes the caller's session, if any, and clears the cookie.
pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = session_token(&headers) {
        state.sessions.delete(&token).await?;
    }

    Ok((
        clear_session_cookie(&state),
        Json(MessageResponse::new("Signed out")),
    ))
}

pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

pub async fn csrf_token(
    Extension(CsrfToken(token)): Extension<CsrfToken>,
) -> Json<CsrfTokenResponse> {
    Json(CsrfTokenResponse { csrf_token: token })
}
