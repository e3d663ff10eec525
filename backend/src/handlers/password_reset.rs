use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    error::{AppError, AuthError},
    handlers::set_session_cookie,
    models::{
        password_reset::{ForgotPasswordRequest, ResetPasswordRequest},
        user::UserResponse,
        MessageResponse,
    },
    state::AppState,
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If that address is registered, a password reset link is on its way.";

/// Accepts a reset request. The answer is the same whether or not the
/// address is registered, and the lookup and delivery run after the
/// response so its latency reveals nothing either.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let resets = state.password_resets.clone();
    let base_url = state.config.app_base_url.clone();
    tokio::spawn(async move {
        match resets.request_reset(&payload.email, &base_url).await {
            Ok(()) => {}
            Err(AuthError::NotFound) => {
                tracing::debug!("password reset requested for an unknown address");
            }
            Err(err) => {
                tracing::error!(error = %err, "password reset request failed");
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)),
    ))
}

/// Redeems a reset token, sets the new password and signs the user in with
/// a fresh session. All earlier sessions are revoked.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state
        .password_resets
        .complete_reset(&payload.token, &payload.new_password)
        .await?;
    let token = state.sessions.create(user.id).await?;

    Ok((
        set_session_cookie(&state, &token),
        Json(UserResponse::from(user)),
    ))
}
