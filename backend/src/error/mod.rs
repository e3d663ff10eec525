use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::utils::token::TokenError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Failures reported by the persistent stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint (token hash or email) rejected the write.
    #[error("unique constraint violated")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique_violation {
            StoreError::Duplicate
        } else {
            StoreError::Database(err)
        }
    }
}

/// Outcomes of the credential and session services.
///
/// `NotFound`, `Expired`, `InvalidCredentials`, `EmailTaken` and
/// `WeakPassword` are expected, user-facing results. The remaining variants
/// are operational failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential not found")]
    NotFound,
    #[error("token expired")]
    Expired,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address is already registered")]
    EmailTaken,
    #[error("password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
    #[error("{context}: {source}")]
    Delivery {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("token generation: {0}")]
    Token(#[from] TokenError),
    #[error("password hashing: {0}")]
    PasswordHash(#[source] anyhow::Error),
    #[error("reset link: {0}")]
    ResetLink(#[from] url::ParseError),
    #[error("token lifetime does not fit the calendar")]
    LifetimeOutOfRange,
}

impl AuthError {
    /// True for failures that must reach operational logging.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            AuthError::Storage(_)
                | AuthError::Delivery { .. }
                | AuthError::Token(_)
                | AuthError::PasswordHash(_)
                | AuthError::ResetLink(_)
                | AuthError::LifetimeOutOfRange
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage(err.into())
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "UNAUTHORIZED".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN".to_string(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound | AuthError::Expired => {
                tracing::debug!(outcome = %err, "credential rejected");
                AppError::BadRequest("Invalid or expired token".to_string())
            }
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::EmailTaken => {
                AppError::Conflict("Email address is already registered".to_string())
            }
            AuthError::WeakPassword { .. } => {
                AppError::Validation(vec![format!("password: {}", err)])
            }
            other => AppError::InternalServerError(other.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn app_error_into_response_maps_status_and_body() {
        let response = AppError::BadRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "bad");
        assert_eq!(json["code"], "BAD_REQUEST");

        let response = AppError::Unauthorized("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");

        let response = AppError::Forbidden("denied".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn expired_and_missing_tokens_share_one_response_shape() {
        let missing = AppError::from(AuthError::NotFound).into_response();
        let expired = AppError::from(AuthError::Expired).into_response();
        assert_eq!(missing.status(), expired.status());
        assert_eq!(response_json(missing).await, response_json(expired).await);
    }

    #[tokio::test]
    async fn storage_failures_are_reported_generically() {
        let err = AuthError::Storage(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert!(err.is_operational());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json["details"].is_null());
    }

    #[test]
    fn delivery_errors_carry_context() {
        let err = AuthError::Delivery {
            context: "forgot password email",
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.to_string(), "forgot password email: connection refused");
        assert!(err.is_operational());
        assert!(!AuthError::NotFound.is_operational());
        assert!(!AuthError::Expired.is_operational());
    }

    #[tokio::test]
    async fn weak_password_is_a_validation_error() {
        let response = AppError::from(AuthError::WeakPassword { min_length: 8 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(
            json["details"]["errors"][0],
            "password: password must be at least 8 characters"
        );
    }

    #[test]
    fn non_unique_database_errors_stay_database_errors() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn app_error_validation_includes_details() {
        let response = AppError::Validation(vec!["field: invalid".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["errors"][0], "field: invalid");
    }
}
