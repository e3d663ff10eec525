//! Models for password reset functionality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{PasswordResetId, UserId};

#[derive(Debug, Clone, FromRow)]
/// Database representation of a password reset token.
pub struct PasswordReset {
    /// Unique identifier for the password reset record.
    pub id: PasswordResetId,
    /// User ID associated with this reset token.
    pub user_id: UserId,
    /// SHA-256 hash of the reset token; the raw token is never stored.
    pub token_hash: String,
    /// Timestamp when this token expires.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp for auditing.
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for requesting a password reset.
pub struct ForgotPasswordRequest {
    /// Email address of the user requesting password reset.
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for resetting password with a token.
pub struct ResetPasswordRequest {
    /// Password reset token from the email.
    #[validate(length(min = 32, message = "Invalid reset token"))]
    pub token: String,
    pub new_password: String,
}
