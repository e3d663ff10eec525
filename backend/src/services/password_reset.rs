use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use url::Url;

use crate::error::AuthError;
use crate::models::password_reset::PasswordReset;
use crate::models::user::User;
use crate::repositories::PasswordResetStore;
use crate::services::{store_fresh_token, SessionService, UserService};
use crate::utils::email::{password_reset_email, Mailer};
use crate::utils::token::{hash_token, TokenGenerator};

pub const DEFAULT_RESET_TTL_MINUTES: i64 = 60;
pub const RESET_PATH: &str = "reset-pw";
pub const RESET_TOKEN_PARAM: &str = "token";
pub const FORGOT_PASSWORD_CONTEXT: &str = "forgot password email";

/// Builds `<base_url>/reset-pw?token=<raw_token>`.
pub fn reset_url(base_url: &str, raw_token: &str) -> Result<String, AuthError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(RESET_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair(RESET_TOKEN_PARAM, raw_token);
    Ok(url.to_string())
}

/// Issues, delivers and redeems single-use password reset tokens.
#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn PasswordResetStore>,
    users: UserService,
    sessions: SessionService,
    mailer: Arc<dyn Mailer>,
    tokens: TokenGenerator,
    duration: Duration,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn PasswordResetStore>,
        users: UserService,
        sessions: SessionService,
        mailer: Arc<dyn Mailer>,
        tokens: TokenGenerator,
    ) -> Self {
        Self {
            store,
            users,
            sessions,
            mailer,
            tokens,
            duration: Duration::minutes(DEFAULT_RESET_TTL_MINUTES),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Replaces any outstanding reset for the owner of `email` with a new
    /// one. Returns the stored row and the raw token.
    pub async fn create(&self, email: &str) -> Result<(PasswordReset, String), AuthError> {
        let user = self.users.find_by_email(email).await?;
        self.issue_for(&user).await
    }

    async fn issue_for(&self, user: &User) -> Result<(PasswordReset, String), AuthError> {
        let store = &self.store;
        let user_id = user.id;
        let expires_at = Utc::now()
            .checked_add_signed(self.duration)
            .ok_or(AuthError::LifetimeOutOfRange)?;
        let (reset, raw) = store_fresh_token(&self.tokens, move |hash| async move {
            store.replace_for_user(user_id, &hash, expires_at).await
        })
        .await?;

        tracing::debug!(user_id = %user_id, reset_id = %reset.id, "password reset issued");
        Ok((reset, raw))
    }

    /// Redeems a raw reset token. The row is removed whatever the outcome,
    /// so a token authenticates at most once.
    pub async fn consume(&self, raw: &str) -> Result<User, AuthError> {
        let reset = self
            .store
            .take_by_token_hash(&hash_token(raw))
            .await?
            .ok_or(AuthError::NotFound)?;

        if reset.is_expired_at(Utc::now()) {
            return Err(AuthError::Expired);
        }
        self.users.find_by_id(reset.user_id).await
    }

    /// Issues a reset for `email` and mails the link to the account address.
    pub async fn request_reset(&self, email: &str, base_url: &str) -> Result<(), AuthError> {
        let user = self.users.find_by_email(email).await?;
        let (reset, raw) = self.issue_for(&user).await?;
        let link = reset_url(base_url, &raw)?;

        self.mailer
            .send(password_reset_email(&user.email, &link))
            .await
            .map_err(|source| AuthError::Delivery {
                context: FORGOT_PASSWORD_CONTEXT,
                source,
            })?;

        tracing::info!(user_id = %user.id, reset_id = %reset.id, "password reset email sent");
        Ok(())
    }

    /// Redeems `raw`, stores the new password and revokes every session of
    /// the user.
    pub async fn complete_reset(&self, raw: &str, new_password: &str) -> Result<User, AuthError> {
        // Checked first so a rejected password does not burn the token.
        self.users.check_password(new_password)?;

        let user = self.consume(raw).await?;
        self.users.update_password(user.id, new_password).await?;
        let revoked = self.sessions.delete_all_for_user(user.id).await?;

        tracing::info!(user_id = %user.id, revoked, "password reset completed");
        Ok(user)
    }

    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        Ok(self.store.delete_expired(now).await?)
    }
}
