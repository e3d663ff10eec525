use std::sync::Arc;

use crate::error::{AuthError, StoreError};
use crate::models::user::{normalize_email, User};
use crate::repositories::UserStore;
use crate::types::UserId;
use crate::utils::password::{burn_verification, hash_password, verify_password};

pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    password_min_length: usize,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        }
    }

    pub fn with_password_min_length(mut self, min_length: usize) -> Self {
        self.password_min_length = min_length;
        self
    }

    pub fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.password_min_length {
            return Err(AuthError::WeakPassword {
                min_length: self.password_min_length,
            });
        }
        Ok(())
    }

    /// Registers a new account. The address is stored in normalised form.
    pub async fn create(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.check_password(password)?;
        let email = normalize_email(email);
        let password_hash = hash_password(password)?;

        match self.store.insert(&email, &password_hash).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(StoreError::Duplicate) => Err(AuthError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks an email/password pair. Unknown addresses and wrong passwords
    /// both yield `InvalidCredentials` after the same amount of hashing work.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn update_password(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        self.check_password(password)?;
        let password_hash = hash_password(password)?;
        if !self.store.update_password_hash(user_id, &password_hash).await? {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    pub async fn find_by_id(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::NotFound)
    }
}
