//! In-process implementation of every store trait, for tests.
//!
//! A single mutex guards all three tables so the atomic operations of the
//! PostgreSQL stores (replace, take) stay atomic here too.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{password_reset::PasswordReset, session::Session, user::User};
use crate::repositories::{PasswordResetStore, SessionStore, UserStore};
use crate::types::{PasswordResetId, SessionId, UserId};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    sessions: Vec<Session>,
    password_resets: Vec<PasswordReset>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_session(&mut self, user_id: UserId, token_hash: &str) -> Result<Session, StoreError> {
        if self.sessions.iter().any(|s| s.token_hash == token_hash) {
            return Err(StoreError::Duplicate);
        }
        let session = Session {
            id: SessionId::new(self.next_id()),
            user_id,
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
        };
        self.sessions.push(session.clone());
        Ok(session)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn sessions_for(&self, user_id: UserId) -> Vec<Session> {
        self.lock()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn password_resets_for(&self, user_id: UserId) -> Vec<PasswordReset> {
        self.lock()
            .password_resets
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Rewrites a reset row's deadline, simulating the passage of time.
    pub fn set_reset_expiry(&self, token_hash: &str, expires_at: DateTime<Utc>) {
        let mut tables = self.lock();
        if let Some(reset) = tables
            .password_resets
            .iter_mut()
            .find(|r| r.token_hash == token_hash)
        {
            reset.expires_at = expires_at;
        }
    }

    /// Rewrites a session's creation time, simulating the passage of time.
    pub fn set_session_created_at(&self, token_hash: &str, created_at: DateTime<Utc>) {
        let mut tables = self.lock();
        if let Some(session) = tables
            .sessions
            .iter_mut()
            .find(|s| s.token_hash == token_hash)
        {
            session.created_at = created_at;
        }
    }

    /// Drops a user row without cascading, leaving orphaned credentials.
    pub fn remove_user_row(&self, user_id: UserId) {
        self.lock().users.retain(|u| u.id != user_id);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Duplicate);
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(tables.next_id()),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, user_id: UserId, token_hash: &str) -> Result<Session, StoreError> {
        self.lock().insert_session(user_id, token_hash)
    }

    async fn replace_for_user(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Session, StoreError> {
        let mut tables = self.lock();
        if tables.sessions.iter().any(|s| s.token_hash == token_hash) {
            return Err(StoreError::Duplicate);
        }
        tables.sessions.retain(|s| s.user_id != user_id);
        tables.insert_session(user_id, token_hash)
    }

    async fn find_with_user(
        &self,
        token_hash: &str,
    ) -> Result<Option<(Session, User)>, StoreError> {
        let tables = self.lock();
        let found = tables
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash)
            .and_then(|session| {
                tables
                    .users
                    .iter()
                    .find(|u| u.id == session.user_id)
                    .map(|user| (session.clone(), user.clone()))
            });
        Ok(found)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.token_hash != token_hash);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.created_at > cutoff);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl PasswordResetStore for MemoryStore {
    async fn replace_for_user(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset, StoreError> {
        let mut tables = self.lock();
        if tables
            .password_resets
            .iter()
            .any(|r| r.token_hash == token_hash)
        {
            return Err(StoreError::Duplicate);
        }
        tables.password_resets.retain(|r| r.user_id != user_id);
        let record = PasswordReset {
            id: PasswordResetId::new(tables.next_id()),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        tables.password_resets.push(record.clone());
        Ok(record)
    }

    async fn take_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordReset>, StoreError> {
        let mut tables = self.lock();
        let position = tables
            .password_resets
            .iter()
            .position(|r| r.token_hash == token_hash);
        Ok(position.map(|index| tables.password_resets.remove(index)))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let before = tables.password_resets.len();
        tables.password_resets.retain(|r| r.expires_at > now);
        Ok((before - tables.password_resets.len()) as u64)
    }
}
