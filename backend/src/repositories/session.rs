use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::StoreError;
use crate::models::{session::Session, user::User};
use crate::types::{SessionId, UserId};

/// Repository trait for session rows, keyed by token hash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, user_id: UserId, token_hash: &str) -> Result<Session, StoreError>;

    /// Deletes every session of the user and inserts the new one atomically.
    async fn replace_for_user(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Session, StoreError>;

    /// Looks up a session together with its owner. Sessions whose user no
    /// longer exists are not returned.
    async fn find_with_user(&self, token_hash: &str)
        -> Result<Option<(Session, User)>, StoreError>;

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<u64, StoreError>;

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SessionUserRow {
    session_id: SessionId,
    token_hash: String,
    session_created_at: DateTime<Utc>,
    user_id: UserId,
    email: String,
    password_hash: String,
    user_created_at: DateTime<Utc>,
    user_updated_at: DateTime<Utc>,
}

impl From<SessionUserRow> for (Session, User) {
    fn from(row: SessionUserRow) -> Self {
        let session = Session {
            id: row.session_id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            created_at: row.session_created_at,
        };
        let user = User {
            id: row.user_id,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.user_created_at,
            updated_at: row.user_updated_at,
        };
        (session, user)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, user_id: UserId, token_hash: &str) -> Result<Session, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash)
            VALUES ($1, $2)
            RETURNING id, user_id, token_hash, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn replace_for_user(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash)
            VALUES ($1, $2)
            RETURNING id, user_id, token_hash, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn find_with_user(
        &self,
        token_hash: &str,
    ) -> Result<Option<(Session, User)>, StoreError> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT s.id AS session_id,
                   s.token_hash,
                   s.created_at AS session_created_at,
                   u.id AS user_id,
                   u.email,
                   u.password_hash,
                   u.created_at AS user_created_at,
                   u.updated_at AS user_updated_at
            FROM sessions s
            INNER JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE created_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
