//! Models for signed-in sessions.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, FromRow)]
/// Database representation of a session.
pub struct Session {
    /// Unique identifier for the session record.
    pub id: SessionId,
    /// User ID associated with the session.
    pub user_id: UserId,
    /// SHA-256 hash of the raw cookie token.
    pub token_hash: String,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether an absolute lifetime, if configured, has elapsed. A deadline
    /// past the end of the calendar is never reached.
    pub fn is_stale(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .is_some_and(|deadline| deadline <= now)
    }
}
