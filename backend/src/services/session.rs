use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::AuthError;
use crate::models::user::User;
use crate::repositories::SessionStore;
use crate::services::store_fresh_token;
use crate::types::UserId;
use crate::utils::token::{hash_token, TokenGenerator};

/// How many concurrent sessions a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Signing in replaces any earlier session of the same user.
    #[default]
    SinglePerUser,
    Multiple,
}

impl SessionPolicy {
    pub fn from_single_per_user(single: bool) -> Self {
        if single {
            SessionPolicy::SinglePerUser
        } else {
            SessionPolicy::Multiple
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    tokens: TokenGenerator,
    policy: SessionPolicy,
    ttl: Option<Duration>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, tokens: TokenGenerator) -> Self {
        Self {
            store,
            tokens,
            policy: SessionPolicy::default(),
            ttl: None,
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Absolute lifetime after which a session stops authenticating.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Opens a session for `user_id` and returns the raw cookie token.
    pub async fn create(&self, user_id: UserId) -> Result<String, AuthError> {
        let store = &self.store;
        let policy = self.policy;
        let (session, raw) = store_fresh_token(&self.tokens, move |hash| async move {
            match policy {
                SessionPolicy::SinglePerUser => store.replace_for_user(user_id, &hash).await,
                SessionPolicy::Multiple => store.insert(user_id, &hash).await,
            }
        })
        .await?;

        tracing::debug!(user_id = %user_id, session_id = %session.id, "session created");
        Ok(raw)
    }

    /// Resolves a raw cookie token to its user. Unknown tokens, sessions
    /// whose user is gone and sessions past the TTL are all `NotFound`.
    pub async fn user(&self, raw: &str) -> Result<User, AuthError> {
        if raw.is_empty() {
            return Err(AuthError::NotFound);
        }
        let token_hash = hash_token(raw);
        let Some((session, user)) = self.store.find_with_user(&token_hash).await? else {
            return Err(AuthError::NotFound);
        };

        if session.is_stale(self.ttl, Utc::now()) {
            self.store.delete_by_token_hash(&token_hash).await?;
            tracing::debug!(session_id = %session.id, "stale session removed on lookup");
            return Err(AuthError::NotFound);
        }
        Ok(user)
    }

    /// Deletes the session for `raw`. Deleting an unknown token succeeds.
    pub async fn delete(&self, raw: &str) -> Result<(), AuthError> {
        self.store.delete_by_token_hash(&hash_token(raw)).await?;
        Ok(())
    }

    pub async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, AuthError> {
        Ok(self.store.delete_for_user(user_id).await?)
    }

    /// Removes sessions older than the TTL. Without a TTL, or with one longer
    /// than the calendar reaches back, nothing expires.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        match self.ttl.and_then(|ttl| now.checked_sub_signed(ttl)) {
            Some(cutoff) => Ok(self.store.delete_created_before(cutoff).await?),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::StoreError;
    use crate::models::session::Session;
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::session::MockSessionStore;
    use crate::repositories::UserStore;
    use crate::types::SessionId;

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = UserStore::insert(&store, "a@example.com", "hash")
            .await
            .expect("user");
        (store, user)
    }

    fn service(store: &MemoryStore) -> SessionService {
        SessionService::new(Arc::new(store.clone()), TokenGenerator::default())
    }

    #[tokio::test]
    async fn created_token_resolves_to_its_user() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store);

        let raw = sessions.create(user.id).await.expect("create");
        let found = sessions.user(&raw).await.expect("lookup");
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn raw_token_is_never_stored() {
        let (store, user) = store_with_user().await;
        let raw = service(&store).create(user.id).await.unwrap();

        let rows = store.sessions_for(user.id);
        assert_eq!(rows.len(), 1);
        assert_ne!(rows[0].token_hash, raw);
        assert_eq!(rows[0].token_hash, hash_token(&raw));
    }

    #[tokio::test]
    async fn unknown_and_empty_tokens_are_not_found() {
        let (store, _user) = store_with_user().await;
        let sessions = service(&store);

        assert!(matches!(
            sessions.user("no-such-token").await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(sessions.user("").await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn deleted_session_no_longer_resolves() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store);
        let raw = sessions.create(user.id).await.unwrap();

        sessions.delete(&raw).await.expect("delete");
        assert!(matches!(sessions.user(&raw).await, Err(AuthError::NotFound)));
        sessions.delete(&raw).await.expect("second delete is a no-op");
    }

    #[tokio::test]
    async fn single_policy_replaces_previous_session() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store);

        let first = sessions.create(user.id).await.unwrap();
        let second = sessions.create(user.id).await.unwrap();

        assert_eq!(store.sessions_for(user.id).len(), 1);
        assert!(matches!(sessions.user(&first).await, Err(AuthError::NotFound)));
        assert!(sessions.user(&second).await.is_ok());
    }

    #[tokio::test]
    async fn multiple_policy_keeps_previous_sessions() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store).with_policy(SessionPolicy::Multiple);

        let first = sessions.create(user.id).await.unwrap();
        let second = sessions.create(user.id).await.unwrap();

        assert_eq!(store.sessions_for(user.id).len(), 2);
        assert!(sessions.user(&first).await.is_ok());
        assert!(sessions.user(&second).await.is_ok());
    }

    #[tokio::test]
    async fn delete_all_for_user_revokes_every_session() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store).with_policy(SessionPolicy::Multiple);
        let first = sessions.create(user.id).await.unwrap();
        let second = sessions.create(user.id).await.unwrap();

        assert_eq!(sessions.delete_all_for_user(user.id).await.unwrap(), 2);
        assert!(sessions.user(&first).await.is_err());
        assert!(sessions.user(&second).await.is_err());
    }

    #[tokio::test]
    async fn orphaned_session_is_not_found() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store);
        let raw = sessions.create(user.id).await.unwrap();

        store.remove_user_row(user.id);
        assert!(matches!(sessions.user(&raw).await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn sessions_past_ttl_are_removed_on_lookup() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store).with_ttl(Some(Duration::hours(1)));
        let raw = sessions.create(user.id).await.unwrap();

        store.set_session_created_at(&hash_token(&raw), Utc::now() - Duration::hours(2));
        assert!(matches!(sessions.user(&raw).await, Err(AuthError::NotFound)));
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn sessions_do_not_expire_without_ttl() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store);
        let raw = sessions.create(user.id).await.unwrap();

        store.set_session_created_at(&hash_token(&raw), Utc::now() - Duration::days(400));
        assert!(sessions.user(&raw).await.is_ok());
        assert_eq!(sessions.prune_expired(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_sessions() {
        let store = MemoryStore::new();
        let alice = UserStore::insert(&store, "a@example.com", "hash").await.unwrap();
        let bob = UserStore::insert(&store, "b@example.com", "hash").await.unwrap();
        let sessions = service(&store).with_ttl(Some(Duration::hours(1)));

        let old = sessions.create(alice.id).await.unwrap();
        let fresh = sessions.create(bob.id).await.unwrap();
        store.set_session_created_at(&hash_token(&old), Utc::now() - Duration::hours(3));

        assert_eq!(sessions.prune_expired(Utc::now()).await.unwrap(), 1);
        assert!(sessions.user(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn oversized_ttl_keeps_sessions_alive() {
        let (store, user) = store_with_user().await;
        let sessions = service(&store).with_ttl(Some(Duration::hours(10_000_000_000)));

        let raw = sessions.create(user.id).await.unwrap();
        assert_eq!(sessions.user(&raw).await.unwrap().id, user.id);
        assert_eq!(sessions.prune_expired(Utc::now()).await.unwrap(), 0);
    }

    #[test]
    fn policy_follows_single_per_user_flag() {
        assert_eq!(
            SessionPolicy::from_single_per_user(true),
            SessionPolicy::SinglePerUser
        );
        assert_eq!(
            SessionPolicy::from_single_per_user(false),
            SessionPolicy::Multiple
        );
    }

    fn session_row(user_id: UserId, token_hash: &str) -> Session {
        Session {
            id: SessionId::new(1),
            user_id,
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn colliding_hash_is_retried_with_a_fresh_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut store = MockSessionStore::new();
        store
            .expect_insert()
            .times(2)
            .returning(move |user_id, hash| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StoreError::Duplicate)
                } else {
                    Ok(session_row(user_id, hash))
                }
            });
        let sessions = SessionService::new(Arc::new(store), TokenGenerator::default())
            .with_policy(SessionPolicy::Multiple);

        sessions.create(UserId::new(7)).await.expect("retry succeeds");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_collision_is_a_storage_error() {
        let mut store = MockSessionStore::new();
        store
            .expect_replace_for_user()
            .times(2)
            .returning(|_, _| Err(StoreError::Duplicate));
        let sessions = SessionService::new(Arc::new(store), TokenGenerator::default());

        let err = sessions.create(UserId::new(7)).await.expect_err("gives up");
        assert!(matches!(err, AuthError::Storage(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn lookup_storage_failure_is_not_reported_as_not_found() {
        let mut store = MockSessionStore::new();
        store
            .expect_find_with_user()
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        let sessions = SessionService::new(Arc::new(store), TokenGenerator::default());

        let err = sessions.user("some-token").await.expect_err("storage");
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
