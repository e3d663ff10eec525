use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    repositories::{
        PasswordResetStore, PgPasswordResetStore, PgSessionStore, PgUserStore, SessionStore,
        UserStore,
    },
    services::{PasswordResetService, SessionPolicy, SessionService, UserService},
    utils::{email::Mailer, token::TokenGenerator},
};

/// Services shared by the request gate and the handlers. Built once at
/// startup and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: UserService,
    pub sessions: SessionService,
    pub password_resets: PasswordResetService,
}

impl AppState {
    pub fn new(
        config: Config,
        user_store: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        reset_store: Arc<dyn PasswordResetStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenGenerator::new(config.token_bytes);
        let users =
            UserService::new(user_store).with_password_min_length(config.password_min_length);
        let sessions = SessionService::new(session_store, tokens)
            .with_policy(SessionPolicy::from_single_per_user(
                config.session_single_per_user,
            ))
            .with_ttl(config.session_ttl());
        let password_resets = PasswordResetService::new(
            reset_store,
            users.clone(),
            sessions.clone(),
            mailer,
            tokens,
        )
        .with_duration(config.password_reset_duration());

        Self {
            config: Arc::new(config),
            users,
            sessions,
            password_resets,
        }
    }

    /// Wires every store to the same PostgreSQL pool.
    pub fn from_pool(config: Config, pool: PgPool, mailer: Arc<dyn Mailer>) -> Self {
        Self::new(
            config,
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool.clone())),
            Arc::new(PgPasswordResetStore::new(pool)),
            mailer,
        )
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl AppState {
    /// Wires every store to one shared in-memory store.
    pub fn in_memory(
        config: Config,
        store: crate::repositories::memory::MemoryStore,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            mailer,
        )
    }
}
