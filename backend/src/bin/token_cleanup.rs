//! Sweeps credentials that can no longer authenticate: password resets past
//! their deadline and, when a session TTL is configured, stale sessions.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accounts_backend::{
    config::Config,
    db::connection::{create_pool, run_migrations},
    repositories::{PasswordResetStore, PgPasswordResetStore, PgSessionStore},
    services::SessionService,
    utils::token::TokenGenerator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accounts_backend=info,token_cleanup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let resets = PgPasswordResetStore::new(pool.clone());
    let sessions = SessionService::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        TokenGenerator::new(config.token_bytes),
    )
    .with_ttl(config.session_ttl());
    let now = Utc::now();

    let deleted_resets = resets.delete_expired(now).await?;
    if deleted_resets > 0 {
        tracing::info!("Deleted {} expired password reset tokens", deleted_resets);
    }

    if sessions.ttl().is_some() {
        let deleted_sessions = sessions.prune_expired(now).await?;
        if deleted_sessions > 0 {
            tracing::info!("Deleted {} expired sessions", deleted_sessions);
        }
        sqlx::query("VACUUM (ANALYZE) sessions")
            .execute(&pool)
            .await?;
    }

    sqlx::query("VACUUM (ANALYZE) password_resets")
        .execute(&pool)
        .await?;

    Ok(())
}
