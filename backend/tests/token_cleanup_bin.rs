use std::process::Command;

use chrono::{Duration, Utc};

use accounts_backend::{
    repositories::{PasswordResetStore, PgPasswordResetStore, PgSessionStore, SessionStore},
    utils::token::{generate_token, hash_token},
};

#[macro_use]
mod support;

fn fresh_hash() -> String {
    hash_token(&generate_token(32).expect("token"))
}

#[tokio::test]
async fn token_cleanup_binary_removes_expired_records() {
    let pool = pool_or_skip!();
    let user = support::seed_user(&pool).await;
    let other = support::seed_user(&pool).await;
    let resets = PgPasswordResetStore::new(pool.clone());
    let sessions = PgSessionStore::new(pool.clone());

    let expired_reset = fresh_hash();
    let live_reset = fresh_hash();
    resets
        .replace_for_user(user.id, &expired_reset, Utc::now() - Duration::hours(2))
        .await
        .expect("insert expired reset");
    resets
        .replace_for_user(other.id, &live_reset, Utc::now() + Duration::hours(1))
        .await
        .expect("insert live reset");

    let old_session = fresh_hash();
    let new_session = fresh_hash();
    sessions.insert(user.id, &old_session).await.unwrap();
    sessions.insert(other.id, &new_session).await.unwrap();
    sqlx::query("UPDATE sessions SET created_at = $1 WHERE token_hash = $2")
        .bind(Utc::now() - Duration::hours(48))
        .bind(&old_session)
        .execute(&pool)
        .await
        .expect("age session");

    let bin = env!("CARGO_BIN_EXE_token_cleanup");
    let db_url = support::test_database_url().expect("TEST_DATABASE_URL");

    let status = Command::new(bin)
        .env("DATABASE_URL", db_url)
        .env("SESSION_TTL_HOURS", "24")
        .env("SMTP_FROM_ADDRESS", "not a mailbox")
        .env("SMTP_HOST", "")
        .status()
        .expect("run token_cleanup");
    assert!(status.success());

    let remaining_resets: Vec<String> =
        sqlx::query_scalar("SELECT token_hash FROM password_resets WHERE user_id = ANY($1)")
            .bind(vec![user.id.get(), other.id.get()])
            .fetch_all(&pool)
            .await
            .expect("list resets");
    assert_eq!(remaining_resets, vec![live_reset]);

    assert!(sessions.find_with_user(&old_session).await.unwrap().is_none());
    assert!(sessions.find_with_user(&new_session).await.unwrap().is_some());
}
