use chrono::{Duration, Utc};

use accounts_backend::{
    repositories::{PasswordResetStore, PgPasswordResetStore},
    utils::token::{generate_token, hash_token},
};

#[macro_use]
mod support;

fn fresh_hash() -> String {
    hash_token(&generate_token(32).expect("token"))
}

#[tokio::test]
async fn replace_for_user_supersedes_earlier_resets() {
    let pool = pool_or_skip!();
    let user = support::seed_user(&pool).await;
    let store = PgPasswordResetStore::new(pool.clone());
    let expires_at = Utc::now() + Duration::hours(1);
    let first = fresh_hash();
    let second = fresh_hash();

    store
        .replace_for_user(user.id, &first, expires_at)
        .await
        .expect("first");
    let row = store
        .replace_for_user(user.id, &second, expires_at)
        .await
        .expect("second");
    assert_eq!(row.user_id, user.id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_resets WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert!(store.take_by_token_hash(&first).await.unwrap().is_none());
}

#[tokio::test]
async fn take_returns_the_row_exactly_once() {
    let pool = pool_or_skip!();
    let user = support::seed_user(&pool).await;
    let store = PgPasswordResetStore::new(pool.clone());
    let hash = fresh_hash();
    store
        .replace_for_user(user.id, &hash, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let taken = store.take_by_token_hash(&hash).await.unwrap().expect("row");
    assert_eq!(taken.user_id, user.id);
    assert!(store.take_by_token_hash(&hash).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_takes_have_a_single_winner() {
    let pool = pool_or_skip!();
    let user = support::seed_user(&pool).await;
    let store = PgPasswordResetStore::new(pool.clone());
    let hash = fresh_hash();
    store
        .replace_for_user(user.id, &hash, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let (a, b) = tokio::join!(store.take_by_token_hash(&hash), store.take_by_token_hash(&hash));
    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn delete_expired_keeps_live_rows() {
    let pool = pool_or_skip!();
    let alice = support::seed_user(&pool).await;
    let bob = support::seed_user(&pool).await;
    let store = PgPasswordResetStore::new(pool.clone());
    let stale = fresh_hash();
    let live = fresh_hash();

    store
        .replace_for_user(alice.id, &stale, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    store
        .replace_for_user(bob.id, &live, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    assert!(store.delete_expired(Utc::now()).await.unwrap() >= 1);
    assert!(store.take_by_token_hash(&stale).await.unwrap().is_none());
    assert!(store.take_by_token_hash(&live).await.unwrap().is_some());
}
