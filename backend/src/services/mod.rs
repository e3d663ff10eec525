//! Credential and session lifecycle services.
//!
//! Services hold no authoritative state. Each one is a cheap `Clone` handle
//! around its stores, and every call round-trips to them.

use std::future::Future;

use crate::error::{AuthError, StoreError};
use crate::utils::token::TokenGenerator;

pub mod password_reset;
pub mod session;
pub mod user;

pub use password_reset::PasswordResetService;
pub use session::{SessionPolicy, SessionService};
pub use user::UserService;

/// Issues a token and hands its hash to `insert`. A duplicate-hash rejection
/// is retried exactly once with a fresh token; the second is surfaced.
pub(crate) async fn store_fresh_token<T, F, Fut>(
    tokens: &TokenGenerator,
    mut insert: F,
) -> Result<(T, String), AuthError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut retried = false;
    loop {
        let issued = tokens.issue()?;
        match insert(issued.hash).await {
            Ok(row) => return Ok((row, issued.raw)),
            Err(StoreError::Duplicate) if !retried => {
                tracing::warn!("token hash collided with an existing row, retrying once");
                retried = true;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
