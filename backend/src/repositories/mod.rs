//! Persistence for users, sessions and password resets.
//!
//! Each table sits behind a trait so services can be wired to PostgreSQL in
//! production and to [`memory::MemoryStore`] in tests.

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod password_reset;
pub mod session;
pub mod user;

pub use password_reset::{PasswordResetStore, PgPasswordResetStore};
pub use session::{PgSessionStore, SessionStore};
pub use user::{PgUserStore, UserStore};
