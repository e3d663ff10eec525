pub mod id;

pub use id::{PasswordResetId, SessionId, UserId};
