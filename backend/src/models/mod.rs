//! Data models shared across database access and API handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod password_reset;
pub mod session;
pub mod user;

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The caller's CSRF token, to be echoed in `X-CSRF-Token`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}
