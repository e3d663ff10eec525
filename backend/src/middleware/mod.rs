pub mod auth;
pub mod csrf;
pub mod request_id;

pub use auth::{current_user, require_user, CurrentUser};
pub use csrf::{csrf_protect, CsrfToken};
pub use request_id::{request_id, RequestId};
