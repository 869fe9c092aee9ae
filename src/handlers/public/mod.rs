// handlers/public/mod.rs - Endpoints reachable without a session
//
// Everything here except /health still runs behind the bootstrap middleware,
// so live configuration is populated before a handler reads it.
pub mod auth;
pub mod health;
pub mod hook;
pub mod verification;

pub use auth::{callback_get, login_get, logout_get};
pub use health::health_get;
pub use hook::hook_user_post;
pub use verification::{resend_verification_post, verify_token_post};
