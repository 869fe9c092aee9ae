pub mod auth;
pub mod bootstrap;

pub use auth::{session_auth_middleware, AuthSession};
pub use bootstrap::{bootstrap_middleware, request_scope_middleware};
