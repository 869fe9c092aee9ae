// handlers/protected/mod.rs - Endpoints behind the session middleware
//
// Handlers read the caller from the `AuthSession` extension; the middleware
// has already rejected requests without a usable session.
pub mod dashboard;
pub mod session;

pub use dashboard::{invoices_get, user_get};
pub use session::me_get;
