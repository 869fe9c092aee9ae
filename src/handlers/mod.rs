// handlers/mod.rs - Handler tiers
//
// Public (no session) → Protected (session cookie or bearer token)
pub mod protected;
pub mod public;
