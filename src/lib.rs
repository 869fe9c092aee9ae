pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod secrets;
pub mod server;
pub mod state;
