//! WebSocket and HTTP server (UI layer).

pub mod config;
mod handler;
mod runner;
mod signal;
pub mod state;

pub use config::ServerConfig;
pub use runner::{ServerError, build_app, build_state, run, run_with_listener};
