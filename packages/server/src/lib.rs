//! Hiroba realtime presence and room messaging server.
//!
//! Sessions join at most one room at a time; messages, typing indicators
//! and presence changes are fanned out to the relevant connections over a
//! JSON event protocol on a WebSocket.

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use ui::{ServerConfig, ServerError, run, run_with_listener};
