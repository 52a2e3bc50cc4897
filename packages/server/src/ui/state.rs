//! Shared application state.

use std::sync::Arc;

use crate::{infrastructure::ChannelBroadcaster, ui::config::ServerConfig, usecase::EventRouter};

/// State shared by every HTTP and WebSocket handler
pub struct AppState {
    /// Event dispatch over the session registry
    pub router: Arc<EventRouter>,
    /// Per-connection outbound channels and room groups (shared with `router`)
    pub broadcaster: Arc<ChannelBroadcaster>,
    pub config: ServerConfig,
}
