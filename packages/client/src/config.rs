//! Client configuration.

use std::time::Duration;

use clap::Parser;

use crate::controller::ReconnectPolicy;

/// Hiroba chat client
#[derive(Debug, Clone, Parser)]
#[command(name = "hiroba-client", version, about)]
pub struct ClientConfig {
    /// WebSocket URL of the server
    #[arg(short, long, env = "HIROBA_URL", default_value = "ws://127.0.0.1:3001/api/socket")]
    pub url: String,

    /// Room to join on connect
    #[arg(short, long, default_value = "lobby")]
    pub room: String,

    /// Stable user id (survives reconnects)
    #[arg(long)]
    pub user_id: Option<String>,

    /// Display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,

    /// Delay between reconnect attempts
    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,

    /// Messages kept in the local history
    #[arg(long, default_value_t = 500)]
    pub history_capacity: usize,

    /// Idle time after the last keystroke before `typing:stop` is sent
    #[arg(long, default_value_t = 1000)]
    pub typing_idle_ms: u64,
}

impl ClientConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }
}
