//! Server configuration (command line flags with environment fallbacks).

use clap::Parser;

use crate::usecase::{NotificationDelivery, RouterConfig};

/// Hiroba realtime presence and room messaging server
#[derive(Debug, Clone, Parser)]
#[command(name = "hiroba-server", version, about)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HIROBA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Origin allowed for CORS and WebSocket upgrades
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,

    /// Path of the WebSocket endpoint
    #[arg(long, env = "SOCKET_PATH", default_value = "/api/socket")]
    pub socket_path: String,

    /// Recipient of `notification:send`
    #[arg(long, env = "NOTIFICATION_DELIVERY", value_enum, default_value_t = NotificationDelivery::Sender)]
    pub notification_delivery: NotificationDelivery,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            notification_delivery: self.notification_delivery,
        }
    }

    /// Whether an upgrade request with this `Origin` header may connect.
    ///
    /// Requests without an `Origin` (non-browser clients) are accepted.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        origin.is_none_or(|origin| origin == self.allowed_origin)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origin: "http://localhost:3000".to_string(),
            socket_path: "/api/socket".to_string(),
            notification_delivery: NotificationDelivery::Sender,
            log_level: "info".to_string(),
        }
    }
}
