//! Hiroba client: session controller and local chat view.

pub mod config;
pub mod connector;
pub mod controller;
pub mod error;
pub mod typing;
pub mod view;

pub use config::ClientConfig;
pub use connector::{Connection, Connector, WebSocketConnector};
pub use controller::{ConnectionState, ReconnectPolicy, SessionController, SessionHandle};
pub use error::ClientError;
pub use view::{ChatLine, ChatView, ViewEvent};
