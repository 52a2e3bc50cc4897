//! Client error definitions.

use hiroba_server::infrastructure::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server URL is not a `ws://` or `wss://` URL
    #[error("invalid server url '{0}'")]
    InvalidUrl(String),

    #[error("failed to connect: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connector could not produce a connection (e.g. no server available)
    #[error("connection refused: {0}")]
    Refused(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
