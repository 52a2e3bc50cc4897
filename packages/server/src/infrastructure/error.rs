//! Infrastructure layer error definitions.

use thiserror::Error;

/// Errors raised while decoding or encoding wire frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a JSON object with an `event` name
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// Unknown event name or a payload that does not match the event's shape
    #[error("invalid payload for '{event}': {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
