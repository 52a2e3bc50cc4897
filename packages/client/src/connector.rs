//! Transport seam between the session controller and the network.
//!
//! A `Connection` is a pair of text-frame channels. The WebSocket connector
//! bridges them to a `tokio-tungstenite` stream with two pump tasks; tests
//! plug in connectors that hand out in-memory channel pairs instead.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::ClientError;

/// One established connection.
///
/// Dropping `outgoing` closes the connection; `incoming` yields `None` once
/// the peer is gone.
#[derive(Debug)]
pub struct Connection {
    pub outgoing: UnboundedSender<String>,
    pub incoming: UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, ClientError>;
}

/// Connects to a server WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ClientError::InvalidUrl(url));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection, ClientError> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        tracing::info!("Connected to {}", self.url);
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<String>();

        // Writer: forward frames until the controller drops its sender
        tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::warn!("Failed to send frame: {}", e);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: forward text frames until the stream ends
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if incoming_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("WebSocket reader finished");
        });

        Ok(Connection { outgoing, incoming })
    }
}
