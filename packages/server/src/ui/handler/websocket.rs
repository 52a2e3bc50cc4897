//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::ORIGIN},
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, ConnectionIdFactory},
    infrastructure::{
        ProtocolError,
        dto::websocket::{AckFrame, ClientFrame},
    },
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    // CORS does not apply to upgrades, so the origin is checked here
    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
    if !state.config.origin_allowed(origin) {
        tracing::warn!("Rejecting WebSocket upgrade from origin {:?}", origin);
        return Err(StatusCode::FORBIDDEN);
    }

    let connection_id = ConnectionIdFactory::generate().map_err(|e| {
        tracing::error!("Failed to generate connection id: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: ConnectionId) {
    // Create a channel for this connection to receive frames
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.broadcaster.attach(connection_id.clone(), tx);

    if state.router.connect(connection_id.clone()).await.is_err() {
        state.broadcaster.detach(&connection_id);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    let connection_clone = connection_id.clone();
    let state_clone = state.clone();

    // Spawn a task to receive frames from this connection
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_clone, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    handle_text(&state_clone, &connection_clone, text.as_str()).await;
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_clone);
                    break;
                }
                // Ping/pong is handled by axum; binary frames are not part of the protocol
                _ => {}
            }
        }
    });

    // Spawn a task to forward queued frames to this connection
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.router.disconnect(&connection_id).await;
    state.broadcaster.detach(&connection_id);
    tracing::info!("Connection '{}' closed", connection_id);
}

/// Decode and dispatch one text frame, then answer its ack if requested.
async fn handle_text(state: &AppState, connection_id: &ConnectionId, text: &str) {
    let frame = match ClientFrame::decode(text) {
        Ok(frame) => frame,
        Err(ProtocolError::InvalidPayload { event, source }) => {
            tracing::debug!(
                "Ignoring '{}' from '{}': invalid payload: {}",
                event,
                connection_id,
                source
            );
            return;
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed frame from '{}': {}", connection_id, e);
            return;
        }
    };

    let response = state.router.dispatch(connection_id, frame.event).await;

    let (Some(ack), Some(data)) = (frame.ack, response) else {
        return;
    };
    match (AckFrame { ack, data }).encode() {
        Ok(encoded) => {
            state.broadcaster.send_raw(connection_id, encoded);
        }
        Err(e) => tracing::error!("Failed to encode ack for '{}': {}", connection_id, e),
    }
}
