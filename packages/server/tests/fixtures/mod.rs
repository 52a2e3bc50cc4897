//! Shared fixtures for integration tests: a real server on an ephemeral
//! port and a small JSON-frame WebSocket client.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hiroba_server::{ServerConfig, run_with_listener};
use serde_json::{Value, json};
use tokio::{net::TcpListener, net::TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestServer {
    addr: std::net::SocketAddr,
    socket_path: String,
}

impl TestServer {
    /// Start a server with the default configuration.
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    /// Start a server on 127.0.0.1 with an OS-assigned port.
    pub async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let socket_path = config.socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = run_with_listener(listener, config).await {
                eprintln!("test server stopped: {e}");
            }
        });
        Self { addr, socket_path }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, self.socket_path)
    }

    /// Open a WebSocket and consume the `connected` greeting.
    pub async fn connect(&self) -> TestClient {
        let (stream, _) = connect_async(self.ws_url())
            .await
            .expect("Failed to connect WebSocket");
        let mut client = TestClient {
            stream,
            id: String::new(),
        };
        let greeting = client.expect_event("connected").await;
        client.id = greeting["userId"]
            .as_str()
            .expect("connected carries userId")
            .to_string();
        client
    }
}

pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Connection id assigned by the server
    pub id: String,
}

impl TestClient {
    pub async fn emit(&mut self, event: &str, data: Value) {
        self.send(json!({"event": event, "data": data})).await;
    }

    /// Emit with a callback id and wait for the matching ack data.
    pub async fn call(&mut self, event: &str, data: Value, ack: u64) -> Value {
        self.send(json!({"event": event, "data": data, "ack": ack}))
            .await;
        loop {
            let frame = self.next_frame().await.expect("Timed out waiting for ack");
            if frame["ack"] == json!(ack) {
                return frame["data"].clone();
            }
        }
    }

    /// Wait for the next event named `name`, skipping any others.
    pub async fn expect_event(&mut self, name: &str) -> Value {
        loop {
            let frame = self
                .next_frame()
                .await
                .unwrap_or_else(|| panic!("Timed out waiting for '{name}'"));
            if frame["event"] == name {
                return frame["data"].clone();
            }
        }
    }

    /// Assert that no event named `name` arrives within a short window.
    pub async fn expect_no_event(&mut self, name: &str) {
        while let Some(frame) = self.next_frame_within(Duration::from_millis(300)).await {
            assert_ne!(frame["event"], name, "unexpected frame: {frame}");
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }

    async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    async fn next_frame(&mut self) -> Option<Value> {
        self.next_frame_within(RECV_TIMEOUT).await
    }

    async fn next_frame_within(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let msg = tokio::time::timeout(wait, self.stream.next())
                .await
                .ok()??
                .expect("WebSocket error");
            if let Message::Text(text) = msg {
                return Some(serde_json::from_str(text.as_str()).expect("Frame is not JSON"));
            }
        }
    }
}
