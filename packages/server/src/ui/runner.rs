//! Server startup: router construction, binding and serving.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::get,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    infrastructure::{ChannelBroadcaster, repository::InMemorySessionRepository},
    ui::{
        config::ServerConfig,
        handler::{get_online_users, get_room_detail, get_rooms, health_check, websocket_handler},
        signal::shutdown_signal,
        state::AppState,
    },
    usecase::EventRouter,
};

/// Errors that stop the server from starting or serving
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid allowed origin '{0}'")]
    InvalidOrigin(String),

    #[error("socket path must start with '/': '{0}'")]
    InvalidSocketPath(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the shared state with an empty session registry.
pub fn build_state(config: ServerConfig) -> Arc<AppState> {
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let router = EventRouter::new(
        Box::new(InMemorySessionRepository::new()),
        broadcaster.clone(),
        config.router_config(),
    );
    Arc::new(AppState {
        router: Arc::new(router),
        broadcaster,
        config,
    })
}

/// Build the axum application.
pub fn build_app(state: Arc<AppState>) -> Result<Router, ServerError> {
    let config = &state.config;
    if !config.socket_path.starts_with('/') {
        return Err(ServerError::InvalidSocketPath(config.socket_path.clone()));
    }
    let origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|_| ServerError::InvalidOrigin(config.allowed_origin.clone()))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let socket_path = config.socket_path.clone();
    Ok(Router::new()
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(get_rooms))
        .route("/api/rooms/{room_id}", get(get_room_detail))
        .route("/api/users/online", get(get_online_users))
        .route(&socket_path, get(websocket_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Run the server on an already bound listener until a shutdown signal.
pub async fn run_with_listener(
    listener: TcpListener,
    config: ServerConfig,
) -> Result<(), ServerError> {
    let socket_path = config.socket_path.clone();
    let app = build_app(build_state(config))?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{}", addr);
        tracing::info!("WebSocket endpoint: ws://{}{}", addr, socket_path);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Bind the configured address and run the server.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    run_with_listener(listener, config).await
}
