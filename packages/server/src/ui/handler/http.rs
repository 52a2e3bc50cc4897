//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::RoomId,
    infrastructure::dto::{
        http::{HealthDto, RoomDetailDto, RoomSummaryDto},
        websocket::OnlineUsersAck,
    },
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
    })
}

/// Get list of rooms with at least one member
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    Json(state.router.rooms().await)
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|_| StatusCode::NOT_FOUND)?;
    let members = state.router.room_members(&room_id).await;

    // rooms exist only while they have members
    if members.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(RoomDetailDto {
        id: room_id.into_string(),
        members,
    }))
}

/// Snapshot of every live session
pub async fn get_online_users(State(state): State<Arc<AppState>>) -> Json<OnlineUsersAck> {
    Json(state.router.online_users().await)
}
