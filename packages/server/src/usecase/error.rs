//! UseCase 層のエラー定義
//!
//! These never reach the client: the router logs them and the event is a
//! no-op.

use thiserror::Error;

use crate::domain::{ConnectionId, RegistryError, RoomId, ValueObjectError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("session '{0}' not found")]
    SessionNotFound(ConnectionId),

    #[error("session '{0}' is not in a room")]
    NotInRoom(ConnectionId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("session '{0}' not found")]
    SessionNotFound(ConnectionId),

    #[error("invalid room id: {0}")]
    InvalidRoom(#[source] ValueObjectError),

    /// The payload's room does not match the sender's current room
    #[error("session '{session}' is not in room '{room}'")]
    NotInRoom { session: ConnectionId, room: RoomId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("session '{0}' not found")]
    SessionNotFound(ConnectionId),

    #[error("target user '{0}' not found")]
    TargetNotFound(String),
}
