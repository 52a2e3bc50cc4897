//! Domain layer error definitions.

use thiserror::Error;

use super::value_object::ConnectionId;

/// Rejected identifier values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("connection id is empty")]
    EmptyConnectionId,

    #[error("room id is blank")]
    BlankRoomId,
}

/// Errors raised by the session registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The transport handed out the same connection id twice
    #[error("session '{0}' is already registered")]
    AlreadyRegistered(ConnectionId),

    #[error("session '{0}' not found")]
    SessionNotFound(ConnectionId),
}
