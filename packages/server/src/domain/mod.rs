//! Domain layer for the presence and messaging core.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{ChatMessage, Notification, Preferences, STATUS_ONLINE, Session};
pub use error::{RegistryError, ValueObjectError};
pub use factory::{ConnectionIdFactory, MessageIdFactory, NotificationIdFactory};
pub use repository::SessionRepository;
pub use value_object::{
    ConnectionId, ExternalUserId, MessageId, NotificationId, RoomId, Timestamp,
};
