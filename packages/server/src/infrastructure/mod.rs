//! Infrastructure layer: concrete registry, broadcaster and wire DTOs.

pub mod broadcaster;
pub mod dto;
pub mod error;
pub mod repository;

pub use broadcaster::ChannelBroadcaster;
pub use error::ProtocolError;
