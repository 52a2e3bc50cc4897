//! Outbound delivery port.
//!
//! Use cases publish through this trait so they can be tested without a real
//! transport. `infrastructure::ChannelBroadcaster` is the production
//! implementation.

use crate::{
    domain::{ConnectionId, RoomId},
    infrastructure::dto::websocket::ServerEvent,
};

/// Room-scoped, direct and global delivery of server events.
///
/// Room groups are transport-level subscriptions: `publish` reaches exactly
/// the connections subscribed to the room at call time.
#[cfg_attr(test, mockall::automock)]
pub trait Broadcaster: Send + Sync {
    fn subscribe(&self, connection: &ConnectionId, room: &RoomId);

    fn unsubscribe(&self, connection: &ConnectionId, room: &RoomId);

    /// Deliver to every subscriber of `room`.
    fn publish(&self, room: &RoomId, event: &ServerEvent);

    /// Deliver to every subscriber of `room` except `except`.
    fn publish_except(&self, room: &RoomId, except: &ConnectionId, event: &ServerEvent);

    /// Deliver to every live connection except `except`.
    fn publish_all_except(&self, except: &ConnectionId, event: &ServerEvent);

    /// Direct delivery. Returns false if the connection is gone.
    fn send_to(&self, connection: &ConnectionId, event: &ServerEvent) -> bool;
}
