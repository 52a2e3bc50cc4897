//! Core domain models for the presence and messaging core.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value_object::{
    ConnectionId, ExternalUserId, MessageId, NotificationId, RoomId, Timestamp,
};

/// Opaque per-session preference bag.
pub type Preferences = Map<String, Value>;

/// Presence status reported for every live session.
pub const STATUS_ONLINE: &str = "online";

/// Server-side record of one live connection.
///
/// Created on connect, destroyed on disconnect; nothing is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: ConnectionId,
    pub display_name: String,
    pub external_user_id: Option<ExternalUserId>,
    /// At most one room at a time
    pub current_room: Option<RoomId>,
    /// Scoped to `current_room`; always false when not in a room
    pub is_typing: bool,
    pub preferences: Preferences,
    pub connected_at: Timestamp,
}

impl Session {
    /// Create a session with a display name derived from the connection id
    /// and the default preference bag.
    pub fn new(id: ConnectionId, connected_at: Timestamp) -> Self {
        let display_name = default_display_name(&id);
        Self {
            id,
            display_name,
            external_user_id: None,
            current_room: None,
            is_typing: false,
            preferences: default_preferences(),
            connected_at,
        }
    }

    /// Whether the session currently sits in `room_id`.
    pub fn is_in(&self, room_id: &RoomId) -> bool {
        self.current_room.as_ref() == Some(room_id)
    }

    /// Apply client-supplied identity. `None` fields are left untouched.
    pub fn apply_identity(&mut self, user_id: Option<ExternalUserId>, name: Option<String>) {
        if let Some(user_id) = user_id {
            self.external_user_id = Some(user_id);
        }
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.display_name = name;
        }
    }

    /// Overwrite the identity with authenticated values.
    ///
    /// An empty `user_id` clears the stable id; a blank name keeps the
    /// current display name.
    pub fn authenticate(&mut self, user_id: Option<ExternalUserId>, name: String) {
        self.external_user_id = user_id;
        if !name.trim().is_empty() {
            self.display_name = name;
        }
    }

    /// Shallow merge: top-level keys in `patch` overwrite existing keys.
    pub fn merge_preferences(&mut self, patch: Preferences) {
        for (key, value) in patch {
            self.preferences.insert(key, value);
        }
    }

    /// Leave the current room, clearing the typing flag.
    ///
    /// Returns the room that was left, if any.
    pub fn clear_room(&mut self) -> Option<RoomId> {
        self.is_typing = false;
        self.current_room.take()
    }
}

/// `User-` followed by the first six characters of the connection id.
pub fn default_display_name(id: &ConnectionId) -> String {
    let prefix: String = id.as_str().chars().take(6).collect();
    format!("User-{prefix}")
}

/// Preference bag every new session starts with.
pub fn default_preferences() -> Preferences {
    let mut preferences = Map::new();
    preferences.insert("notifications".to_string(), Value::Bool(true));
    preferences.insert("theme".to_string(), Value::String("system".to_string()));
    preferences
}

/// A chat message. Transient: exists only for the duration of the broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: ConnectionId,
    pub sender_name: String,
    pub room_id: RoomId,
    /// Opaque; relayed exactly as sent
    pub content: String,
    pub created_at: Timestamp,
}

/// An ad-hoc notification. `read` is tracked by clients only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    /// `None` for broadcast notifications
    pub target_user_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub created_at: Timestamp,
    pub read: bool,
}
