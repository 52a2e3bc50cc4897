//! WebSocket wire protocol.
//!
//! Every frame is a JSON text frame:
//!
//! ```text
//! client -> server   {"event": "room:join", "data": {...}, "ack": 1}
//! server -> client   {"event": "room:update", "data": {...}}
//! server -> client   {"ack": 1, "data": {...}}
//! ```
//!
//! Event names and camelCase field names are the wire contract shared with
//! existing clients and must not change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Preferences, STATUS_ONLINE, Session};
use crate::infrastructure::error::ProtocolError;

// ---------------------------------------------------------------------------
// Inbound (client -> server)
// ---------------------------------------------------------------------------

/// Raw inbound frame before the payload is decoded.
#[derive(Debug, Clone, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    ack: Option<u64>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    pub event: ClientEvent,
    /// Callback id; present when the client expects an ack
    pub ack: Option<u64>,
}

impl ClientFrame {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)?;
        let data = match raw.data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let event = serde_json::from_value::<ClientEvent>(serde_json::json!({
            "event": raw.event,
            "data": data,
        }))
        .map_err(|source| ProtocolError::InvalidPayload {
            event: raw.event.clone(),
            source,
        })?;
        Ok(Self {
            event,
            ack: raw.ack,
        })
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut value = serde_json::to_value(&self.event).map_err(ProtocolError::Encode)?;
        if let (Some(ack), Value::Object(map)) = (self.ack, &mut value) {
            map.insert("ack".to_string(), Value::from(ack));
        }
        serde_json::to_string(&value).map_err(ProtocolError::Encode)
    }
}

/// Every event a client may emit, one variant per event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "room:join")]
    RoomJoin(JoinRoomPayload),
    #[serde(rename = "room:leave")]
    RoomLeave(LeaveRoomPayload),
    #[serde(rename = "message:send")]
    MessageSend(SendMessagePayload),
    #[serde(rename = "typing:start")]
    TypingStart(TypingPayload),
    #[serde(rename = "typing:stop")]
    TypingStop(TypingPayload),
    #[serde(rename = "mention:user")]
    MentionUser(MentionPayload),
    #[serde(rename = "notification:send")]
    NotificationSend(SendNotificationPayload),
    #[serde(rename = "notification:mark_read")]
    NotificationMarkRead(MarkReadPayload),
    #[serde(rename = "user:status")]
    UserStatus(StatusPayload),
    #[serde(rename = "user:activity")]
    UserActivity(ActivityPayload),
    #[serde(rename = "users:online")]
    UsersOnline(EmptyPayload),
    #[serde(rename = "room:users")]
    RoomUsers(RoomUsersPayload),
    #[serde(rename = "user:info")]
    UserInfo(UserInfoPayload),
    #[serde(rename = "authenticate")]
    Authenticate(AuthenticatePayload),
    #[serde(rename = "preferences:update")]
    PreferencesUpdate(Preferences),
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoin(_) => "room:join",
            Self::RoomLeave(_) => "room:leave",
            Self::MessageSend(_) => "message:send",
            Self::TypingStart(_) => "typing:start",
            Self::TypingStop(_) => "typing:stop",
            Self::MentionUser(_) => "mention:user",
            Self::NotificationSend(_) => "notification:send",
            Self::NotificationMarkRead(_) => "notification:mark_read",
            Self::UserStatus(_) => "user:status",
            Self::UserActivity(_) => "user:activity",
            Self::UsersOnline(_) => "users:online",
            Self::RoomUsers(_) => "room:users",
            Self::UserInfo(_) => "user:info",
            Self::Authenticate(_) => "authenticate",
            Self::PreferencesUpdate(_) => "preferences:update",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionPayload {
    /// External user id or connection id of the mentioned user
    pub target_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
    #[serde(default = "default_notification_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn default_notification_kind() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub notification_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub activity: String,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUsersPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoPayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    pub user_id: String,
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// Outbound (server -> client)
// ---------------------------------------------------------------------------

/// Every event the server emits, one variant per event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once to a fresh connection so the client learns its own id
    #[serde(rename = "connected")]
    Connected(ConnectedEvent),
    #[serde(rename = "room:update")]
    RoomUpdate(RoomUpdateEvent),
    #[serde(rename = "user:left")]
    UserLeft(UserLeftEvent),
    #[serde(rename = "room:user:leave")]
    RoomUserLeave(RoomUserLeaveEvent),
    #[serde(rename = "message:received")]
    MessageReceived(MessageReceivedEvent),
    #[serde(rename = "user:typing")]
    UserTyping(UserTypingEvent),
    #[serde(rename = "notification:mention")]
    NotificationMention(MentionEvent),
    #[serde(rename = "notification:receive")]
    NotificationReceive(NotificationEvent),
    #[serde(rename = "notification:marked_read")]
    NotificationMarkedRead(MarkedReadEvent),
    #[serde(rename = "user:presence")]
    UserPresence(PresenceEvent),
    #[serde(rename = "user:activity")]
    UserActivity(UserActivityEvent),
    #[serde(rename = "authentication:success")]
    AuthenticationSuccess(AuthenticatedEvent),
    #[serde(rename = "preferences:updated")]
    PreferencesUpdated(PreferencesUpdatedEvent),
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Public view of a session, used in member lists and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    /// Connection id
    pub id: String,
    pub name: String,
    pub user_id: Option<String>,
    pub room: Option<String>,
    pub is_typing: bool,
    pub status: String,
}

impl From<&Session> for MemberView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.as_str().to_string(),
            name: session.display_name.clone(),
            user_id: session
                .external_user_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
            room: session
                .current_room
                .as_ref()
                .map(|room| room.as_str().to_string()),
            is_typing: session.is_typing,
            status: STATUS_ONLINE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdateEvent {
    pub room_id: String,
    pub members: Vec<MemberView>,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftEvent {
    pub user_id: String,
    pub user_name: String,
    pub room_id: String,
    pub online_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserLeaveEvent {
    pub user_id: String,
    pub user_name: String,
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedEvent {
    pub id: u64,
    /// Sender connection id
    pub user_id: String,
    pub user_name: String,
    pub room_id: String,
    pub content: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingEvent {
    pub user_id: String,
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionEvent {
    pub from_user_id: String,
    pub from_user_name: String,
    pub room_id: Option<String>,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: String,
    pub target_user_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub created_at: i64,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedReadEvent {
    pub notification_id: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub id: String,
    pub name: String,
    pub status: String,
    pub online_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityEvent {
    pub user_id: String,
    pub user_name: String,
    pub activity: String,
    pub details: Value,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedEvent {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencesUpdatedEvent {
    pub preferences: Preferences,
}

// ---------------------------------------------------------------------------
// Acks (callback responses)
// ---------------------------------------------------------------------------

/// Callback response to an inbound frame that carried an `ack` id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AckResponse {
    Join(JoinAck),
    Leave(LeaveAck),
    OnlineUsers(OnlineUsersAck),
    RoomUsers(RoomUsersAck),
    UserInfo(MemberView),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub success: bool,
    pub room_id: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveAck {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersAck {
    pub users: Vec<MemberView>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUsersAck {
    pub room_id: String,
    pub users: Vec<MemberView>,
}

/// `{"ack": <id>, "data": <response>}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckFrame {
    pub ack: u64,
    pub data: AckResponse,
}

impl AckFrame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Any frame a client may receive.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingFrame {
    Event(ServerEvent),
    /// Ack id and raw response data; the caller knows the expected shape
    Ack { ack: u64, data: Value },
}

impl IncomingFrame {
    /// Decode a server text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)?;
        if let Some(ack) = value.get("ack").and_then(Value::as_u64) {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            return Ok(Self::Ack { ack, data });
        }
        let name = value
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        serde_json::from_value::<ServerEvent>(value)
            .map(Self::Event)
            .map_err(|source| ProtocolError::InvalidPayload {
                event: name,
                source,
            })
    }
}
