//! Local view state reconciled from server events.
//!
//! The view keeps what a chat screen renders: a bounded message log, the
//! roster of the current room and the set of other members currently
//! typing. `ChatView::apply` folds one server event into that state and
//! returns the change a UI should react to.

use std::collections::{BTreeMap, VecDeque};

use hiroba_server::{
    domain::Preferences,
    infrastructure::dto::websocket::{
        MemberView, MentionEvent, NotificationEvent, PresenceEvent, ServerEvent, UserActivityEvent,
    },
};

use crate::controller::ConnectionState;

/// Default number of messages kept in the log
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// One line of the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub id: u64,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub timestamp: i64,
    /// Sent by this client
    pub own: bool,
}

/// Changes surfaced to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    State(ConnectionState),
    /// The server assigned this connection its id and default name
    Identity { user_id: String, user_name: String },
    Authenticated { user_id: String, user_name: String },
    Message(ChatLine),
    Roster { room_id: String, member_count: usize },
    MemberLeft { user_id: String, user_name: String },
    /// Display names of the other members currently typing
    Typing(Vec<String>),
    Mention(MentionEvent),
    Notification(NotificationEvent),
    NotificationRead(String),
    Presence(PresenceEvent),
    Activity(UserActivityEvent),
    Preferences(Preferences),
}

#[derive(Debug, Clone)]
pub struct ChatView {
    self_id: Option<String>,
    self_name: Option<String>,
    room: Option<String>,
    messages: VecDeque<ChatLine>,
    capacity: usize,
    roster: BTreeMap<String, MemberView>,
    /// connection id -> display name, never contains this client
    typing: BTreeMap<String, String>,
    notifications: Vec<NotificationEvent>,
    preferences: Preferences,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ChatView {
    /// Create an empty view keeping at most `capacity` messages (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            self_id: None,
            self_name: None,
            room: None,
            messages: VecDeque::new(),
            capacity: capacity.max(1),
            roster: BTreeMap::new(),
            typing: BTreeMap::new(),
            notifications: Vec::new(),
            preferences: Preferences::new(),
        }
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    pub fn self_name(&self) -> Option<&str> {
        self.self_name.as_deref()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatLine> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Members of the current room ordered by connection id.
    pub fn roster(&self) -> Vec<&MemberView> {
        self.roster.values().collect()
    }

    pub fn typing_names(&self) -> Vec<String> {
        self.typing.values().cloned().collect()
    }

    pub fn is_typing(&self, user_id: &str) -> bool {
        self.typing.contains_key(user_id)
    }

    pub fn notifications(&self) -> &[NotificationEvent] {
        &self.notifications
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Switch to `room`: the log, roster and typing set start over.
    pub fn enter_room(&mut self, room: &str) {
        if self.room.as_deref() != Some(room) {
            self.messages.clear();
        }
        self.room = Some(room.to_string());
        self.roster.clear();
        self.typing.clear();
    }

    pub fn leave_room(&mut self) {
        self.room = None;
        self.roster.clear();
        self.typing.clear();
    }

    /// Forget presence state that may be stale after the connection dropped.
    pub fn connection_lost(&mut self) {
        self.roster.clear();
        self.typing.clear();
    }

    /// Mark a notification read locally; read state is never stored server-side.
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        match self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && !n.read)
        {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// Fold one server event into the view.
    pub fn apply(&mut self, event: ServerEvent) -> Option<ViewEvent> {
        match event {
            ServerEvent::Connected(connected) => {
                self.self_id = Some(connected.user_id.clone());
                self.self_name = Some(connected.user_name.clone());
                Some(ViewEvent::Identity {
                    user_id: connected.user_id,
                    user_name: connected.user_name,
                })
            }
            ServerEvent::AuthenticationSuccess(auth) => {
                self.self_name = Some(auth.user_name.clone());
                Some(ViewEvent::Authenticated {
                    user_id: auth.user_id,
                    user_name: auth.user_name,
                })
            }
            ServerEvent::RoomUpdate(update) => {
                if self.room.as_deref() != Some(update.room_id.as_str()) {
                    tracing::debug!("Ignoring room:update for '{}'", update.room_id);
                    return None;
                }
                let self_id = self.self_id.clone();
                self.typing = update
                    .members
                    .iter()
                    .filter(|m| m.is_typing && Some(&m.id) != self_id.as_ref())
                    .map(|m| (m.id.clone(), m.name.clone()))
                    .collect();
                if let Some(me) = update.members.iter().find(|m| Some(&m.id) == self_id.as_ref()) {
                    self.self_name = Some(me.name.clone());
                }
                self.roster = update
                    .members
                    .into_iter()
                    .map(|m| (m.id.clone(), m))
                    .collect();
                Some(ViewEvent::Roster {
                    room_id: update.room_id,
                    member_count: update.member_count,
                })
            }
            ServerEvent::UserLeft(left) => self.remove_member(left.user_id, left.user_name),
            ServerEvent::RoomUserLeave(left) => self.remove_member(left.user_id, left.user_name),
            ServerEvent::MessageReceived(message) => {
                if self.room.as_deref() != Some(message.room_id.as_str()) {
                    tracing::debug!("Ignoring message for room '{}'", message.room_id);
                    return None;
                }
                let line = ChatLine {
                    own: self.self_id.as_deref() == Some(message.user_id.as_str()),
                    id: message.id,
                    user_id: message.user_id,
                    user_name: message.user_name,
                    content: message.content,
                    timestamp: message.timestamp,
                };
                if self.messages.len() == self.capacity {
                    self.messages.pop_front();
                }
                self.messages.push_back(line.clone());
                Some(ViewEvent::Message(line))
            }
            ServerEvent::UserTyping(typing) => {
                if self.self_id.as_deref() == Some(typing.user_id.as_str()) {
                    return None;
                }
                let changed = if typing.is_typing {
                    self.typing
                        .insert(typing.user_id, typing.user_name)
                        .is_none()
                } else {
                    self.typing.remove(&typing.user_id).is_some()
                };
                changed.then(|| ViewEvent::Typing(self.typing_names()))
            }
            ServerEvent::NotificationMention(mention) => Some(ViewEvent::Mention(mention)),
            ServerEvent::NotificationReceive(notification) => {
                self.notifications.push(notification.clone());
                Some(ViewEvent::Notification(notification))
            }
            ServerEvent::NotificationMarkedRead(marked) => {
                self.mark_read(&marked.notification_id);
                Some(ViewEvent::NotificationRead(marked.notification_id))
            }
            ServerEvent::UserPresence(presence) => {
                if let Some(member) = self.roster.get_mut(&presence.id) {
                    member.status = presence.status.clone();
                }
                Some(ViewEvent::Presence(presence))
            }
            ServerEvent::UserActivity(activity) => Some(ViewEvent::Activity(activity)),
            ServerEvent::PreferencesUpdated(updated) => {
                self.preferences = updated.preferences.clone();
                Some(ViewEvent::Preferences(updated.preferences))
            }
        }
    }

    fn remove_member(&mut self, user_id: String, user_name: String) -> Option<ViewEvent> {
        let was_member = self.roster.remove(&user_id).is_some();
        let was_typing = self.typing.remove(&user_id).is_some();
        (was_member || was_typing).then_some(ViewEvent::MemberLeft { user_id, user_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiroba_server::infrastructure::dto::websocket::{
        ConnectedEvent, MessageReceivedEvent, RoomUpdateEvent, UserLeftEvent, UserTypingEvent,
    };

    fn member(id: &str, name: &str, is_typing: bool) -> MemberView {
        MemberView {
            id: id.to_string(),
            name: name.to_string(),
            user_id: None,
            room: Some("team-42".to_string()),
            is_typing,
            status: "online".to_string(),
        }
    }

    fn message(id: u64, from: &str, content: &str) -> ServerEvent {
        ServerEvent::MessageReceived(MessageReceivedEvent {
            id,
            user_id: from.to_string(),
            user_name: from.to_string(),
            room_id: "team-42".to_string(),
            content: content.to_string(),
            timestamp: id as i64,
        })
    }

    fn typing(from: &str, is_typing: bool) -> ServerEvent {
        ServerEvent::UserTyping(UserTypingEvent {
            user_id: from.to_string(),
            user_name: format!("name-{from}"),
            is_typing,
        })
    }

    fn joined_view(capacity: usize) -> ChatView {
        let mut view = ChatView::new(capacity);
        view.apply(ServerEvent::Connected(ConnectedEvent {
            user_id: "me".to_string(),
            user_name: "User-me".to_string(),
        }));
        view.enter_room("team-42");
        view
    }

    #[test]
    fn test_message_log_is_a_ring_buffer() {
        // テスト項目: 容量を超えると古いメッセージから捨てられる
        // given (前提条件):
        let mut view = joined_view(3);

        // when (操作):
        for id in 1..=5 {
            view.apply(message(id, "s2", &format!("m{id}")));
        }

        // then (期待する結果):
        let contents: Vec<&str> = view.messages().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
    }

    #[test]
    fn test_own_messages_are_flagged() {
        // テスト項目: 自分の接続 ID から届いたメッセージは own になる
        let mut view = joined_view(10);

        let own = view.apply(message(1, "me", "hi"));
        let other = view.apply(message(2, "s2", "hello"));

        assert!(matches!(own, Some(ViewEvent::Message(line)) if line.own));
        assert!(matches!(other, Some(ViewEvent::Message(line)) if !line.own));
    }

    #[test]
    fn test_message_for_other_room_is_ignored() {
        // テスト項目: 現在のルーム以外のメッセージは履歴に入らない
        let mut view = joined_view(10);

        let event = view.apply(ServerEvent::MessageReceived(MessageReceivedEvent {
            id: 1,
            user_id: "s2".to_string(),
            user_name: "bob".to_string(),
            room_id: "lobby".to_string(),
            content: "late".to_string(),
            timestamp: 0,
        }));

        assert_eq!(event, None);
        assert_eq!(view.message_count(), 0);
    }

    #[test]
    fn test_typing_set_excludes_self() {
        // テスト項目: タイピング集合に自分は含まれず、変化があったときだけ通知される
        // given (前提条件):
        let mut view = joined_view(10);

        // when (操作):
        let own = view.apply(typing("me", true));
        let started = view.apply(typing("s2", true));
        let repeated = view.apply(typing("s2", true));
        let stopped = view.apply(typing("s2", false));

        // then (期待する結果):
        assert_eq!(own, None);
        assert_eq!(started, Some(ViewEvent::Typing(vec!["name-s2".to_string()])));
        assert_eq!(repeated, None);
        assert_eq!(stopped, Some(ViewEvent::Typing(vec![])));
        assert!(!view.is_typing("me"));
    }

    #[test]
    fn test_room_update_replaces_roster_and_typing() {
        // テスト項目: room:update でロスターとタイピング集合がスナップショットに置き換わる
        // given (前提条件):
        let mut view = joined_view(10);
        view.apply(typing("s9", true));

        // when (操作):
        let event = view.apply(ServerEvent::RoomUpdate(RoomUpdateEvent {
            room_id: "team-42".to_string(),
            members: vec![
                member("me", "alice", true),
                member("s2", "bob", true),
                member("s3", "carol", false),
            ],
            member_count: 3,
        }));

        // then (期待する結果):
        assert_eq!(
            event,
            Some(ViewEvent::Roster {
                room_id: "team-42".to_string(),
                member_count: 3,
            })
        );
        assert_eq!(view.roster().len(), 3);
        assert_eq!(view.typing_names(), vec!["bob".to_string()]);
        assert_eq!(view.self_name(), Some("alice"));
    }

    #[test]
    fn test_user_left_removes_member_and_typing() {
        // テスト項目: user:left でロスターとタイピング集合から外れる
        let mut view = joined_view(10);
        view.apply(ServerEvent::RoomUpdate(RoomUpdateEvent {
            room_id: "team-42".to_string(),
            members: vec![member("me", "alice", false), member("s2", "bob", true)],
            member_count: 2,
        }));

        let event = view.apply(ServerEvent::UserLeft(UserLeftEvent {
            user_id: "s2".to_string(),
            user_name: "bob".to_string(),
            room_id: "team-42".to_string(),
            online_count: 1,
        }));

        assert!(matches!(event, Some(ViewEvent::MemberLeft { user_id, .. }) if user_id == "s2"));
        assert_eq!(view.roster().len(), 1);
        assert!(view.typing_names().is_empty());
    }

    #[test]
    fn test_notifications_are_read_locally() {
        // テスト項目: 受信した通知は未読で保持され、ローカルで既読にできる
        let mut view = joined_view(10);
        view.apply(ServerEvent::NotificationReceive(NotificationEvent {
            id: "n-1".to_string(),
            target_user_id: None,
            kind: "info".to_string(),
            title: "hi".to_string(),
            body: String::new(),
            link: None,
            created_at: 0,
            read: false,
        }));
        assert_eq!(view.unread_count(), 1);

        assert!(view.mark_read("n-1"));
        assert!(!view.mark_read("n-1"));
        assert_eq!(view.unread_count(), 0);
    }
}
