//! UseCase: プレゼンス（ステータス、アクティビティ、スナップショット）
//!
//! Status and activity are relayed, never stored: every session reports
//! `online` in snapshots.

use crate::{
    domain::{ConnectionId, RoomId, SessionRepository, Timestamp},
    infrastructure::dto::websocket::{
        ActivityPayload, MemberView, OnlineUsersAck, PresenceEvent, RoomUsersAck, ServerEvent,
        UserActivityEvent,
    },
};

use super::broadcaster::Broadcaster;

/// プレゼンスのユースケース
pub struct PresenceUseCase<'a> {
    sessions: &'a dyn SessionRepository,
    broadcaster: &'a dyn Broadcaster,
}

impl<'a> PresenceUseCase<'a> {
    pub fn new(sessions: &'a dyn SessionRepository, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// Relay a status change to every other session as `user:presence`.
    ///
    /// Returns false when the sender is no longer registered.
    pub fn update_status(&self, connection: &ConnectionId, status: String) -> bool {
        let Some(session) = self.sessions.get(connection) else {
            return false;
        };
        self.broadcaster.publish_all_except(
            connection,
            &ServerEvent::UserPresence(PresenceEvent {
                id: connection.as_str().to_string(),
                name: session.display_name.clone(),
                status,
                online_count: self.sessions.count(),
            }),
        );
        true
    }

    /// Relay an activity to every other session as `user:activity`.
    pub fn report_activity(&self, connection: &ConnectionId, payload: ActivityPayload) -> bool {
        let Some(session) = self.sessions.get(connection) else {
            return false;
        };
        self.broadcaster.publish_all_except(
            connection,
            &ServerEvent::UserActivity(UserActivityEvent {
                user_id: connection.as_str().to_string(),
                user_name: session.display_name.clone(),
                activity: payload.activity,
                details: payload.details,
                timestamp: Timestamp::now().value(),
            }),
        );
        true
    }

    /// Snapshot of every live session.
    pub fn online_users(&self) -> OnlineUsersAck {
        let users: Vec<MemberView> = self
            .sessions
            .all()
            .into_iter()
            .map(MemberView::from)
            .collect();
        let count = users.len();
        OnlineUsersAck { users, count }
    }

    /// Snapshot of one room's members.
    pub fn room_users(&self, room_id: &RoomId) -> RoomUsersAck {
        RoomUsersAck {
            room_id: room_id.as_str().to_string(),
            users: self
                .sessions
                .members_of(room_id)
                .into_iter()
                .map(MemberView::from)
                .collect(),
        }
    }

    /// Public view of one session (external user id first, then connection id).
    pub fn user_info(&self, user_ref: &str) -> Option<MemberView> {
        self.sessions.resolve(user_ref).map(MemberView::from)
    }
}
