//! Event router.
//!
//! Maps each decoded client event to its use case. All handler bodies run
//! under one lock around the session registry, so every event is processed
//! to completion before the next one touches shared state. Handlers never
//! await while holding the lock.
//!
//! Handlers always act on the session of the connection that sent the
//! event; payloads cannot name another session to mutate. Failures are
//! logged and otherwise ignored: the sender gets no ack and no broadcast.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessageIdFactory, NotificationId, RoomId, SessionRepository},
    infrastructure::dto::{
        http::RoomSummaryDto,
        websocket::{AckResponse, ClientEvent, LeaveAck, MemberView, OnlineUsersAck},
    },
};

use super::{
    broadcaster::Broadcaster,
    error::{MembershipError, SessionError},
    messaging::MessagingUseCase,
    notification::{NotificationDelivery, NotificationUseCase},
    presence::PresenceUseCase,
    room_membership::RoomMembershipUseCase,
    session::SessionUseCase,
};

/// Router settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterConfig {
    pub notification_delivery: NotificationDelivery,
}

/// Dispatches client events against the shared session registry.
pub struct EventRouter {
    sessions: Mutex<Box<dyn SessionRepository>>,
    broadcaster: Arc<dyn Broadcaster>,
    message_ids: MessageIdFactory,
    config: RouterConfig,
}

impl EventRouter {
    pub fn new(
        sessions: Box<dyn SessionRepository>,
        broadcaster: Arc<dyn Broadcaster>,
        config: RouterConfig,
    ) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            broadcaster,
            message_ids: MessageIdFactory::new(),
            config,
        }
    }

    /// Register a freshly connected transport connection.
    pub async fn connect(&self, connection: ConnectionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let result =
            SessionUseCase::new(sessions.as_mut(), self.broadcaster.as_ref()).connect(connection);
        if let Err(e) = &result {
            tracing::error!("Failed to register connection: {}", e);
        }
        result
    }

    /// Tear down a connection: leave its room, then unregister it.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let mut sessions = self.sessions.lock().await;
        if SessionUseCase::new(sessions.as_mut(), self.broadcaster.as_ref())
            .disconnect(connection)
            .is_none()
        {
            tracing::debug!("Disconnect for unknown connection '{}'", connection);
        }
    }

    /// Handle one client event. Returns the ack response, if the event has one.
    pub async fn dispatch(
        &self,
        connection: &ConnectionId,
        event: ClientEvent,
    ) -> Option<AckResponse> {
        let name = event.name();
        tracing::debug!("Dispatching '{}' from '{}'", name, connection);

        let mut guard = self.sessions.lock().await;
        let sessions = guard.as_mut();
        let broadcaster = self.broadcaster.as_ref();

        match event {
            ClientEvent::RoomJoin(payload) => {
                let room_id = match RoomId::new(payload.room_id) {
                    Ok(room_id) => room_id,
                    Err(e) => return rejected(name, connection, e),
                };
                if let Err(e) = SessionUseCase::new(sessions, broadcaster).merge_identity(
                    connection,
                    payload.user_id,
                    payload.user_name,
                ) {
                    return rejected(name, connection, e);
                }
                match RoomMembershipUseCase::new(sessions, broadcaster).join(connection, room_id) {
                    Ok(ack) => Some(AckResponse::Join(ack)),
                    Err(e) => rejected(name, connection, e),
                }
            }
            ClientEvent::RoomLeave(_) => {
                match RoomMembershipUseCase::new(sessions, broadcaster).leave(connection) {
                    Ok(_) => Some(AckResponse::Leave(LeaveAck { success: true })),
                    Err(MembershipError::NotInRoom(_)) => {
                        tracing::debug!("'{}' from '{}' while not in a room", name, connection);
                        None
                    }
                    Err(e) => rejected(name, connection, e),
                }
            }
            ClientEvent::MessageSend(payload) => {
                let result = MessagingUseCase::new(sessions, broadcaster).send_message(
                    connection,
                    payload.room_id,
                    payload.message,
                    &self.message_ids,
                );
                result.err().and_then(|e| rejected(name, connection, e))
            }
            ClientEvent::TypingStart(payload) | ClientEvent::TypingStop(payload) => {
                let is_typing = name == "typing:start";
                let result = MessagingUseCase::new(sessions, broadcaster).set_typing(
                    connection,
                    payload.room_id,
                    is_typing,
                );
                result.err().and_then(|e| rejected(name, connection, e))
            }
            ClientEvent::MentionUser(payload) => NotificationUseCase::new(sessions, broadcaster)
                .mention(connection, payload)
                .err()
                .and_then(|e| rejected(name, connection, e)),
            ClientEvent::NotificationSend(payload) => NotificationUseCase::new(sessions, broadcaster)
                .send(connection, payload, self.config.notification_delivery)
                .err()
                .and_then(|e| rejected(name, connection, e)),
            ClientEvent::NotificationMarkRead(payload) => {
                NotificationUseCase::new(sessions, broadcaster)
                    .mark_read(connection, NotificationId::new(payload.notification_id))
                    .err()
                    .and_then(|e| rejected(name, connection, e))
            }
            ClientEvent::UserStatus(payload) => {
                PresenceUseCase::new(sessions, broadcaster).update_status(connection, payload.status);
                None
            }
            ClientEvent::UserActivity(payload) => {
                PresenceUseCase::new(sessions, broadcaster).report_activity(connection, payload);
                None
            }
            ClientEvent::UsersOnline(_) => Some(AckResponse::OnlineUsers(
                PresenceUseCase::new(sessions, broadcaster).online_users(),
            )),
            ClientEvent::RoomUsers(payload) => match RoomId::new(payload.room_id) {
                Ok(room_id) => Some(AckResponse::RoomUsers(
                    PresenceUseCase::new(sessions, broadcaster).room_users(&room_id),
                )),
                Err(e) => rejected(name, connection, e),
            },
            ClientEvent::UserInfo(payload) => PresenceUseCase::new(sessions, broadcaster)
                .user_info(&payload.user_id)
                .map(AckResponse::UserInfo),
            ClientEvent::Authenticate(payload) => SessionUseCase::new(sessions, broadcaster)
                .authenticate(connection, payload.user_id, payload.user_name)
                .err()
                .and_then(|e| rejected(name, connection, e)),
            ClientEvent::PreferencesUpdate(patch) => SessionUseCase::new(sessions, broadcaster)
                .update_preferences(connection, patch)
                .err()
                .and_then(|e| rejected(name, connection, e)),
        }
    }

    /// Snapshot of every live session (same shape as the `users:online` ack).
    pub async fn online_users(&self) -> OnlineUsersAck {
        let guard = self.sessions.lock().await;
        PresenceUseCase::new(guard.as_ref(), self.broadcaster.as_ref()).online_users()
    }

    /// Rooms with at least one member.
    pub async fn rooms(&self) -> Vec<RoomSummaryDto> {
        let guard = self.sessions.lock().await;
        guard
            .rooms()
            .into_iter()
            .map(|(id, member_count)| RoomSummaryDto {
                id: id.into_string(),
                member_count,
            })
            .collect()
    }

    /// Members of `room_id`; empty when the room has no members.
    pub async fn room_members(&self, room_id: &RoomId) -> Vec<MemberView> {
        let guard = self.sessions.lock().await;
        PresenceUseCase::new(guard.as_ref(), self.broadcaster.as_ref())
            .room_users(room_id)
            .users
    }

    pub async fn online_count(&self) -> usize {
        self.sessions.lock().await.count()
    }
}

/// Log a rejected event. Rejections never produce an ack.
fn rejected<T>(event: &str, connection: &ConnectionId, error: impl std::fmt::Display) -> Option<T> {
    tracing::debug!("Ignoring '{}' from '{}': {}", event, connection, error);
    None
}
