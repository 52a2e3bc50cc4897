//! UseCase: 通知の配信（メンション、通知送信、既読）
//!
//! Directed delivery only; nothing is stored. Unresolvable targets are
//! dropped silently.

use crate::{
    domain::{
        ConnectionId, Notification, NotificationId, NotificationIdFactory, SessionRepository,
        Timestamp,
    },
    infrastructure::dto::websocket::{
        MarkedReadEvent, MentionEvent, MentionPayload, NotificationEvent, SendNotificationPayload,
        ServerEvent,
    },
};

use super::{broadcaster::Broadcaster, error::NotificationError};

/// Recipient policy for `notification:send`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum NotificationDelivery {
    /// Echo back to the sender (historical behavior; `targetUserId` is ignored)
    #[default]
    Sender,
    /// Deliver to the session resolved from `targetUserId`
    Target,
}

/// 通知配信のユースケース
pub struct NotificationUseCase<'a> {
    sessions: &'a dyn SessionRepository,
    broadcaster: &'a dyn Broadcaster,
}

impl<'a> NotificationUseCase<'a> {
    pub fn new(sessions: &'a dyn SessionRepository, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// メンション通知を送る
    ///
    /// The target is resolved by external user id, then by connection id.
    /// Returns the connection the mention was delivered to.
    pub fn mention(
        &self,
        connection: &ConnectionId,
        payload: MentionPayload,
    ) -> Result<ConnectionId, NotificationError> {
        let sender = self
            .sessions
            .get(connection)
            .ok_or_else(|| NotificationError::SessionNotFound(connection.clone()))?;
        let target = self
            .sessions
            .resolve(&payload.target_user_id)
            .map(|s| s.id.clone())
            .ok_or(NotificationError::TargetNotFound(payload.target_user_id))?;

        self.broadcaster.send_to(
            &target,
            &ServerEvent::NotificationMention(MentionEvent {
                from_user_id: connection.as_str().to_string(),
                from_user_name: sender.display_name.clone(),
                room_id: payload.room_id,
                message: payload.message,
                timestamp: Timestamp::now().value(),
            }),
        );
        tracing::debug!("Mention from '{}' delivered to '{}'", connection, target);
        Ok(target)
    }

    /// 通知を送る
    pub fn send(
        &self,
        connection: &ConnectionId,
        payload: SendNotificationPayload,
        delivery: NotificationDelivery,
    ) -> Result<Notification, NotificationError> {
        if self.sessions.get(connection).is_none() {
            return Err(NotificationError::SessionNotFound(connection.clone()));
        }
        let recipient = match (delivery, payload.target_user_id.as_deref()) {
            (NotificationDelivery::Target, Some(target)) => self
                .sessions
                .resolve(target)
                .map(|s| s.id.clone())
                .ok_or_else(|| NotificationError::TargetNotFound(target.to_string()))?,
            _ => connection.clone(),
        };

        let notification = Notification {
            id: NotificationIdFactory::generate(),
            target_user_id: payload.target_user_id,
            kind: payload.kind,
            title: payload.title,
            body: payload.body,
            link: payload.link,
            created_at: Timestamp::now(),
            read: false,
        };
        self.broadcaster.send_to(
            &recipient,
            &ServerEvent::NotificationReceive(NotificationEvent::from(&notification)),
        );
        Ok(notification)
    }

    /// 既読を通知する
    ///
    /// Read state lives on the client; the server only acknowledges.
    pub fn mark_read(
        &self,
        connection: &ConnectionId,
        notification_id: NotificationId,
    ) -> Result<(), NotificationError> {
        if self.sessions.get(connection).is_none() {
            return Err(NotificationError::SessionNotFound(connection.clone()));
        }
        self.broadcaster.send_to(
            connection,
            &ServerEvent::NotificationMarkedRead(MarkedReadEvent {
                notification_id: notification_id.as_str().to_string(),
                success: true,
            }),
        );
        Ok(())
    }
}

impl From<&Notification> for NotificationEvent {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.as_str().to_string(),
            target_user_id: notification.target_user_id.clone(),
            kind: notification.kind.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: notification.link.clone(),
            created_at: notification.created_at.value(),
            read: notification.read,
        }
    }
}
