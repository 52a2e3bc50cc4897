//! UseCase: セッションのライフサイクル
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - 接続（登録）、認証、プリファレンス更新、切断
//!
//! ### なぜこのテストが必要か
//! - 切断時はルーム所属とタイピング状態をクリアしてから登録解除しなければならない
//! - 残ったメンバーには減算後のオンライン数が通知される
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続、認証、プリファレンス更新、ルーム参加中の切断
//! - エッジケース：ルーム未参加での切断、二重切断

use crate::{
    domain::{
        ConnectionId, ExternalUserId, Preferences, RegistryError, Session, SessionRepository,
        Timestamp,
    },
    infrastructure::dto::websocket::{
        AuthenticatedEvent, ConnectedEvent, PreferencesUpdatedEvent, ServerEvent, UserLeftEvent,
    },
};

use super::{broadcaster::Broadcaster, error::SessionError};

/// セッションライフサイクルのユースケース
pub struct SessionUseCase<'a> {
    sessions: &'a mut dyn SessionRepository,
    broadcaster: &'a dyn Broadcaster,
}

impl<'a> SessionUseCase<'a> {
    pub fn new(sessions: &'a mut dyn SessionRepository, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// 接続を登録する
    ///
    /// Sends `connected` to the new connection so it learns its own id.
    pub fn connect(&mut self, connection: ConnectionId) -> Result<(), SessionError> {
        let session = Session::new(connection.clone(), Timestamp::now());
        let event = ServerEvent::Connected(ConnectedEvent {
            user_id: connection.as_str().to_string(),
            user_name: session.display_name.clone(),
        });
        self.sessions.register(session)?;
        self.broadcaster.send_to(&connection, &event);
        tracing::info!(
            "Connection '{}' registered ({} online)",
            connection,
            self.sessions.count()
        );
        Ok(())
    }

    /// Merge client-supplied identity (from `room:join`). Absent or empty
    /// fields are kept; values are otherwise stored as given.
    pub fn merge_identity(
        &mut self,
        connection: &ConnectionId,
        user_id: Option<String>,
        user_name: Option<String>,
    ) -> Result<(), SessionError> {
        let user_id = user_id.and_then(ExternalUserId::new);
        let session = self.session_mut(connection)?;
        session.apply_identity(user_id, user_name);
        Ok(())
    }

    /// 認証情報で上書きする
    ///
    /// Identity is trusted as given; verification happens outside the core.
    pub fn authenticate(
        &mut self,
        connection: &ConnectionId,
        user_id: String,
        user_name: String,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(connection)?;
        session.authenticate(ExternalUserId::new(user_id), user_name);
        let event = ServerEvent::AuthenticationSuccess(AuthenticatedEvent {
            user_id: session
                .external_user_id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
            user_name: session.display_name.clone(),
        });
        self.broadcaster.send_to(connection, &event);
        Ok(())
    }

    /// プリファレンスを浅くマージする
    ///
    /// Returns the full merged bag, which is also sent back as
    /// `preferences:updated`.
    pub fn update_preferences(
        &mut self,
        connection: &ConnectionId,
        patch: Preferences,
    ) -> Result<Preferences, SessionError> {
        let session = self.session_mut(connection)?;
        session.merge_preferences(patch);
        let preferences = session.preferences.clone();
        self.broadcaster.send_to(
            connection,
            &ServerEvent::PreferencesUpdated(PreferencesUpdatedEvent {
                preferences: preferences.clone(),
            }),
        );
        Ok(preferences)
    }

    /// 切断処理
    ///
    /// Clears room membership and typing state, broadcasts `user:left` to
    /// the remaining room members, then unregisters. A second call for the
    /// same connection is a no-op that returns `None`.
    pub fn disconnect(&mut self, connection: &ConnectionId) -> Option<Session> {
        let session = self.sessions.get_mut(connection)?;
        if let Some(room_id) = session.clear_room() {
            let user_name = session.display_name.clone();
            self.broadcaster.unsubscribe(connection, &room_id);
            let online_count = self.sessions.count().saturating_sub(1);
            self.broadcaster.publish(
                &room_id,
                &ServerEvent::UserLeft(UserLeftEvent {
                    user_id: connection.as_str().to_string(),
                    user_name,
                    room_id: room_id.as_str().to_string(),
                    online_count,
                }),
            );
        }
        let removed = self.sessions.unregister(connection);
        tracing::info!(
            "Connection '{}' unregistered ({} online)",
            connection,
            self.sessions.count()
        );
        removed
    }

    fn session_mut(&mut self, connection: &ConnectionId) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(connection)
            .ok_or_else(|| RegistryError::SessionNotFound(connection.clone()).into())
    }
}
