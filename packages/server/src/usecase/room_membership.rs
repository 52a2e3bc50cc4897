//! UseCase: ルーム参加・退出
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RoomMembershipUseCase::join() / leave()
//! - ルーム切り替え時の旧ルームへの user:left 通知、新ルームへの room:update 通知
//!
//! ### なぜこのテストが必要か
//! - セッションは同時に 1 つのルームにしか所属できない
//! - 退出したセッションに古いルームの配信が届いてはならない
//! - タイピング状態はルーム移動で必ずクリアされる
//!
//! ### どのような状況を想定しているか
//! - 正常系：初回参加、ルーム切り替え、同じルームへの再参加、退出
//! - 異常系：ルーム未参加での退出、切断済みセッション

use crate::{
    domain::{ConnectionId, RoomId, SessionRepository},
    infrastructure::dto::websocket::{
        JoinAck, MemberView, RoomUpdateEvent, RoomUserLeaveEvent, ServerEvent, UserLeftEvent,
    },
};

use super::{broadcaster::Broadcaster, error::MembershipError};

/// ルーム参加・退出のユースケース
pub struct RoomMembershipUseCase<'a> {
    sessions: &'a mut dyn SessionRepository,
    broadcaster: &'a dyn Broadcaster,
}

impl<'a> RoomMembershipUseCase<'a> {
    pub fn new(sessions: &'a mut dyn SessionRepository, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// ルームに参加する
    ///
    /// Leaves the previous room first (broadcasting `user:left` there), then
    /// subscribes to `room_id` and broadcasts the recomputed member list as
    /// `room:update`. Joining the current room again only re-broadcasts the
    /// member list.
    pub fn join(
        &mut self,
        connection: &ConnectionId,
        room_id: RoomId,
    ) -> Result<JoinAck, MembershipError> {
        let previous = self
            .sessions
            .get(connection)
            .ok_or_else(|| MembershipError::SessionNotFound(connection.clone()))?
            .current_room
            .clone();

        if let Some(old_room) = previous.filter(|old| *old != room_id) {
            self.switch_out(connection, &old_room);
        }

        if let Some(session) = self.sessions.get_mut(connection) {
            session.current_room = Some(room_id.clone());
        }
        self.broadcaster.subscribe(connection, &room_id);

        let members: Vec<MemberView> = self
            .sessions
            .members_of(&room_id)
            .into_iter()
            .map(MemberView::from)
            .collect();
        let member_count = members.len();
        self.broadcaster.publish(
            &room_id,
            &ServerEvent::RoomUpdate(RoomUpdateEvent {
                room_id: room_id.as_str().to_string(),
                members,
                member_count,
            }),
        );
        tracing::info!(
            "Connection '{}' joined room '{}' ({} members)",
            connection,
            room_id,
            member_count
        );

        Ok(JoinAck {
            success: true,
            room_id: room_id.into_string(),
            member_count,
        })
    }

    /// ルームから退出する
    ///
    /// Returns the room that was left.
    pub fn leave(&mut self, connection: &ConnectionId) -> Result<RoomId, MembershipError> {
        let session = self
            .sessions
            .get_mut(connection)
            .ok_or_else(|| MembershipError::SessionNotFound(connection.clone()))?;
        let Some(room_id) = session.clear_room() else {
            return Err(MembershipError::NotInRoom(connection.clone()));
        };
        let user_name = session.display_name.clone();

        self.broadcaster.unsubscribe(connection, &room_id);
        self.broadcaster.publish(
            &room_id,
            &ServerEvent::RoomUserLeave(RoomUserLeaveEvent {
                user_id: connection.as_str().to_string(),
                user_name,
                room_id: room_id.as_str().to_string(),
            }),
        );
        tracing::info!("Connection '{}' left room '{}'", connection, room_id);

        Ok(room_id)
    }

    /// Implicit leave performed when joining a different room.
    fn switch_out(&mut self, connection: &ConnectionId, old_room: &RoomId) {
        let Some(session) = self.sessions.get_mut(connection) else {
            return;
        };
        session.clear_room();
        let user_name = session.display_name.clone();

        self.broadcaster.unsubscribe(connection, old_room);
        let online_count = self.sessions.count();
        self.broadcaster.publish(
            old_room,
            &ServerEvent::UserLeft(UserLeftEvent {
                user_id: connection.as_str().to_string(),
                user_name,
                room_id: old_room.as_str().to_string(),
                online_count,
            }),
        );
        tracing::debug!("Connection '{}' switched out of room '{}'", connection, old_room);
    }
}
