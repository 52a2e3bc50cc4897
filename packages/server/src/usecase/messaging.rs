//! UseCase: メッセージ送信とタイピング状態
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MessagingUseCase::send_message() / set_typing()
//!
//! ### なぜこのテストが必要か
//! - 送信者が参加していないルームへのメッセージはどこにも配信されてはならない
//! - タイピング状態は参加中のルームに対してだけ切り替わる
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージ送信、タイピング開始・停止
//! - 異常系：ルーム不一致、状態が変わらないタイピング通知
//! - 境界値：長いメッセージや空白を含むメッセージもそのまま配信される

use crate::{
    domain::{ChatMessage, ConnectionId, MessageIdFactory, RoomId, SessionRepository, Timestamp},
    infrastructure::dto::websocket::{MessageReceivedEvent, ServerEvent, UserTypingEvent},
};

use super::{broadcaster::Broadcaster, error::MessagingError};

/// メッセージ送信・タイピングのユースケース
pub struct MessagingUseCase<'a> {
    sessions: &'a mut dyn SessionRepository,
    broadcaster: &'a dyn Broadcaster,
}

impl<'a> MessagingUseCase<'a> {
    pub fn new(sessions: &'a mut dyn SessionRepository, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// メッセージを送信する
    ///
    /// `room_id` must equal the sender's current room. The message is
    /// broadcast to every member of the room, the sender included.
    pub fn send_message(
        &mut self,
        connection: &ConnectionId,
        room_id: String,
        content: String,
        ids: &MessageIdFactory,
    ) -> Result<ChatMessage, MessagingError> {
        let room_id = self.require_room(connection, room_id)?;
        let sender_name = self
            .sessions
            .get(connection)
            .map(|s| s.display_name.clone())
            .ok_or_else(|| MessagingError::SessionNotFound(connection.clone()))?;

        let created_at = Timestamp::now();
        let message = ChatMessage {
            id: ids.generate(created_at),
            sender: connection.clone(),
            sender_name,
            room_id,
            content,
            created_at,
        };

        self.broadcaster.publish(
            &message.room_id,
            &ServerEvent::MessageReceived(MessageReceivedEvent {
                id: message.id.value(),
                user_id: message.sender.as_str().to_string(),
                user_name: message.sender_name.clone(),
                room_id: message.room_id.as_str().to_string(),
                content: message.content.clone(),
                timestamp: message.created_at.value(),
            }),
        );
        tracing::debug!(
            "Message {} from '{}' broadcast to room '{}'",
            message.id,
            connection,
            message.room_id
        );

        Ok(message)
    }

    /// タイピング状態を切り替える
    ///
    /// Broadcasts `user:typing` to the other members only when the flag
    /// actually changes. Returns whether it changed.
    pub fn set_typing(
        &mut self,
        connection: &ConnectionId,
        room_id: String,
        is_typing: bool,
    ) -> Result<bool, MessagingError> {
        let room_id = self.require_room(connection, room_id)?;
        let session = self
            .sessions
            .get_mut(connection)
            .ok_or_else(|| MessagingError::SessionNotFound(connection.clone()))?;
        if session.is_typing == is_typing {
            return Ok(false);
        }
        session.is_typing = is_typing;
        let user_name = session.display_name.clone();

        self.broadcaster.publish_except(
            &room_id,
            connection,
            &ServerEvent::UserTyping(UserTypingEvent {
                user_id: connection.as_str().to_string(),
                user_name,
                is_typing,
            }),
        );
        Ok(true)
    }

    /// Validate `room_id` and check that the sender is currently in it.
    fn require_room(
        &self,
        connection: &ConnectionId,
        room_id: String,
    ) -> Result<RoomId, MessagingError> {
        let room_id = RoomId::new(room_id).map_err(MessagingError::InvalidRoom)?;
        let session = self
            .sessions
            .get(connection)
            .ok_or_else(|| MessagingError::SessionNotFound(connection.clone()))?;
        if !session.is_in(&room_id) {
            return Err(MessagingError::NotInRoom {
                session: connection.clone(),
                room: room_id,
            });
        }
        Ok(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Session,
        infrastructure::repository::InMemorySessionRepository,
        usecase::broadcaster::MockBroadcaster,
    };
    use mockall::predicate::eq;

    fn id(value: &str) -> ConnectionId {
        ConnectionId::new(value.to_string()).unwrap()
    }

    fn room(value: &str) -> RoomId {
        RoomId::new(value.to_string()).unwrap()
    }

    fn repository_in_room(conn: &str, room_id: &str) -> InMemorySessionRepository {
        let mut repository = InMemorySessionRepository::new();
        let mut session = Session::new(id(conn), Timestamp::new(0));
        session.display_name = "alice".to_string();
        session.current_room = Some(room(room_id));
        repository.register(session).unwrap();
        repository
    }

    #[test]
    fn test_send_message_broadcasts_to_room() {
        // テスト項目: 参加中のルームにメッセージが配信される
        // given (前提条件):
        let mut repository = repository_in_room("c1", "team-42");
        let ids = MessageIdFactory::new();
        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_publish()
            .withf(|r, event| {
                r.as_str() == "team-42"
                    && matches!(event, ServerEvent::MessageReceived(m)
                        if m.content == "hello" && m.user_id == "c1" && m.user_name == "alice"
                            && m.room_id == "team-42")
            })
            .times(1)
            .return_const(());

        // when (操作):
        let result = MessagingUseCase::new(&mut repository, &broadcaster).send_message(
            &id("c1"),
            "team-42".to_string(),
            "hello".to_string(),
            &ids,
        );

        // then (期待する結果):
        let message = result.unwrap();
        assert_eq!(message.content.as_str(), "hello");
        assert_eq!(message.room_id, room("team-42"));
    }

    #[test]
    fn test_send_message_to_other_room_is_rejected() {
        // テスト項目: 参加していないルーム宛のメッセージはどこにも配信されない
        // given (前提条件):
        let mut repository = repository_in_room("c1", "team-42");
        let ids = MessageIdFactory::new();
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_publish().times(0);

        // when (操作):
        let result = MessagingUseCase::new(&mut repository, &broadcaster).send_message(
            &id("c1"),
            "team-7".to_string(),
            "hello".to_string(),
            &ids,
        );

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MessagingError::NotInRoom {
                session: id("c1"),
                room: room("team-7"),
            })
        );
    }

    #[test]
    fn test_message_content_is_relayed_verbatim() {
        // テスト項目: メッセージ内容は長さや空白に関係なくそのまま配信される
        // given (前提条件):
        let mut repository = repository_in_room("c1", "team-42");
        let ids = MessageIdFactory::new();
        let long = format!("  {}  ", "a".repeat(10_001));
        let expected = long.clone();
        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_publish()
            .withf(move |r, event| {
                r.as_str() == "team-42"
                    && matches!(event, ServerEvent::MessageReceived(m) if m.content == expected)
            })
            .times(1)
            .return_const(());

        // when (操作):
        let result = MessagingUseCase::new(&mut repository, &broadcaster).send_message(
            &id("c1"),
            "team-42".to_string(),
            long.clone(),
            &ids,
        );

        // then (期待する結果):
        assert_eq!(result.unwrap().content, long);
    }

    #[test]
    fn test_typing_start_and_stop() {
        // テスト項目: タイピング開始・停止が送信者以外のメンバーに配信される
        // given (前提条件):
        let mut repository = repository_in_room("c1", "team-42");
        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_publish_except()
            .with(
                eq(room("team-42")),
                eq(id("c1")),
                eq(ServerEvent::UserTyping(UserTypingEvent {
                    user_id: "c1".to_string(),
                    user_name: "alice".to_string(),
                    is_typing: true,
                })),
            )
            .times(1)
            .return_const(());
        broadcaster
            .expect_publish_except()
            .with(
                eq(room("team-42")),
                eq(id("c1")),
                eq(ServerEvent::UserTyping(UserTypingEvent {
                    user_id: "c1".to_string(),
                    user_name: "alice".to_string(),
                    is_typing: false,
                })),
            )
            .times(1)
            .return_const(());

        // when (操作):
        let mut usecase = MessagingUseCase::new(&mut repository, &broadcaster);
        let started = usecase.set_typing(&id("c1"), "team-42".to_string(), true);
        let stopped = usecase.set_typing(&id("c1"), "team-42".to_string(), false);

        // then (期待する結果):
        assert_eq!(started, Ok(true));
        assert_eq!(stopped, Ok(true));
        assert!(!repository.get(&id("c1")).unwrap().is_typing);
    }

    #[test]
    fn test_repeated_typing_start_is_not_rebroadcast() {
        // テスト項目: 状態が変わらないタイピング通知は再配信されない
        let mut repository = repository_in_room("c1", "team-42");
        repository.get_mut(&id("c1")).unwrap().is_typing = true;
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_publish_except().times(0);

        let result = MessagingUseCase::new(&mut repository, &broadcaster).set_typing(
            &id("c1"),
            "team-42".to_string(),
            true,
        );

        assert_eq!(result, Ok(false));
    }

    #[test]
    fn test_typing_in_other_room_is_rejected() {
        // テスト項目: 参加していないルームのタイピング通知は状態を変えない
        let mut repository = repository_in_room("c1", "team-42");
        let broadcaster = MockBroadcaster::new();

        let result = MessagingUseCase::new(&mut repository, &broadcaster).set_typing(
            &id("c1"),
            "lobby".to_string(),
            true,
        );

        assert!(matches!(result, Err(MessagingError::NotInRoom { .. })));
        assert!(!repository.get(&id("c1")).unwrap().is_typing);
    }
}
