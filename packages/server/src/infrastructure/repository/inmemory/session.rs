//! InMemory Session Repository 実装
//!
//! ドメイン層が定義する SessionRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。プロセスが終了すれば全て消えます。
//!
//! セッション数に上限はありません（永続化しないため、スケーラビリティ上の制約であって
//! 正しさの問題ではない）。

use std::collections::{BTreeMap, HashMap};

use crate::domain::{ConnectionId, RegistryError, RoomId, Session, SessionRepository};

/// インメモリ Session Repository 実装
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: HashMap<ConnectionId, Session>,
}

impl InMemorySessionRepository {
    /// 新しい InMemorySessionRepository を作成
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted<'a>(mut sessions: Vec<&'a Session>) -> Vec<&'a Session> {
        sessions.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn register(&mut self, session: Session) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&session.id) {
            return Err(RegistryError::AlreadyRegistered(session.id));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn get(&self, id: &ConnectionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Earliest-connected session wins when several share `user_id`.
    fn find_by_external_user_id(&self, user_id: &str) -> Option<&Session> {
        Self::sorted(self.sessions.values().collect())
            .into_iter()
            .find(|s| {
                s.external_user_id
                    .as_ref()
                    .is_some_and(|id| id.as_str() == user_id)
            })
    }

    fn unregister(&mut self, id: &ConnectionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    fn members_of(&self, room_id: &RoomId) -> Vec<&Session> {
        Self::sorted(self.sessions.values().filter(|s| s.is_in(room_id)).collect())
    }

    fn all(&self) -> Vec<&Session> {
        Self::sorted(self.sessions.values().collect())
    }

    fn rooms(&self) -> Vec<(RoomId, usize)> {
        let mut rooms: BTreeMap<RoomId, usize> = BTreeMap::new();
        for room in self.sessions.values().filter_map(|s| s.current_room.clone()) {
            *rooms.entry(room).or_default() += 1;
        }
        rooms.into_iter().collect()
    }

    fn count(&self) -> usize {
        self.sessions.len()
    }
}
