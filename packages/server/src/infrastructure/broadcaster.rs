//! Channel-backed broadcaster.
//!
//! Each live WebSocket owns an unbounded mpsc receiver drained by its writer
//! task; the broadcaster holds the matching senders plus room groups
//! (transport-level subscriptions). Delivery is best-effort: a send to a
//! closed channel is logged and dropped.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    domain::{ConnectionId, RoomId},
    infrastructure::dto::websocket::ServerEvent,
    usecase::Broadcaster,
};

#[derive(Default)]
struct Inner {
    senders: HashMap<ConnectionId, UnboundedSender<String>>,
    groups: HashMap<RoomId, HashSet<ConnectionId>>,
}

/// Broadcaster delivering encoded frames over per-connection channels.
#[derive(Default)]
pub struct ChannelBroadcaster {
    inner: Mutex<Inner>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the outbound channel of a new connection.
    pub fn attach(&self, connection: ConnectionId, sender: UnboundedSender<String>) {
        self.lock().senders.insert(connection, sender);
    }

    /// Drop the outbound channel and every group subscription of a connection.
    pub fn detach(&self, connection: &ConnectionId) {
        let mut inner = self.lock();
        inner.senders.remove(connection);
        inner.groups.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
    }

    /// Send an already encoded frame to one connection.
    pub fn send_raw(&self, connection: &ConnectionId, frame: String) -> bool {
        let inner = self.lock();
        deliver(&inner, connection, frame)
    }

    /// Connections subscribed to `room`.
    pub fn subscribers(&self, room: &RoomId) -> Vec<ConnectionId> {
        let mut subscribers: Vec<ConnectionId> = self
            .lock()
            .groups
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        subscribers.sort();
        subscribers
    }

    fn fan_out(
        &self,
        event: &ServerEvent,
        targets: impl FnOnce(&Inner) -> Vec<ConnectionId>,
    ) {
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode event: {}", e);
                return;
            }
        };
        let inner = self.lock();
        for target in targets(&inner) {
            deliver(&inner, &target, frame.clone());
        }
    }
}

fn deliver(inner: &Inner, connection: &ConnectionId, frame: String) -> bool {
    match inner.senders.get(connection) {
        Some(sender) => {
            if sender.send(frame).is_err() {
                tracing::warn!("Failed to send frame to connection '{}'", connection);
                false
            } else {
                true
            }
        }
        None => {
            tracing::debug!("No channel for connection '{}'; frame dropped", connection);
            false
        }
    }
}

fn group_members(inner: &Inner, room: &RoomId) -> Vec<ConnectionId> {
    inner
        .groups
        .get(room)
        .map(|members| members.iter().cloned().collect())
        .unwrap_or_default()
}

impl Broadcaster for ChannelBroadcaster {
    fn subscribe(&self, connection: &ConnectionId, room: &RoomId) {
        self.lock()
            .groups
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
    }

    fn unsubscribe(&self, connection: &ConnectionId, room: &RoomId) {
        let mut inner = self.lock();
        if let Some(members) = inner.groups.get_mut(room) {
            members.remove(connection);
            if members.is_empty() {
                inner.groups.remove(room);
            }
        }
    }

    fn publish(&self, room: &RoomId, event: &ServerEvent) {
        self.fan_out(event, |inner| group_members(inner, room));
    }

    fn publish_except(&self, room: &RoomId, except: &ConnectionId, event: &ServerEvent) {
        self.fan_out(event, |inner| {
            group_members(inner, room)
                .into_iter()
                .filter(|id| id != except)
                .collect()
        });
    }

    fn publish_all_except(&self, except: &ConnectionId, event: &ServerEvent) {
        self.fan_out(event, |inner| {
            inner
                .senders
                .keys()
                .filter(|id| *id != except)
                .cloned()
                .collect()
        });
    }

    fn send_to(&self, connection: &ConnectionId, event: &ServerEvent) -> bool {
        match event.encode() {
            Ok(frame) => self.send_raw(connection, frame),
            Err(e) => {
                tracing::error!("Failed to encode event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::dto::websocket::{MarkedReadEvent, ServerEvent};
    use tokio::sync::mpsc;

    fn id(value: &str) -> ConnectionId {
        ConnectionId::new(value.to_string()).unwrap()
    }

    fn room(value: &str) -> RoomId {
        RoomId::new(value.to_string()).unwrap()
    }

    fn event() -> ServerEvent {
        ServerEvent::NotificationMarkedRead(MarkedReadEvent {
            notification_id: "n1".to_string(),
            success: true,
        })
    }

    #[test]
    fn test_publish_reaches_only_room_subscribers() {
        // テスト項目: ルーム宛の配信は購読中の接続だけに届く
        // given (前提条件):
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        broadcaster.attach(id("c2"), tx2);
        broadcaster.subscribe(&id("c1"), &room("team-42"));

        // when (操作):
        broadcaster.publish(&room("team-42"), &event());

        // then (期待する結果):
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        // テスト項目: 購読解除後はルーム配信が届かない
        // given (前提条件):
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        broadcaster.subscribe(&id("c1"), &room("team-42"));

        // when (操作):
        broadcaster.unsubscribe(&id("c1"), &room("team-42"));
        broadcaster.publish(&room("team-42"), &event());

        // then (期待する結果):
        assert!(rx1.try_recv().is_err());
        assert!(broadcaster.subscribers(&room("team-42")).is_empty());
    }

    #[test]
    fn test_publish_except_skips_sender() {
        // テスト項目: publish_except は指定した接続を除外する
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        broadcaster.attach(id("c2"), tx2);
        broadcaster.subscribe(&id("c1"), &room("r"));
        broadcaster.subscribe(&id("c2"), &room("r"));

        broadcaster.publish_except(&room("r"), &id("c1"), &event());

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_all_except() {
        // テスト項目: 全体配信は送信者以外の全接続に届く（ルーム不問）
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        broadcaster.attach(id("c2"), tx2);

        broadcaster.publish_all_except(&id("c1"), &event());

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_detach_removes_channel_and_groups() {
        // テスト項目: detach で送信チャンネルと購読が両方消える
        // given (前提条件):
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        broadcaster.subscribe(&id("c1"), &room("r"));

        // when (操作):
        broadcaster.detach(&id("c1"));

        // then (期待する結果):
        assert!(!broadcaster.send_to(&id("c1"), &event()));
        assert!(broadcaster.subscribers(&room("r")).is_empty());
    }

    #[test]
    fn test_send_to_closed_channel_is_dropped() {
        // テスト項目: 受信側が閉じた接続への送信は失敗として扱われ、パニックしない
        let broadcaster = ChannelBroadcaster::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        broadcaster.attach(id("c1"), tx1);
        drop(rx1);

        assert!(!broadcaster.send_to(&id("c1"), &event()));
    }
}
