//! Client session controller.
//!
//! Owns exactly one connection lifecycle: connects lazily on `start`,
//! joins the configured room on every successful connect, reconciles the
//! local [`ChatView`] from server events, debounces typing, and reconnects
//! with a bounded, fixed-delay policy.
//!
//! ```text
//! Connecting -> Connected -> Disconnected -> Reconnecting{n} -> Connected | GivenUp
//! ```
//!
//! The UI talks to the background task through a [`SessionHandle`].
//! Dropping the handle (or calling [`SessionHandle::shutdown`]) leaves the
//! room, clears the typing timer and closes the connection.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hiroba_server::{
    domain::Preferences,
    infrastructure::dto::websocket::{
        ActivityPayload, AuthenticatePayload, ClientEvent, ClientFrame, IncomingFrame,
        JoinRoomPayload, LeaveRoomPayload, MarkReadPayload, MentionPayload,
        SendMessagePayload, SendNotificationPayload, StatusPayload, TypingPayload,
    },
};
use serde_json::Value;
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::Instant,
};

use crate::{
    config::ClientConfig,
    connector::{Connection, Connector},
    error::ClientError,
    typing::TypingDebouncer,
    view::{ChatView, ViewEvent},
};

/// Capacity of the view event channel handed to the UI
const VIEW_EVENT_BUFFER: usize = 256;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    GivenUp,
}

/// Bounded retries with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (1-based), or `None` once retries are exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt <= self.max_attempts).then_some(self.delay)
    }
}

#[derive(Debug)]
enum Command {
    Send(String),
    Keystroke,
    Join(String),
    Leave,
    Status(String),
    Activity { activity: String, details: Value },
    Mention { target: String, message: String },
    Notify(SendNotificationPayload),
    MarkRead(String),
    UpdatePreferences(Preferences),
    Authenticate { user_id: String, user_name: String },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The connection dropped; reconnect
    Lost,
    /// The handle asked to stop
    Shutdown,
}

/// Lazily connecting session controller.
pub struct SessionController {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
}

impl SessionController {
    /// Create a controller. No I/O happens until [`SessionController::start`].
    pub fn new(config: ClientConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
        }
    }

    /// Spawn the session task. Must be called inside a tokio runtime.
    pub fn start(self) -> (SessionHandle, mpsc::Receiver<ViewEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(VIEW_EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let view = Arc::new(Mutex::new(ChatView::new(self.config.history_capacity)));
        lock(&view).enter_room(&self.config.room);

        let session = Session {
            connector: self.connector,
            policy: self.config.reconnect_policy(),
            room: Some(self.config.room.clone()),
            user_id: self.config.user_id.clone(),
            user_name: self.config.name.clone(),
            commands: command_rx,
            events: event_tx,
            state: state_tx,
            view: view.clone(),
            typing: TypingDebouncer::new(self.config.typing_idle()),
        };
        let task = tokio::spawn(session.run());

        let handle = SessionHandle {
            commands: command_tx,
            state: state_rx,
            view,
            task: Some(task),
        };
        (handle, event_rx)
    }
}

/// UI-side handle of a running session.
pub struct SessionHandle {
    commands: UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    view: Arc<Mutex<ChatView>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Send a chat message to the current room. Blank text, or any text
    /// while not connected, is dropped.
    pub fn send(&self, text: impl Into<String>) {
        self.command(Command::Send(text.into()));
    }

    /// Record a keystroke in the message input.
    pub fn keystroke(&self) {
        self.command(Command::Keystroke);
    }

    pub fn join(&self, room: impl Into<String>) {
        self.command(Command::Join(room.into()));
    }

    pub fn leave(&self) {
        self.command(Command::Leave);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.command(Command::Status(status.into()));
    }

    pub fn report_activity(&self, activity: impl Into<String>, details: Value) {
        self.command(Command::Activity {
            activity: activity.into(),
            details,
        });
    }

    /// Mention a user by external user id or connection id.
    pub fn mention(&self, target: impl Into<String>, message: impl Into<String>) {
        self.command(Command::Mention {
            target: target.into(),
            message: message.into(),
        });
    }

    pub fn notify(&self, notification: SendNotificationPayload) {
        self.command(Command::Notify(notification));
    }

    pub fn mark_read(&self, notification_id: impl Into<String>) {
        self.command(Command::MarkRead(notification_id.into()));
    }

    pub fn update_preferences(&self, patch: Preferences) {
        self.command(Command::UpdatePreferences(patch));
    }

    pub fn authenticate(&self, user_id: impl Into<String>, user_name: impl Into<String>) {
        self.command(Command::Authenticate {
            user_id: user_id.into(),
            user_name: user_name.into(),
        });
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver for state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Snapshot of the local view.
    pub fn view(&self) -> ChatView {
        lock(&self.view).clone()
    }

    /// Leave the room, close the connection and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.command(Command::Shutdown);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::error!("Session task failed: {}", e);
        }
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Session task has stopped; command dropped");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            // the task cleans up on its own once it sees this
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}

struct Session {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    room: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    commands: UnboundedReceiver<Command>,
    events: mpsc::Sender<ViewEvent>,
    state: watch::Sender<ConnectionState>,
    view: Arc<Mutex<ChatView>>,
    typing: TypingDebouncer,
}

impl Session {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            self.set_state(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            });

            match self.connect_or_shutdown().await {
                None => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                Some(Ok(connection)) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    let exit = self.drive(connection).await;
                    self.set_state(ConnectionState::Disconnected);
                    if exit == Exit::Shutdown {
                        return;
                    }
                    tracing::warn!("Connection lost");
                }
                Some(Err(e)) => {
                    tracing::warn!("Connection attempt failed: {}", e);
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            attempt += 1;
            let Some(delay) = self.policy.next_delay(attempt) else {
                tracing::error!(
                    "Giving up after {} reconnect attempts",
                    self.policy.max_attempts
                );
                self.set_state(ConnectionState::GivenUp);
                return;
            };
            if !self.wait_before_retry(delay).await {
                return;
            }
        }
    }

    /// Connect, handling commands meanwhile. `None` means shutdown was requested.
    async fn connect_or_shutdown(&mut self) -> Option<Result<Connection, ClientError>> {
        let connector = self.connector.clone();
        let connecting = connector.connect();
        tokio::pin!(connecting);
        loop {
            tokio::select! {
                result = &mut connecting => return Some(result),
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return None,
                    Some(command) => self.handle_offline(command),
                },
            }
        }
    }

    /// Sleep `delay`, handling commands meanwhile. Returns false on shutdown.
    async fn wait_before_retry(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return false,
                    Some(command) => self.handle_offline(command),
                },
            }
        }
    }

    async fn drive(&mut self, mut connection: Connection) -> Exit {
        if let Some(room) = self.room.clone() {
            self.emit_join(&connection, room);
        }

        loop {
            let deadline = self.typing.deadline();
            tokio::select! {
                frame = connection.incoming.recv() => match frame {
                    Some(text) => self.handle_frame(&text),
                    None => {
                        self.typing.stop();
                        lock(&self.view).connection_lost();
                        return Exit::Lost;
                    }
                },
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        self.close(&connection);
                        return Exit::Shutdown;
                    }
                    Some(command) => self.handle_command(command, &connection),
                },
                _ = wait_until(deadline) => {
                    if self.typing.expire(Instant::now()) {
                        self.emit_typing(&connection, false);
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match IncomingFrame::decode(text) {
            Ok(IncomingFrame::Event(event)) => {
                let change = lock(&self.view).apply(event);
                if let Some(change) = change {
                    self.notify_view(change);
                }
            }
            Ok(IncomingFrame::Ack { ack, .. }) => {
                tracing::debug!("Unexpected ack {}", ack);
            }
            Err(e) => tracing::warn!("Ignoring frame: {}", e),
        }
    }

    fn handle_command(&mut self, command: Command, connection: &Connection) {
        match command {
            Command::Send(text) => {
                if text.trim().is_empty() {
                    return;
                }
                let Some(room_id) = self.room.clone() else {
                    tracing::debug!("Not in a room; message dropped");
                    return;
                };
                emit(
                    connection,
                    ClientEvent::MessageSend(SendMessagePayload {
                        room_id,
                        message: text,
                    }),
                );
                if self.typing.stop() {
                    self.emit_typing(connection, false);
                }
            }
            Command::Keystroke => {
                if self.room.is_some() && self.typing.keystroke(Instant::now()) {
                    self.emit_typing(connection, true);
                }
            }
            Command::Join(room) => {
                if self.typing.stop() {
                    self.emit_typing(connection, false);
                }
                lock(&self.view).enter_room(&room);
                self.room = Some(room.clone());
                self.emit_join(connection, room);
            }
            Command::Leave => {
                let Some(room) = self.room.take() else {
                    return;
                };
                // leaving clears the typing flag on the server
                self.typing.stop();
                lock(&self.view).leave_room();
                emit(
                    connection,
                    ClientEvent::RoomLeave(LeaveRoomPayload {
                        room_id: Some(room),
                    }),
                );
            }
            Command::Status(status) => {
                emit(connection, ClientEvent::UserStatus(StatusPayload { status }));
            }
            Command::Activity { activity, details } => emit(
                connection,
                ClientEvent::UserActivity(ActivityPayload { activity, details }),
            ),
            Command::Mention { target, message } => emit(
                connection,
                ClientEvent::MentionUser(MentionPayload {
                    target_user_id: target,
                    room_id: self.room.clone(),
                    message,
                }),
            ),
            Command::Notify(payload) => emit(connection, ClientEvent::NotificationSend(payload)),
            Command::MarkRead(notification_id) => {
                lock(&self.view).mark_read(&notification_id);
                emit(
                    connection,
                    ClientEvent::NotificationMarkRead(MarkReadPayload { notification_id }),
                );
            }
            Command::UpdatePreferences(patch) => {
                emit(connection, ClientEvent::PreferencesUpdate(patch));
            }
            Command::Authenticate { user_id, user_name } => {
                self.user_id = Some(user_id.clone());
                self.user_name = Some(user_name.clone());
                emit(
                    connection,
                    ClientEvent::Authenticate(AuthenticatePayload { user_id, user_name }),
                );
            }
            Command::Shutdown => {}
        }
    }

    /// Commands received while not connected only update local intent.
    fn handle_offline(&mut self, command: Command) {
        match command {
            Command::Join(room) => {
                lock(&self.view).enter_room(&room);
                self.room = Some(room);
            }
            Command::Leave => {
                lock(&self.view).leave_room();
                self.room = None;
            }
            Command::Authenticate { user_id, user_name } => {
                self.user_id = Some(user_id);
                self.user_name = Some(user_name);
            }
            Command::MarkRead(notification_id) => {
                lock(&self.view).mark_read(&notification_id);
            }
            other => tracing::debug!("Not connected; dropped {:?}", other),
        }
    }

    fn close(&mut self, connection: &Connection) {
        if let Some(room) = self.room.clone() {
            emit(
                connection,
                ClientEvent::RoomLeave(LeaveRoomPayload {
                    room_id: Some(room),
                }),
            );
        }
        self.typing.stop();
        tracing::info!("Session closed");
    }

    fn emit_join(&self, connection: &Connection, room_id: String) {
        emit(
            connection,
            ClientEvent::RoomJoin(JoinRoomPayload {
                room_id,
                user_id: self.user_id.clone(),
                user_name: self.user_name.clone(),
            }),
        );
    }

    fn emit_typing(&self, connection: &Connection, is_typing: bool) {
        let Some(room_id) = self.room.clone() else {
            return;
        };
        let payload = TypingPayload { room_id };
        emit(
            connection,
            if is_typing {
                ClientEvent::TypingStart(payload)
            } else {
                ClientEvent::TypingStop(payload)
            },
        );
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        tracing::debug!("Connection state: {:?}", state);
        self.notify_view(ViewEvent::State(state));
    }

    fn notify_view(&self, event: ViewEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("View event buffer full; dropped {:?}", event);
            }
        }
    }
}

fn emit(connection: &Connection, event: ClientEvent) {
    let name = event.name();
    match (ClientFrame { event, ack: None }).encode() {
        Ok(frame) => {
            if connection.outgoing.send(frame).is_err() {
                tracing::debug!("Connection closed; '{}' dropped", name);
            }
        }
        Err(e) => tracing::error!("Failed to encode '{}': {}", name, e),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn lock(view: &Mutex<ChatView>) -> MutexGuard<'_, ChatView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hiroba_server::infrastructure::dto::websocket::{
        ConnectedEvent, MessageReceivedEvent, ServerEvent,
    };
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    const WAIT: Duration = Duration::from_secs(2);

    /// Server side of an in-memory connection.
    struct ServerEnd {
        from_client: UnboundedReceiver<String>,
        to_client: UnboundedSender<String>,
    }

    impl ServerEnd {
        async fn next_event(&mut self) -> ClientEvent {
            let text = tokio::time::timeout(WAIT, self.from_client.recv())
                .await
                .expect("timed out waiting for a client frame")
                .expect("client closed the connection");
            ClientFrame::decode(&text).unwrap().event
        }

        async fn closed(&mut self) -> bool {
            matches!(
                tokio::time::timeout(WAIT, self.from_client.recv()).await,
                Ok(None)
            )
        }

        fn push(&self, event: ServerEvent) {
            self.to_client.send(event.encode().unwrap()).unwrap();
        }
    }

    /// Accepts or refuses connections in the scripted order, then refuses.
    struct ScriptedConnector {
        script: Mutex<VecDeque<bool>>,
        attempts: Arc<AtomicUsize>,
        servers: UnboundedSender<ServerEnd>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self) -> Result<Connection, ClientError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let accept = self.script.lock().unwrap().pop_front().unwrap_or(false);
            if !accept {
                return Err(ClientError::Refused("scripted refusal".to_string()));
            }
            let (outgoing, from_client) = mpsc::unbounded_channel();
            let (to_client, incoming) = mpsc::unbounded_channel();
            let _ = self.servers.send(ServerEnd {
                from_client,
                to_client,
            });
            Ok(Connection { outgoing, incoming })
        }
    }

    fn scripted(
        script: &[bool],
    ) -> (
        ScriptedConnector,
        Arc<AtomicUsize>,
        UnboundedReceiver<ServerEnd>,
    ) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (servers, server_rx) = mpsc::unbounded_channel();
        let connector = ScriptedConnector {
            script: Mutex::new(script.iter().copied().collect()),
            attempts: attempts.clone(),
            servers,
        };
        (connector, attempts, server_rx)
    }

    fn config() -> ClientConfig {
        ClientConfig {
            url: "ws://127.0.0.1:3001/api/socket".to_string(),
            room: "team-42".to_string(),
            user_id: Some("user-alice".to_string()),
            name: Some("alice".to_string()),
            max_retries: 2,
            retry_delay_ms: 10,
            history_capacity: 500,
            typing_idle_ms: 50,
        }
    }

    async fn next_server(servers: &mut UnboundedReceiver<ServerEnd>) -> ServerEnd {
        tokio::time::timeout(WAIT, servers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    async fn collect_states_until(
        events: &mut mpsc::Receiver<ViewEvent>,
        last: ConnectionState,
    ) -> Vec<ConnectionState> {
        let mut states = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(WAIT, events.recv()).await {
            if let ViewEvent::State(state) = event {
                states.push(state);
                if state == last {
                    break;
                }
            }
        }
        states
    }

    fn join_event(room: &str) -> ClientEvent {
        ClientEvent::RoomJoin(JoinRoomPayload {
            room_id: room.to_string(),
            user_id: Some("user-alice".to_string()),
            user_name: Some("alice".to_string()),
        })
    }

    fn typing_stop() -> ClientEvent {
        ClientEvent::TypingStop(TypingPayload {
            room_id: "team-42".to_string(),
        })
    }

    #[test]
    fn test_reconnect_policy_is_bounded() {
        // テスト項目: 最大回数までは固定間隔、それ以降は諦める
        let policy = ReconnectPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(500),
        };

        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(3), None);
    }

    #[test]
    fn test_new_does_not_connect() {
        // テスト項目: コントローラの生成だけでは接続しない
        let (connector, attempts, _servers) = scripted(&[true]);

        let _controller = SessionController::new(config(), connector);

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_joins_room_on_connect() {
        // テスト項目: 接続するとすぐに現在の ID で room:join を送る
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[true]);

        // when (操作):
        let (handle, mut events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;

        // then (期待する結果):
        assert_eq!(server.next_event().await, join_event("team-42"));
        let states = collect_states_until(&mut events, ConnectionState::Connected).await;
        assert_eq!(
            states,
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_send_skips_blank_text_and_stops_typing() {
        // テスト項目: 空白だけの送信は何もせず、送信時にタイピングを停止する
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let mut config = config();
        config.typing_idle_ms = 60_000;
        let (handle, _events) = SessionController::new(config, connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;

        // when (操作):
        handle.keystroke();
        handle.keystroke();
        handle.send("   ");
        handle.send("hello");

        // then (期待する結果):
        assert_eq!(
            server.next_event().await,
            ClientEvent::TypingStart(TypingPayload {
                room_id: "team-42".to_string()
            })
        );
        assert_eq!(
            server.next_event().await,
            ClientEvent::MessageSend(SendMessagePayload {
                room_id: "team-42".to_string(),
                message: "hello".to_string(),
            })
        );
        assert_eq!(server.next_event().await, typing_stop());
    }

    #[tokio::test]
    async fn test_typing_stops_after_idle() {
        // テスト項目: 最後のキー入力から一定時間で typing:stop が自動送信される
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let (handle, _events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;

        handle.keystroke();

        assert!(matches!(server.next_event().await, ClientEvent::TypingStart(_)));
        assert_eq!(server.next_event().await, typing_stop());
    }

    #[tokio::test]
    async fn test_view_reconciles_server_events() {
        // テスト項目: サーバーイベントからローカルビューが更新される
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let (handle, mut events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;
        collect_states_until(&mut events, ConnectionState::Connected).await;

        // when (操作):
        server.push(ServerEvent::Connected(ConnectedEvent {
            user_id: "me".to_string(),
            user_name: "User-me".to_string(),
        }));
        server.push(ServerEvent::MessageReceived(MessageReceivedEvent {
            id: 1,
            user_id: "me".to_string(),
            user_name: "alice".to_string(),
            room_id: "team-42".to_string(),
            content: "hello".to_string(),
            timestamp: 0,
        }));

        // then (期待する結果):
        let identity = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
        assert!(matches!(identity, Some(ViewEvent::Identity { user_id, .. }) if user_id == "me"));
        let message = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
        assert!(matches!(message, Some(ViewEvent::Message(line)) if line.own));
        let view = handle.view();
        assert_eq!(view.self_id(), Some("me"));
        assert_eq!(view.message_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnects_and_rejoins() {
        // テスト項目: 接続が切れると再接続し、再度 room:join を送る
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[true, true]);
        let (_handle, mut events) = SessionController::new(config(), connector).start();
        let mut first = next_server(&mut servers).await;
        first.next_event().await;

        // when (操作):
        drop(first);

        // then (期待する結果):
        let mut second = next_server(&mut servers).await;
        assert_eq!(second.next_event().await, join_event("team-42"));
        let states = collect_states_until(&mut events, ConnectionState::Reconnecting { attempt: 1 }).await;
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting { attempt: 1 },
            ]
        );
        assert_eq!(
            collect_states_until(&mut events, ConnectionState::Connected).await,
            vec![ConnectionState::Connected]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        // テスト項目: 再接続が上限回数失敗すると GivenUp になる
        let (connector, attempts, _servers) = scripted(&[]);
        let (handle, mut events) = SessionController::new(config(), connector).start();

        let states = collect_states_until(&mut events, ConnectionState::GivenUp).await;

        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting { attempt: 1 },
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting { attempt: 2 },
                ConnectionState::Disconnected,
                ConnectionState::GivenUp,
            ]
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(handle.state(), ConnectionState::GivenUp);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        // テスト項目: 未接続中の送信は破棄され、接続後に送られることもない
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[false, true]);
        let mut config = config();
        config.retry_delay_ms = 100;
        let (handle, _events) = SessionController::new(config, connector).start();

        // when (操作):
        handle.send("early");
        let mut server = next_server(&mut servers).await;
        server.next_event().await;
        handle.send("later");

        // then (期待する結果):
        assert_eq!(
            server.next_event().await,
            ClientEvent::MessageSend(SendMessagePayload {
                room_id: "team-42".to_string(),
                message: "later".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_leaves_room_and_closes() {
        // テスト項目: shutdown で room:leave を送り、接続を閉じる
        // given (前提条件):
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let (handle, _events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;
        let state = handle.watch_state();

        // when (操作):
        handle.shutdown().await;

        // then (期待する結果):
        assert_eq!(
            server.next_event().await,
            ClientEvent::RoomLeave(LeaveRoomPayload {
                room_id: Some("team-42".to_string())
            })
        );
        assert!(server.closed().await);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dropping_handle_leaves_room() {
        // テスト項目: ハンドルを破棄しても room:leave が送られる
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let (handle, _events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;

        drop(handle);

        assert!(matches!(server.next_event().await, ClientEvent::RoomLeave(_)));
        assert!(server.closed().await);
    }

    #[tokio::test]
    async fn test_join_other_room() {
        // テスト項目: 別ルームへの参加でビューがリセットされ room:join が送られる
        let (connector, _attempts, mut servers) = scripted(&[true]);
        let (handle, _events) = SessionController::new(config(), connector).start();
        let mut server = next_server(&mut servers).await;
        server.next_event().await;

        handle.join("lobby");

        assert_eq!(server.next_event().await, join_event("lobby"));
        assert_eq!(handle.view().room(), Some("lobby"));
    }
}
