//! Session controller.
//!
//! One task owns the [`SyncEngine`] and is the only writer of chat state.
//! It multiplexes three inputs with `tokio::select!`:
//!
//! ```text
//! front end ── ClientCommand ──▶ ┌───────────┐ ── ClientEvent ──▶ front end
//! transport ── TransportEvent ─▶ │ SyncLoop  │ ── REST calls ───▶ ChatApi
//!                                └───────────┘ ── frames ───────▶ FrameSender
//! ```
//!
//! REST calls are awaited inline, so an inbound frame is never applied
//! while a refetch triggered by an earlier frame is half done.

use tokio::sync::mpsc;

use roomchat_proto::api::{CreateRoomRequest, JoinRoomRequest, Room, RoomDetail, User};

use crate::api::{ApiError, ChatApi};
use crate::chat::classify::Refetch;
use crate::chat::key::ConversationKey;
use crate::chat::send::SendError;
use crate::chat::{ChatMessage, ChatTarget, FrameOutcome, SyncEngine};
use crate::config::ClientConfig;
use crate::transport::ws::{OpenOutcome, WsTransport};
use crate::transport::{ConnectIdentity, FrameSender, TransportError, TransportEvent};

/// Errors that can occur while starting a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The socket could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The transport reported an existing connection.
    #[error("already connected")]
    AlreadyConnected,
}

/// Requests from the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Send text to the active conversation.
    SendText(String),
    /// Switch the active conversation. Joining a password-protected room
    /// requires `password`.
    SelectTarget {
        /// Room or user to talk to. An empty name is filled in from the
        /// cached lists.
        target: ChatTarget,
        /// Room password, if any.
        password: Option<String>,
    },
    /// Deselect the active conversation.
    ClearTarget,
    /// Create a room owned by the logged-in user.
    CreateRoom {
        /// Room name.
        name: String,
        /// Optional password; empty means open.
        password: String,
    },
    /// Refetch the room list.
    RefreshRooms,
    /// Refetch the online-user list.
    RefreshUsers,
    /// Close the connection and end the session.
    Logout,
    /// Close the connection, keeping the session for the next start.
    Shutdown,
}

/// Notifications to the front end, in the order state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The socket opened.
    Connected,
    /// The socket closed.
    Disconnected,
    /// A message was appended to a conversation.
    MessageAppended {
        /// Conversation it was appended to.
        key: ConversationKey,
        /// The message.
        message: ChatMessage,
    },
    /// The set of peers with unseen private messages changed.
    UnreadChanged(Vec<String>),
    /// New room list (empty after a failed fetch).
    RoomsUpdated(Vec<Room>),
    /// New online-user list, self excluded (empty after a failed fetch).
    UsersUpdated(Vec<User>),
    /// Detail of the active room.
    RoomDetailUpdated(RoomDetail),
    /// The active conversation changed.
    TargetChanged(Option<ChatTarget>),
    /// Something the user asked for did not happen.
    Error(String),
    /// The session ended by [`ClientCommand::Logout`].
    LoggedOut,
}

/// Why [`SyncLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// [`ClientCommand::Logout`].
    LoggedOut,
    /// [`ClientCommand::Shutdown`].
    Shutdown,
    /// Every command sender was dropped.
    CommandsClosed,
}

/// The task that owns chat state for one session.
pub struct SyncLoop<A, S> {
    engine: SyncEngine,
    api: A,
    sender: S,
    device_id: String,
    events: mpsc::Sender<ClientEvent>,
}

impl<A: ChatApi, S: FrameSender> SyncLoop<A, S> {
    /// Create a loop around `engine`. Nothing runs until [`run`](Self::run).
    pub const fn new(
        engine: SyncEngine,
        api: A,
        sender: S,
        device_id: String,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            engine,
            api,
            sender,
            device_id,
            events,
        }
    }

    /// Chat state.
    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Process transport events and commands until the session ends.
    ///
    /// The transport channel closing is not fatal; commands are still
    /// served so the front end can log out or shut down.
    pub async fn run(
        mut self,
        mut transport: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<ClientCommand>,
    ) -> ExitReason {
        let mut transport_open = true;
        // Inbound frames are drained before commands.
        loop {
            tokio::select! {
                biased;
                event = transport.recv(), if transport_open => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => transport_open = false,
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Some(reason) = self.handle_command(command).await {
                            return reason;
                        }
                    }
                    None => {
                        self.sender.close();
                        return ExitReason::CommandsClosed;
                    }
                },
            }
        }
    }

    /// Apply one transport event.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                tracing::info!(user = %self.engine.self_user().id, "connected");
                self.emit(ClientEvent::Connected).await;
                self.refresh_rooms().await;
                self.refresh_users().await;
            }
            TransportEvent::Frame(frame) => match self.engine.handle_frame(&frame) {
                FrameOutcome::Stored {
                    key,
                    message,
                    unread_marked,
                } => {
                    self.emit(ClientEvent::MessageAppended { key, message })
                        .await;
                    if unread_marked {
                        self.emit_unread().await;
                    }
                }
                FrameOutcome::Refetch(Refetch::Users) => self.refresh_users().await,
                FrameOutcome::Refetch(Refetch::Rooms) => self.refresh_rooms().await,
                FrameOutcome::Refetch(Refetch::RoomDetail(room_id)) => {
                    self.fetch_room_detail(&room_id).await;
                }
                FrameOutcome::Dropped(_) => {}
            },
            TransportEvent::Error(reason) => {
                tracing::warn!(%reason, "connection error");
                self.emit(ClientEvent::Error(format!("connection error: {reason}")))
                    .await;
            }
            TransportEvent::Closed => {
                tracing::info!("disconnected");
                self.emit(ClientEvent::Disconnected).await;
            }
        }
    }

    /// Apply one command. Returns `Some` when the session is over.
    pub async fn handle_command(&mut self, command: ClientCommand) -> Option<ExitReason> {
        match command {
            ClientCommand::SendText(text) => self.send_text(&text).await,
            ClientCommand::SelectTarget { target, password } => {
                self.select_target(target, password).await;
            }
            ClientCommand::ClearTarget => {
                self.engine.clear_target();
                self.emit(ClientEvent::TargetChanged(None)).await;
            }
            ClientCommand::CreateRoom { name, password } => {
                self.create_room(name, password).await;
            }
            ClientCommand::RefreshRooms => self.refresh_rooms().await,
            ClientCommand::RefreshUsers => self.refresh_users().await,
            ClientCommand::Logout => {
                tracing::info!(user = %self.engine.self_user().id, "logging out");
                self.sender.close();
                self.engine.reset();
                self.emit(ClientEvent::LoggedOut).await;
                return Some(ExitReason::LoggedOut);
            }
            ClientCommand::Shutdown => {
                self.sender.close();
                return Some(ExitReason::Shutdown);
            }
        }
        None
    }

    async fn send_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if !self.sender.is_connected() {
            self.emit(ClientEvent::Error("not connected, message not sent".into()))
                .await;
            return;
        }
        match self.engine.send_message(&self.sender, text) {
            Ok((key, message)) => {
                self.emit(ClientEvent::MessageAppended { key, message })
                    .await;
            }
            Err(SendError::NoActiveTarget) => {
                self.emit(ClientEvent::Error(
                    "select a room or user before sending".into(),
                ))
                .await;
            }
            Err(e @ SendError::Transport(_)) => {
                self.emit(ClientEvent::Error(e.to_string())).await;
            }
        }
    }

    async fn select_target(&mut self, target: ChatTarget, password: Option<String>) {
        let target = self.resolve_name(target);
        if self.engine.select_target(target.clone()) {
            self.emit_unread().await;
        }
        self.emit(ClientEvent::TargetChanged(Some(target.clone())))
            .await;

        let ChatTarget::Room { id: room_id, .. } = target else {
            return;
        };
        let protected = self.engine.room(&room_id).is_some_and(|r| r.has_password);
        let password = match password {
            Some(p) if !p.is_empty() => p,
            _ if protected => {
                self.rollback_room(&room_id, "this room requires a password")
                    .await;
                return;
            }
            _ => String::new(),
        };

        let request = JoinRoomRequest {
            room_id: room_id.clone(),
            user_id: self.engine.self_user().id.clone(),
            device_id: self.device_id.clone(),
            password,
        };
        if let Err(e) = self.api.join_room(&request).await {
            tracing::warn!(room = %room_id, err = %e, "join failed");
            self.rollback_room(&room_id, &format!("could not join room: {e}"))
                .await;
            return;
        }
        self.fetch_room_detail(&room_id).await;
    }

    /// Fill in an empty display name from the cached lists.
    fn resolve_name(&self, target: ChatTarget) -> ChatTarget {
        match target {
            ChatTarget::Room { id, name } if name.is_empty() => {
                let name = self.engine.room(&id).map_or_else(|| id.clone(), |r| r.name.clone());
                ChatTarget::Room { id, name }
            }
            ChatTarget::User { id, name } if name.is_empty() => {
                let name = self.engine.user_name(&id).unwrap_or(&id).to_string();
                ChatTarget::User { id, name }
            }
            other => other,
        }
    }

    async fn rollback_room(&mut self, room_id: &str, reason: &str) {
        if self.engine.clear_room_target(room_id) {
            self.emit(ClientEvent::TargetChanged(None)).await;
        }
        self.emit(ClientEvent::Error(reason.to_string())).await;
    }

    async fn fetch_room_detail(&mut self, room_id: &str) {
        match self.api.room_detail(room_id).await {
            Ok(detail) => {
                self.engine.apply_room_detail(detail.clone());
                self.emit(ClientEvent::RoomDetailUpdated(detail)).await;
            }
            Err(e) => {
                tracing::warn!(room = %room_id, err = %e, "room detail fetch failed");
                self.engine.clear_room_detail();
                self.rollback_room(room_id, &format!("could not load room: {e}"))
                    .await;
            }
        }
    }

    async fn create_room(&mut self, name: String, password: String) {
        let request = CreateRoomRequest {
            name,
            password,
            user_id: self.engine.self_user().id.clone(),
        };
        match self.api.create_room(&request).await {
            Ok(room) => {
                tracing::info!(room = %room.id, name = %room.name, "room created");
                self.engine
                    .observe_user(&User::new(room.user_id, room.user_name));
                self.refresh_rooms().await;
            }
            Err(e) => {
                self.emit(ClientEvent::Error(format!("could not create room: {e}")))
                    .await;
            }
        }
    }

    async fn refresh_rooms(&mut self) {
        match self.api.list_rooms().await {
            Ok(rooms) => self.engine.apply_rooms(rooms),
            Err(e) => {
                tracing::warn!(err = %e, "room list fetch failed");
                self.engine.clear_rooms();
            }
        }
        self.emit(ClientEvent::RoomsUpdated(self.engine.rooms().to_vec()))
            .await;
    }

    async fn refresh_users(&mut self) {
        match self.api.list_users().await {
            Ok(users) => self.engine.apply_online_users(users),
            Err(e) => {
                tracing::warn!(err = %e, "user list fetch failed");
                self.engine.clear_online_users();
            }
        }
        self.emit(ClientEvent::UsersUpdated(
            self.engine.online_users().to_vec(),
        ))
        .await;
    }

    async fn emit_unread(&self) {
        let peers = self.engine.unread().peers().map(str::to_string).collect();
        self.emit(ClientEvent::UnreadChanged(peers)).await;
    }

    async fn emit(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("front end gone, event dropped");
        }
    }
}

/// Channels to a running session.
#[derive(Debug)]
pub struct ClientHandle {
    /// Logged-in user.
    pub user: User,
    /// Requests to the session task.
    pub commands: mpsc::Sender<ClientCommand>,
    /// Notifications from the session task.
    pub events: mpsc::Receiver<ClientEvent>,
    /// The session task; resolves when the session ends.
    pub task: tokio::task::JoinHandle<ExitReason>,
}

/// Log in as `username`.
///
/// # Errors
///
/// Returns [`ApiError`] if the server rejects the login or is unreachable.
pub async fn login<A: ChatApi>(api: &A, username: &str) -> Result<User, ApiError> {
    let data = api.login(username).await?;
    tracing::info!(user = %data.id, name = %data.username, "logged in");
    Ok(User::new(data.id, data.username))
}

/// Open the socket as `user` and spawn the session task.
///
/// # Errors
///
/// Returns [`ClientError`] if the socket cannot be opened.
pub async fn start<A>(
    config: &ClientConfig,
    api: A,
    user: User,
    device_id: String,
) -> Result<ClientHandle, ClientError>
where
    A: ChatApi + 'static,
{
    let transport = WsTransport::new(config.ws_url.clone(), config.channel_capacity);
    let identity = ConnectIdentity {
        user_id: user.id.clone(),
        device_id: device_id.clone(),
        display_name: user.name.clone(),
    };
    let OpenOutcome::Opened(transport_rx) = transport.open(&identity).await? else {
        return Err(ClientError::AlreadyConnected);
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let (evt_tx, evt_rx) = mpsc::channel(config.channel_capacity);
    let engine = SyncEngine::new(user.clone(), config.history);
    let sync = SyncLoop::new(engine, api, transport, device_id, evt_tx);
    let task = tokio::spawn(sync.run(transport_rx, cmd_rx));

    Ok(ClientHandle {
        user,
        commands: cmd_tx,
        events: evt_rx,
        task,
    })
}
