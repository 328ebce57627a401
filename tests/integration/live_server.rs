//! Integration tests against an in-process chat server.
//!
//! The server is a small axum app that speaks the same REST and WebSocket
//! protocol as the real one: login, user and room lists, room creation and
//! joining, room fan-out (sender included), private delivery (recipient
//! only), and global reload notifications.
//!
//! Verification command: `cargo test --test live_server`

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use roomchat::api::{ApiError, ChatApi, HttpChatApi};
use roomchat::chat::ChatTarget;
use roomchat::client::{self, ClientCommand, ClientEvent, ClientHandle, ExitReason};
use roomchat::config::ClientConfig;
use roomchat::transport::ws::{OpenOutcome, WsTransport};
use roomchat::transport::{ConnectIdentity, FrameSender, TransportEvent};
use roomchat_proto::api::{
    ApiResponse, CreateRoomRequest, JoinRoomRequest, LoginData, LoginRequest, Room, RoomDetail,
    User,
};
use roomchat_proto::frame::{
    FrameKind, GlobalEvent, GlobalEventKind, InboundFrame, OutboundFrame,
};

// =============================================================================
// In-process chat server
// =============================================================================

struct RoomRecord {
    room: Room,
    password: String,
    members: BTreeSet<String>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    names: HashMap<String, String>,
    online: HashMap<String, mpsc::UnboundedSender<Message>>,
    rooms: Vec<RoomRecord>,
}

#[derive(Default)]
struct ChatServer {
    inner: Mutex<Inner>,
}

impl ChatServer {
    fn deliver(&self, user_id: &str, frame: &InboundFrame) {
        let text = serde_json::to_string(frame).unwrap();
        if let Some(tx) = self.inner.lock().online.get(user_id) {
            let _ = tx.send(Message::Text(text.into()));
        }
    }

    fn broadcast_global(&self, event: GlobalEvent) {
        let frame = InboundFrame::global(event, chrono::Utc::now().timestamp());
        let online: Vec<String> = self.inner.lock().online.keys().cloned().collect();
        for user in online {
            self.deliver(&user, &frame);
        }
    }

    /// Send raw text to a connected user, bypassing encoding.
    fn push_raw(&self, user_id: &str, text: &str) {
        if let Some(tx) = self.inner.lock().online.get(user_id) {
            let _ = tx.send(Message::Text(text.to_string().into()));
        }
    }

    fn is_online(&self, user_id: &str) -> bool {
        self.inner.lock().online.contains_key(user_id)
    }

    fn route(&self, from: &str, frame: OutboundFrame) {
        let now = chrono::Utc::now().timestamp();
        let text = frame.payload.content();
        match frame.kind {
            FrameKind::Room => {
                let members: Vec<String> = self
                    .inner
                    .lock()
                    .rooms
                    .iter()
                    .find(|r| r.room.id == frame.to)
                    .map(|r| r.members.iter().cloned().collect())
                    .unwrap_or_default();
                let inbound = InboundFrame::room(from, &frame.to, text, now);
                for member in members {
                    self.deliver(&member, &inbound);
                }
            }
            FrameKind::Private => {
                let inbound = InboundFrame::private(from, &frame.to, text, now);
                self.deliver(&frame.to, &inbound);
            }
            other => panic!("client sent unexpected frame kind {other:?}"),
        }
    }
}

type Shared = Arc<ChatServer>;

async fn login(
    State(server): State<Shared>,
    Json(req): Json<LoginRequest>,
) -> Json<ApiResponse<LoginData>> {
    let mut inner = server.inner.lock();
    let existing = inner
        .names
        .iter()
        .find(|(_, name)| **name == req.username)
        .map(|(id, _)| id.clone());
    let id = existing.unwrap_or_else(|| {
        inner.next_id += 1;
        let id = format!("u{}", inner.next_id);
        inner.names.insert(id.clone(), req.username.clone());
        id
    });
    Json(ApiResponse::success(LoginData {
        id,
        username: req.username,
    }))
}

async fn list_users(State(server): State<Shared>) -> Json<ApiResponse<Vec<User>>> {
    let inner = server.inner.lock();
    let users = inner
        .online
        .keys()
        .map(|id| User::new(id.clone(), inner.names[id].clone()))
        .collect();
    Json(ApiResponse::success(users))
}

async fn list_rooms(State(server): State<Shared>) -> Json<ApiResponse<Vec<Room>>> {
    let inner = server.inner.lock();
    Json(ApiResponse::success(
        inner.rooms.iter().map(|r| r.room.clone()).collect(),
    ))
}

async fn create_room(
    State(server): State<Shared>,
    Json(req): Json<CreateRoomRequest>,
) -> Json<ApiResponse<Room>> {
    let room = {
        let mut inner = server.inner.lock();
        if inner.rooms.iter().any(|r| r.room.name == req.name) {
            return Json(ApiResponse::rejected("room already exists"));
        }
        inner.next_id += 1;
        let room = Room {
            id: format!("r{}", inner.next_id),
            name: req.name.clone(),
            has_password: !req.password.is_empty(),
            user_id: req.user_id.clone(),
            user_name: inner.names.get(&req.user_id).cloned().unwrap_or_default(),
            count: 0,
            create_time: Some("2024-01-01 00:00:00".into()),
        };
        inner.rooms.push(RoomRecord {
            room: room.clone(),
            password: req.password,
            members: BTreeSet::new(),
        });
        room
    };
    server.broadcast_global(GlobalEvent::new(GlobalEventKind::ReloadRooms));
    Json(ApiResponse::success(room))
}

async fn join_room(
    State(server): State<Shared>,
    Path(room_id): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Json<ApiResponse<serde_json::Value>> {
    {
        let mut inner = server.inner.lock();
        let Some(record) = inner.rooms.iter_mut().find(|r| r.room.id == room_id) else {
            return Json(ApiResponse::rejected("room not found"));
        };
        if record.password != req.password {
            return Json(ApiResponse::rejected("wrong password"));
        }
        record.members.insert(req.user_id.clone());
        record.room.count = record.members.len() as u64;
    }
    server.broadcast_global(GlobalEvent::reload_room_detail(room_id));
    server.broadcast_global(GlobalEvent::new(GlobalEventKind::ReloadRooms));
    Json(ApiResponse {
        code: roomchat_proto::api::CODE_SUCCESS,
        msg: "joined".into(),
        data: None,
    })
}

async fn room_detail(
    State(server): State<Shared>,
    Path(room_id): Path<String>,
) -> Json<ApiResponse<RoomDetail>> {
    let inner = server.inner.lock();
    let Some(record) = inner.rooms.iter().find(|r| r.room.id == room_id) else {
        return Json(ApiResponse::rejected("room not found"));
    };
    Json(ApiResponse::success(RoomDetail {
        id: record.room.id.clone(),
        name: record.room.name.clone(),
        user_id: record.room.user_id.clone(),
        user_name: record.room.user_name.clone(),
        count: record.room.count,
        create_time: record.room.create_time.clone(),
        users: record
            .members
            .iter()
            .map(|id| User::new(id.clone(), inner.names[id].clone()))
            .collect(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<Shared>,
) -> impl axum::response::IntoResponse {
    let user_id = params.get("token").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, server, user_id))
}

async fn handle_socket(socket: WebSocket, server: Shared, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    server.inner.lock().online.insert(user_id.clone(), tx);
    server.broadcast_global(GlobalEvent::new(GlobalEventKind::ReloadUsers));

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                if let Ok(frame) = serde_json::from_str::<OutboundFrame>(text.as_str()) {
                    server.route(&user_id, frame);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    write_task.abort();
    server.inner.lock().online.remove(&user_id);
    server.broadcast_global(GlobalEvent::new(GlobalEventKind::ReloadUsers));
}

/// Starts the chat server on a random port. Returns the server handle and
/// a client config pointing at it.
async fn start_chat_server() -> (Shared, ClientConfig) {
    let server = Arc::new(ChatServer::default());
    let api = axum::Router::new()
        .route("/login", axum::routing::post(login))
        .route("/users", axum::routing::get(list_users))
        .route(
            "/rooms",
            axum::routing::get(list_rooms).post(create_room),
        )
        .route("/rooms/{id}", axum::routing::get(room_detail))
        .route("/rooms/{id}/join", axum::routing::post(join_room))
        .route("/ws", axum::routing::get(ws_handler));
    let app = axum::Router::new()
        .nest("/v1/api", api)
        .with_state(Arc::clone(&server));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ClientConfig {
        api_url: format!("http://{addr}/v1/api"),
        ws_url: format!("ws://{addr}/v1/api/ws"),
        channel_capacity: 64,
        ..ClientConfig::default()
    };
    (server, config)
}

// =============================================================================
// Helpers
// =============================================================================

/// Waits for the first event matching `pred`, discarding others.
async fn wait_for(
    events: &mut mpsc::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Collects every event that arrives within `window`.
async fn collect_for(events: &mut mpsc::Receiver<ClientEvent>, window: Duration) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        out.push(event);
    }
    out
}

async fn connect(config: &ClientConfig, username: &str) -> ClientHandle {
    let api = HttpChatApi::new(&config.api_url).unwrap();
    let user = client::login(&api, username).await.unwrap();
    let mut handle = client::start(config, api, user, format!("dev-{username}"))
        .await
        .unwrap();
    wait_for(&mut handle.events, |e| *e == ClientEvent::Connected).await;
    handle
}

async fn next_transport_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport channel closed")
}

fn appended_text(event: &ClientEvent) -> Option<(&str, &str)> {
    match event {
        ClientEvent::MessageAppended { key, message } => {
            Some((key.as_str(), message.content.as_str()))
        }
        _ => None,
    }
}

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn rest_calls_round_trip() {
    let (_server, config) = start_chat_server().await;
    let api = HttpChatApi::new(&config.api_url).unwrap();

    let ann = api.login("ann").await.unwrap();
    assert_eq!(ann.username, "ann");
    assert_eq!(api.login("ann").await.unwrap().id, ann.id);

    let room = api
        .create_room(&CreateRoomRequest {
            name: "vault".into(),
            password: "pw".into(),
            user_id: ann.id.clone(),
        })
        .await
        .unwrap();
    assert!(room.has_password);
    assert_eq!(room.user_name, "ann");

    let rooms = api.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert!(api.list_users().await.unwrap().is_empty());

    let wrong = api
        .join_room(&JoinRoomRequest {
            room_id: room.id.clone(),
            user_id: ann.id.clone(),
            device_id: "dev".into(),
            password: "nope".into(),
        })
        .await;
    assert!(matches!(wrong, Err(ApiError::Rejected(msg)) if msg == "wrong password"));

    api.join_room(&JoinRoomRequest {
        room_id: room.id.clone(),
        user_id: ann.id.clone(),
        device_id: "dev".into(),
        password: "pw".into(),
    })
    .await
    .unwrap();

    let detail = api.room_detail(&room.id).await.unwrap();
    assert_eq!(detail.users, vec![User::new(ann.id, "ann")]);
    assert!(matches!(
        api.room_detail("missing").await,
        Err(ApiError::Rejected(_))
    ));
}

#[tokio::test]
async fn duplicate_room_name_is_rejected() {
    let (_server, config) = start_chat_server().await;
    let api = HttpChatApi::new(&config.api_url).unwrap();
    let ann = api.login("ann").await.unwrap();
    let req = CreateRoomRequest {
        name: "den".into(),
        password: String::new(),
        user_id: ann.id,
    };
    api.create_room(&req).await.unwrap();
    assert!(matches!(
        api.create_room(&req).await,
        Err(ApiError::Rejected(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_an_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = HttpChatApi::new(&format!("http://{addr}/v1/api")).unwrap();
    assert!(matches!(api.list_rooms().await, Err(ApiError::Http(_))));
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn transport_drops_malformed_frames_and_stays_open() {
    let (server, config) = start_chat_server().await;
    let api = HttpChatApi::new(&config.api_url).unwrap();
    let ann = api.login("ann").await.unwrap();

    let transport = WsTransport::new(config.ws_url.clone(), 16);
    let identity = ConnectIdentity {
        user_id: ann.id.clone(),
        device_id: "dev-1".into(),
        display_name: "ann".into(),
    };
    let OpenOutcome::Opened(mut rx) = transport.open(&identity).await.unwrap() else {
        panic!("expected a fresh connection");
    };
    assert!(matches!(
        transport.open(&identity).await.unwrap(),
        OpenOutcome::AlreadyOpen
    ));

    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::Opened);
    // Own connection announcement.
    assert!(matches!(next_transport_event(&mut rx).await, TransportEvent::Frame(f) if f.kind == FrameKind::Global));

    server.push_raw(&ann.id, "definitely not json");
    server.push_raw(&ann.id, r#"{"type":"three"}"#);
    server.deliver(&ann.id, &InboundFrame::private("u99", &ann.id, "still here", 1));

    match next_transport_event(&mut rx).await {
        TransportEvent::Frame(frame) => assert_eq!(frame.content(), "still here"),
        other => panic!("expected frame, got {other:?}"),
    }
    assert!(transport.is_connected());

    transport.close();
    assert!(!transport.is_connected());
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.is_online(&ann.id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // Closing cleared the handle, so a new open is accepted.
    assert!(matches!(
        transport.open(&identity).await.unwrap(),
        OpenOutcome::Opened(_)
    ));
    transport.close();
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn room_messages_fan_out_without_self_duplicates() {
    let (_server, config) = start_chat_server().await;
    let mut ann = connect(&config, "ann").await;
    let mut bob = connect(&config, "bob").await;

    ann.commands
        .send(ClientCommand::CreateRoom {
            name: "lobby".into(),
            password: String::new(),
        })
        .await
        .unwrap();
    let rooms = wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::RoomsUpdated(r) if !r.is_empty())
    })
    .await;
    let ClientEvent::RoomsUpdated(rooms) = rooms else {
        unreachable!()
    };
    let room_id = rooms[0].id.clone();

    for handle in [&mut ann, &mut bob] {
        handle
            .commands
            .send(ClientCommand::SelectTarget {
                target: ChatTarget::room(&room_id, ""),
                password: None,
            })
            .await
            .unwrap();
        wait_for(&mut handle.events, |e| {
            matches!(e, ClientEvent::RoomDetailUpdated(d) if d.users.iter().any(|u| u.id == handle.user.id))
        })
        .await;
    }

    ann.commands
        .send(ClientCommand::SendText("hello room".into()))
        .await
        .unwrap();

    let got = wait_for(&mut bob.events, |e| appended_text(e).is_some()).await;
    let ClientEvent::MessageAppended { key, message } = got else {
        unreachable!()
    };
    assert_eq!(key.as_str(), room_id);
    assert_eq!(message.content, "hello room");
    assert_eq!(message.author, ann.user);

    // Ann sees her optimistic copy once; the server's echo is discarded.
    let ann_events = collect_for(&mut ann.events, Duration::from_millis(300)).await;
    let copies = ann_events
        .iter()
        .filter_map(appended_text)
        .filter(|(_, text)| *text == "hello room")
        .count();
    assert_eq!(copies, 1);

    ann.commands.send(ClientCommand::Shutdown).await.unwrap();
    bob.commands.send(ClientCommand::Shutdown).await.unwrap();
    assert_eq!(ann.task.await.unwrap(), ExitReason::Shutdown);
    assert_eq!(bob.task.await.unwrap(), ExitReason::Shutdown);
}

#[tokio::test]
async fn private_message_marks_unread_until_selected() {
    let (_server, config) = start_chat_server().await;
    let mut ann = connect(&config, "ann").await;
    let mut bob = connect(&config, "bob").await;

    bob.commands
        .send(ClientCommand::SelectTarget {
            target: ChatTarget::user(&ann.user.id, &ann.user.name),
            password: None,
        })
        .await
        .unwrap();
    bob.commands
        .send(ClientCommand::SendText("psst".into()))
        .await
        .unwrap();

    let expected_key = roomchat::chat::key::conversation_key(&ann.user.id, &bob.user.id);
    let got = wait_for(&mut ann.events, |e| appended_text(e).is_some()).await;
    assert_eq!(appended_text(&got), Some((expected_key.as_str(), "psst")));
    let unread = wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::UnreadChanged(_))
    })
    .await;
    assert_eq!(unread, ClientEvent::UnreadChanged(vec![bob.user.id.clone()]));

    ann.commands
        .send(ClientCommand::SelectTarget {
            target: ChatTarget::user(&bob.user.id, ""),
            password: None,
        })
        .await
        .unwrap();
    let cleared = wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::UnreadChanged(_))
    })
    .await;
    assert_eq!(cleared, ClientEvent::UnreadChanged(Vec::new()));

    // Bob's own copy is stored under the same key.
    let bob_copy = wait_for(&mut bob.events, |e| appended_text(e).is_some()).await;
    assert_eq!(appended_text(&bob_copy), Some((expected_key.as_str(), "psst")));
}

#[tokio::test]
async fn wrong_room_password_rolls_back_selection() {
    let (_server, config) = start_chat_server().await;
    let mut ann = connect(&config, "ann").await;

    ann.commands
        .send(ClientCommand::CreateRoom {
            name: "vault".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    let ClientEvent::RoomsUpdated(rooms) = wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::RoomsUpdated(r) if !r.is_empty())
    })
    .await
    else {
        unreachable!()
    };

    ann.commands
        .send(ClientCommand::SelectTarget {
            target: ChatTarget::room(&rooms[0].id, ""),
            password: Some("guess".into()),
        })
        .await
        .unwrap();
    wait_for(&mut ann.events, |e| *e == ClientEvent::TargetChanged(None)).await;
    let error = wait_for(&mut ann.events, |e| matches!(e, ClientEvent::Error(_))).await;
    assert!(matches!(error, ClientEvent::Error(msg) if msg.contains("wrong password")));
}

#[tokio::test]
async fn joining_member_refreshes_detail_for_others() {
    let (_server, config) = start_chat_server().await;
    let mut ann = connect(&config, "ann").await;
    let mut bob = connect(&config, "bob").await;

    ann.commands
        .send(ClientCommand::CreateRoom {
            name: "lobby".into(),
            password: String::new(),
        })
        .await
        .unwrap();
    let ClientEvent::RoomsUpdated(rooms) = wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::RoomsUpdated(r) if !r.is_empty())
    })
    .await
    else {
        unreachable!()
    };
    let room_id = rooms[0].id.clone();
    ann.commands
        .send(ClientCommand::SelectTarget {
            target: ChatTarget::room(&room_id, ""),
            password: None,
        })
        .await
        .unwrap();
    wait_for(&mut ann.events, |e| matches!(e, ClientEvent::RoomDetailUpdated(_))).await;

    bob.commands
        .send(ClientCommand::SelectTarget {
            target: ChatTarget::room(&room_id, ""),
            password: None,
        })
        .await
        .unwrap();

    let bob_id = bob.user.id.clone();
    wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::RoomDetailUpdated(d) if d.users.iter().any(|u| u.id == bob_id))
    })
    .await;
}

#[tokio::test]
async fn presence_changes_refresh_user_lists() {
    let (_server, config) = start_chat_server().await;
    let mut ann = connect(&config, "ann").await;
    let bob = connect(&config, "bob").await;
    let bob_user = bob.user.clone();

    wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::UsersUpdated(u) if u.contains(&bob_user))
    })
    .await;

    bob.commands.send(ClientCommand::Logout).await.unwrap();
    assert_eq!(bob.task.await.unwrap(), ExitReason::LoggedOut);

    wait_for(&mut ann.events, |e| {
        matches!(e, ClientEvent::UsersUpdated(u) if !u.contains(&bob_user))
    })
    .await;
}
