//! WebSocket frame types exchanged with the chat server.
//!
//! Discriminants travel as plain integers. Values this client does not know
//! about decode into an `Other`/`Unknown` variant instead of failing, so a
//! newer server never breaks frame decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing class of a frame, carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FrameKind {
    /// A client joined the hub.
    Join,
    /// A client left the hub.
    Leave,
    /// Message addressed to a room; `to` is the room id.
    Room,
    /// Private message; `to` is the recipient user id.
    Private,
    /// Server notification carrying a [`GlobalEvent`].
    Global,
    /// Server system notice.
    System,
    /// Room membership gained.
    JoinRoom,
    /// Room membership lost.
    LeaveRoom,
    /// Any discriminant this client does not recognise.
    Other(i64),
}

impl From<i64> for FrameKind {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Join,
            1 => Self::Leave,
            2 => Self::Room,
            3 => Self::Private,
            4 => Self::Global,
            5 => Self::System,
            6 => Self::JoinRoom,
            7 => Self::LeaveRoom,
            other => Self::Other(other),
        }
    }
}

impl From<FrameKind> for i64 {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Join => 0,
            FrameKind::Leave => 1,
            FrameKind::Room => 2,
            FrameKind::Private => 3,
            FrameKind::Global => 4,
            FrameKind::System => 5,
            FrameKind::JoinRoom => 6,
            FrameKind::LeaveRoom => 7,
            FrameKind::Other(n) => n,
        }
    }
}

/// Content type of a [`Payload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum PayloadKind {
    /// Plain text.
    #[default]
    Text,
    /// Image reference.
    Image,
    /// File attachment.
    File,
    /// Unrecognised payload type.
    Other(i64),
}

impl From<i64> for PayloadKind {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Text,
            1 => Self::Image,
            2 => Self::File,
            other => Self::Other(other),
        }
    }
}

impl From<PayloadKind> for i64 {
    fn from(kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::Text => 0,
            PayloadKind::Image => 1,
            PayloadKind::File => 2,
            PayloadKind::Other(n) => n,
        }
    }
}

/// Kind of a server-pushed [`GlobalEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum GlobalEventKind {
    /// The online-user list changed.
    ReloadUsers,
    /// Membership of one room changed; `data` holds the room id.
    ReloadRoomsDetail,
    /// The room list changed.
    ReloadRooms,
    /// Unrecognised event type.
    Unknown(i64),
}

impl From<i64> for GlobalEventKind {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::ReloadUsers,
            1 => Self::ReloadRoomsDetail,
            2 => Self::ReloadRooms,
            other => Self::Unknown(other),
        }
    }
}

impl From<GlobalEventKind> for i64 {
    fn from(kind: GlobalEventKind) -> Self {
        match kind {
            GlobalEventKind::ReloadUsers => 0,
            GlobalEventKind::ReloadRoomsDetail => 1,
            GlobalEventKind::ReloadRooms => 2,
            GlobalEventKind::Unknown(n) => n,
        }
    }
}

/// Message body. `data` is arbitrary JSON; text messages carry a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Content type.
    #[serde(rename = "type", default)]
    pub kind: PayloadKind,
    /// Raw content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Payload {
    /// Creates a text payload.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            data: Some(Value::String(text.into())),
        }
    }

    /// Renders the payload as display text.
    ///
    /// Strings are returned verbatim, a missing or `null` body is empty, and
    /// any other JSON value is rendered compactly.
    #[must_use]
    pub fn content(&self) -> String {
        match &self.data {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Server notification attached to a [`FrameKind::Global`] frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: GlobalEventKind,
    /// Event-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl GlobalEvent {
    /// Creates an event without data.
    #[must_use]
    pub const fn new(kind: GlobalEventKind) -> Self {
        Self { kind, data: None }
    }

    /// Creates a `ReloadRoomsDetail` event for `room_id`.
    #[must_use]
    pub fn reload_room_detail(room_id: impl Into<String>) -> Self {
        Self {
            kind: GlobalEventKind::ReloadRoomsDetail,
            data: Some(Value::String(room_id.into())),
        }
    }

    /// Returns the room id carried by a `ReloadRoomsDetail` event.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Routing class.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Sender user id, stamped by the server.
    #[serde(default)]
    pub from: String,
    /// Room id or recipient user id.
    #[serde(default)]
    pub to: String,
    /// Message body, absent on global events.
    #[serde(default)]
    pub payload: Option<Payload>,
    /// Server notification, present on global events.
    #[serde(rename = "messageEvent", default, skip_serializing_if = "Option::is_none")]
    pub event: Option<GlobalEvent>,
    /// Server timestamp, used as the stored message id.
    #[serde(rename = "time", alias = "timestamp", default)]
    pub timestamp_id: i64,
}

impl InboundFrame {
    /// Builds a room message frame.
    #[must_use]
    pub fn room(
        from: impl Into<String>,
        room_id: impl Into<String>,
        text: impl Into<String>,
        timestamp_id: i64,
    ) -> Self {
        Self {
            kind: FrameKind::Room,
            from: from.into(),
            to: room_id.into(),
            payload: Some(Payload::text(text)),
            event: None,
            timestamp_id,
        }
    }

    /// Builds a private message frame.
    #[must_use]
    pub fn private(
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        timestamp_id: i64,
    ) -> Self {
        Self {
            kind: FrameKind::Private,
            from: from.into(),
            to: to.into(),
            payload: Some(Payload::text(text)),
            event: None,
            timestamp_id,
        }
    }

    /// Builds a global event frame.
    #[must_use]
    pub const fn global(event: GlobalEvent, timestamp_id: i64) -> Self {
        Self {
            kind: FrameKind::Global,
            from: String::new(),
            to: String::new(),
            payload: None,
            event: Some(event),
            timestamp_id,
        }
    }

    /// Display text of the payload, empty when there is none.
    #[must_use]
    pub fn content(&self) -> String {
        self.payload.as_ref().map(Payload::content).unwrap_or_default()
    }
}

/// A frame sent by this client. The server stamps `from` and `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// [`FrameKind::Room`] or [`FrameKind::Private`].
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Room id or recipient user id.
    pub to: String,
    /// Message body.
    pub payload: Payload,
}

impl OutboundFrame {
    /// Builds a text frame of the given kind.
    #[must_use]
    pub fn text(kind: FrameKind, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            to: to.into(),
            payload: Payload::text(text),
        }
    }
}
