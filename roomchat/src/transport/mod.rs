//! Transport layer for `RoomChat`.
//!
//! The chat server speaks JSON frames over one WebSocket per session.
//! Connection lifecycle is reported as a stream of [`TransportEvent`]s on a
//! channel, consumed by a single owner task; outbound frames go through the
//! [`FrameSender`] trait.
//!
//! Implementations:
//! - [`ws::WsTransport`]: WebSocket connection to the chat server
//! - [`loopback::LoopbackSender`]: in-process sender for testing

pub mod loopback;
pub mod ws;

use roomchat_proto::codec::CodecError;
use roomchat_proto::frame::{InboundFrame, OutboundFrame};

/// Who is connecting. Sent as query parameters when the socket opens and
/// never renegotiated on a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectIdentity {
    /// Logged-in user id (`token` parameter).
    pub user_id: String,
    /// Persistent id of this device (`deviceId` parameter).
    pub device_id: String,
    /// Display name (`username` parameter).
    pub display_name: String,
}

/// Connection lifecycle notifications, delivered in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket is open.
    Opened,
    /// A frame was received and decoded.
    Frame(InboundFrame),
    /// A read error occurred; a `Closed` event follows.
    Error(String),
    /// The socket is closed.
    Closed,
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No live connection exists.
    #[error("no live connection")]
    Unavailable,

    /// The server URL is not a valid WebSocket URL.
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parse failure.
        reason: String,
    },

    /// The WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Outbound half of a connection.
pub trait FrameSender: Send + Sync {
    /// Queue `frame` for transmission.
    ///
    /// Returns once the frame is handed to the connection; this does not
    /// mean the server received it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unavailable`] if no connection is live.
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError>;

    /// Whether a connection is currently live.
    fn is_connected(&self) -> bool;

    /// Close the connection. Idempotent; later sends fail with
    /// [`TransportError::Unavailable`].
    fn close(&self);
}
