//! Optimistic sends.
//!
//! An outgoing message is shown immediately under the sender's own name,
//! without waiting for the server. The server later relays the frame back
//! to every room member including the sender; that echo is discarded by the
//! self-echo rule in [`super::classify`]. No client-side message id is sent,
//! so a room message from another device logged in as the same user is
//! discarded as well.

use roomchat_proto::api::User;
use roomchat_proto::frame::{FrameKind, OutboundFrame};

use super::{ChatMessage, ChatTarget};
use crate::transport::TransportError;

/// Errors that can occur when sending a message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No conversation is selected.
    #[error("no active conversation")]
    NoActiveTarget,

    /// The frame could not be handed to the connection. The local copy was
    /// still appended to history.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Frame that delivers `text` to `target`.
#[must_use]
pub fn outbound_frame(target: &ChatTarget, text: &str) -> OutboundFrame {
    let kind = match target {
        ChatTarget::Room { .. } => FrameKind::Room,
        ChatTarget::User { .. } => FrameKind::Private,
    };
    OutboundFrame::text(kind, target.id(), text)
}

/// Local copy of a message authored by `author`.
#[must_use]
pub fn optimistic_message(author: &User, text: &str, now_ms: i64) -> ChatMessage {
    ChatMessage {
        id: now_ms,
        content: text.to_string(),
        author: author.clone(),
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
