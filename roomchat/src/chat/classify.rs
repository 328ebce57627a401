//! Inbound frame routing.
//!
//! [`classify`] decides what a decoded frame means for the session without
//! touching any state; [`super::SyncEngine`] applies the resulting [`Route`].

use roomchat_proto::frame::{FrameKind, GlobalEventKind, InboundFrame};

use super::ChatTarget;
use super::history::ConversationKind;
use super::key::ConversationKey;

/// Session facts the classifier needs.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Id of the logged-in user.
    pub self_id: &'a str,
    /// Conversation currently in view.
    pub active: Option<&'a ChatTarget>,
}

impl ClassifyContext<'_> {
    fn active_key(&self) -> Option<ConversationKey> {
        self.active.map(|t| t.conversation_key(self.self_id))
    }

    fn active_room(&self) -> Option<&str> {
        match self.active {
            Some(ChatTarget::Room { id, .. }) => Some(id),
            _ => None,
        }
    }
}

/// A list the server asked the client to fetch again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refetch {
    /// Online users.
    Users,
    /// Room list.
    Rooms,
    /// Detail of the active room.
    RoomDetail(String),
}

/// Why a frame produced no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Non-private frame sent by this user; already shown optimistically.
    SelfEcho,
    /// Frame kind with no handling on the client.
    UnsupportedKind(FrameKind),
    /// Global frame without an event.
    MissingEvent,
    /// Global event type this client does not know.
    UnknownEvent(i64),
    /// Room detail reload without a room id.
    MissingRoomId,
    /// Room detail reload for a room that is not in view.
    InactiveRoom(String),
}

/// Outcome of classifying one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Store the frame as a message.
    Store {
        /// Conversation the message belongs to.
        key: ConversationKey,
        /// Which history limit applies.
        kind: ConversationKind,
        /// Peer to mark unread, for private messages outside the active view.
        mark_unread: Option<String>,
    },
    /// Refresh a server-side list.
    Refetch(Refetch),
    /// Ignore the frame.
    Drop(DropReason),
}

/// Classify `frame` for the session described by `ctx`.
#[must_use]
pub fn classify(frame: &InboundFrame, ctx: &ClassifyContext<'_>) -> Route {
    // Private echoes pass so other devices of this user see their own DMs.
    if frame.from == ctx.self_id && frame.kind != FrameKind::Private {
        return Route::Drop(DropReason::SelfEcho);
    }

    match frame.kind {
        FrameKind::Room => Route::Store {
            key: ConversationKey::room(frame.to.clone()),
            kind: ConversationKind::Room,
            mark_unread: None,
        },
        FrameKind::Private => {
            let key = ConversationKey::private(ctx.self_id, &frame.from);
            let mark_unread = if ctx.active_key().as_ref() == Some(&key) {
                None
            } else {
                Some(frame.from.clone())
            };
            Route::Store {
                key,
                kind: ConversationKind::Private,
                mark_unread,
            }
        }
        FrameKind::Global => classify_global(frame, ctx),
        other => Route::Drop(DropReason::UnsupportedKind(other)),
    }
}

fn classify_global(frame: &InboundFrame, ctx: &ClassifyContext<'_>) -> Route {
    let Some(event) = frame.event.as_ref() else {
        return Route::Drop(DropReason::MissingEvent);
    };

    match event.kind {
        GlobalEventKind::ReloadUsers => Route::Refetch(Refetch::Users),
        GlobalEventKind::ReloadRooms => Route::Refetch(Refetch::Rooms),
        GlobalEventKind::ReloadRoomsDetail => {
            let Some(room_id) = event.room_id() else {
                return Route::Drop(DropReason::MissingRoomId);
            };
            if ctx.active_room() == Some(room_id) {
                Route::Refetch(Refetch::RoomDetail(room_id.to_string()))
            } else {
                Route::Drop(DropReason::InactiveRoom(room_id.to_string()))
            }
        }
        GlobalEventKind::Unknown(n) => Route::Drop(DropReason::UnknownEvent(n)),
    }
}
