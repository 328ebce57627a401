//! Message synchronization for `RoomChat`.
//!
//! [`SyncEngine`] owns all per-session chat state: bounded per-conversation
//! history, the user directory, the unread set, the active conversation and
//! the cached room list and room detail. It is driven by one task at a time
//! (see [`crate::client`]); every mutation goes through its methods.

pub mod classify;
pub mod directory;
pub mod history;
pub mod key;
pub mod send;
pub mod unread;

use roomchat_proto::api::{Room, RoomDetail, User};
use roomchat_proto::frame::InboundFrame;

use crate::transport::FrameSender;

use classify::{ClassifyContext, DropReason, Refetch, Route};
use directory::UserDirectory;
use history::{Conversation, ConversationKind, HistoryLimits, HistoryStore};
use key::ConversationKey;
use send::SendError;
use unread::UnreadTracker;

/// A message as stored in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server timestamp for received messages, local clock for sent ones.
    pub id: i64,
    /// Display text.
    pub content: String,
    /// Sender snapshot at the time the message was stored.
    pub author: User,
}

/// The conversation the viewer is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// A room.
    Room {
        /// Room id.
        id: String,
        /// Room name.
        name: String,
    },
    /// A private chat with another user.
    User {
        /// Peer user id.
        id: String,
        /// Peer display name.
        name: String,
    },
}

impl ChatTarget {
    /// Room target.
    pub fn room(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Room {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Private chat target.
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::User {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Room id or peer user id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Room { id, .. } | Self::User { id, .. } => id,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Room { name, .. } | Self::User { name, .. } => name,
        }
    }

    /// History limit class of this target.
    #[must_use]
    pub const fn kind(&self) -> ConversationKind {
        match self {
            Self::Room { .. } => ConversationKind::Room,
            Self::User { .. } => ConversationKind::Private,
        }
    }

    /// History key of this target as seen by `self_id`.
    #[must_use]
    pub fn conversation_key(&self, self_id: &str) -> ConversationKey {
        match self {
            Self::Room { id, .. } => ConversationKey::room(id.clone()),
            Self::User { id, .. } => ConversationKey::private(self_id, id),
        }
    }
}

/// What handling one inbound frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A message was appended to history.
    Stored {
        /// Conversation it was appended to.
        key: ConversationKey,
        /// The stored message.
        message: ChatMessage,
        /// Whether the sender became newly unread.
        unread_marked: bool,
    },
    /// The server asked for a list to be refetched.
    Refetch(Refetch),
    /// Nothing changed.
    Dropped(DropReason),
}

/// Per-session synchronization state.
#[derive(Debug)]
pub struct SyncEngine {
    self_user: User,
    limits: HistoryLimits,
    directory: UserDirectory,
    history: HistoryStore,
    unread: UnreadTracker,
    active: Option<ChatTarget>,
    room_detail: Option<RoomDetail>,
    rooms: Vec<Room>,
    online_users: Vec<User>,
}

impl SyncEngine {
    /// Create the state for a session of `self_user`.
    #[must_use]
    pub fn new(self_user: User, limits: HistoryLimits) -> Self {
        let mut directory = UserDirectory::new();
        directory.observe(&self_user);
        Self {
            self_user,
            limits,
            directory,
            history: HistoryStore::new(),
            unread: UnreadTracker::new(),
            active: None,
            room_detail: None,
            rooms: Vec::new(),
            online_users: Vec::new(),
        }
    }

    /// The logged-in user.
    #[must_use]
    pub const fn self_user(&self) -> &User {
        &self.self_user
    }

    /// History capacities in effect.
    #[must_use]
    pub const fn limits(&self) -> HistoryLimits {
        self.limits
    }

    // -- inbound --------------------------------------------------------

    /// Classify one inbound frame and apply its effect.
    pub fn handle_frame(&mut self, frame: &InboundFrame) -> FrameOutcome {
        let route = classify::classify(
            frame,
            &ClassifyContext {
                self_id: &self.self_user.id,
                active: self.active.as_ref(),
            },
        );

        match route {
            Route::Store {
                key,
                kind,
                mark_unread,
            } => {
                let unread_marked = mark_unread.is_some_and(|peer| self.unread.mark(&peer));
                let message = ChatMessage {
                    id: frame.timestamp_id,
                    content: frame.content(),
                    author: User::new(
                        frame.from.clone(),
                        self.directory.display_name(&frame.from),
                    ),
                };
                self.history
                    .append(&key, message.clone(), self.limits.capacity_for(kind));
                tracing::debug!(key = %key, from = %frame.from, "stored inbound message");
                FrameOutcome::Stored {
                    key,
                    message,
                    unread_marked,
                }
            }
            Route::Refetch(refetch) => {
                tracing::debug!(?refetch, "server requested refetch");
                FrameOutcome::Refetch(refetch)
            }
            Route::Drop(reason) => {
                tracing::debug!(?reason, kind = ?frame.kind, "dropped inbound frame");
                FrameOutcome::Dropped(reason)
            }
        }
    }

    // -- outbound -------------------------------------------------------

    /// Send `text` to the active conversation and append it locally.
    ///
    /// The local copy is appended even when the transport rejects the frame;
    /// callers that want to avoid a phantom message check
    /// [`FrameSender::is_connected`] first.
    ///
    /// # Errors
    ///
    /// - [`SendError::NoActiveTarget`] if no conversation is selected
    ///   (nothing is appended).
    /// - [`SendError::Transport`] if the frame could not be handed off.
    pub fn send_message<S: FrameSender + ?Sized>(
        &mut self,
        sender: &S,
        text: &str,
    ) -> Result<(ConversationKey, ChatMessage), SendError> {
        let Some(target) = self.active.as_ref() else {
            return Err(SendError::NoActiveTarget);
        };

        let frame = send::outbound_frame(target, text);
        let key = target.conversation_key(&self.self_user.id);
        let capacity = self.limits.capacity_for(target.kind());

        let transmitted = sender.send(&frame);
        if let Err(ref e) = transmitted {
            tracing::warn!(key = %key, error = %e, "message not transmitted");
        }

        let message = send::optimistic_message(&self.self_user, text, send::now_millis());
        self.history.append(&key, message.clone(), capacity);

        transmitted?;
        Ok((key, message))
    }

    // -- target ---------------------------------------------------------

    /// Make `target` the active conversation.
    ///
    /// Drops the cached room detail. Selecting a user clears their unread
    /// mark; returns whether a mark was cleared.
    pub fn select_target(&mut self, target: ChatTarget) -> bool {
        self.room_detail = None;
        let cleared = match &target {
            ChatTarget::User { id, .. } => self.unread.clear(id),
            ChatTarget::Room { .. } => false,
        };
        tracing::debug!(target = %target.id(), "selected chat target");
        self.active = Some(target);
        cleared
    }

    /// Deselect the active conversation.
    pub fn clear_target(&mut self) {
        self.active = None;
        self.room_detail = None;
    }

    /// Deselect the active conversation if it is the room `room_id`.
    ///
    /// Used to roll back a room selection whose join or detail fetch failed.
    pub fn clear_room_target(&mut self, room_id: &str) -> bool {
        if matches!(&self.active, Some(ChatTarget::Room { id, .. }) if id == room_id) {
            self.clear_target();
            true
        } else {
            false
        }
    }

    /// The active conversation.
    #[must_use]
    pub const fn active_target(&self) -> Option<&ChatTarget> {
        self.active.as_ref()
    }

    /// History key of the active conversation.
    #[must_use]
    pub fn active_key(&self) -> Option<ConversationKey> {
        self.active
            .as_ref()
            .map(|t| t.conversation_key(&self.self_user.id))
    }

    /// History capacity of the active conversation, `0` when none.
    #[must_use]
    pub fn active_limit(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |t| self.limits.capacity_for(t.kind()))
    }

    // -- history --------------------------------------------------------

    /// Conversation stored under `key`.
    #[must_use]
    pub fn conversation(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.history.get(key)
    }

    /// Messages of the active conversation, oldest first.
    pub fn active_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.active_key()
            .and_then(|key| self.history.get(&key))
            .into_iter()
            .flat_map(|c| c.messages().iter())
    }

    /// Whether the active conversation has lost messages to eviction.
    #[must_use]
    pub fn is_active_truncated(&self) -> bool {
        self.active_key()
            .is_some_and(|key| self.history.is_truncated(&key))
    }

    // -- unread ---------------------------------------------------------

    /// Peers with unseen private messages.
    #[must_use]
    pub const fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    // -- directory and caches -------------------------------------------

    /// Record a user observed in any payload.
    pub fn observe_user(&mut self, user: &User) {
        self.directory.observe(user);
    }

    /// Display name of `id`, if known.
    #[must_use]
    pub fn user_name(&self, id: &str) -> Option<&str> {
        self.directory.name_of(id)
    }

    /// Replace the cached room list and record each owner.
    pub fn apply_rooms(&mut self, rooms: Vec<Room>) {
        for room in &rooms {
            self.directory.observe_parts(&room.user_id, &room.user_name);
        }
        self.rooms = rooms;
    }

    /// Cached room list.
    #[must_use]
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Cached room `id`.
    #[must_use]
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Replace the online-user list, excluding self, and record each user.
    pub fn apply_online_users(&mut self, users: Vec<User>) {
        for user in &users {
            self.directory.observe(user);
        }
        self.online_users = users
            .into_iter()
            .filter(|u| u.id != self.self_user.id)
            .collect();
    }

    /// Online users other than self.
    #[must_use]
    pub fn online_users(&self) -> &[User] {
        &self.online_users
    }

    /// Cache the detail of the active room and record its members and owner.
    pub fn apply_room_detail(&mut self, detail: RoomDetail) {
        for user in &detail.users {
            self.directory.observe(user);
        }
        self.directory
            .observe_parts(&detail.user_id, &detail.user_name);
        self.room_detail = Some(detail);
    }

    /// Cached detail of the active room.
    #[must_use]
    pub const fn room_detail(&self) -> Option<&RoomDetail> {
        self.room_detail.as_ref()
    }

    /// Forget the cached room detail.
    pub fn clear_room_detail(&mut self) {
        self.room_detail = None;
    }

    /// Forget the cached room list.
    pub fn clear_rooms(&mut self) {
        self.rooms.clear();
    }

    /// Forget the cached online-user list.
    pub fn clear_online_users(&mut self) {
        self.online_users.clear();
    }

    /// Reset everything except the session identity.
    pub fn reset(&mut self) {
        *self = Self::new(self.self_user.clone(), self.limits);
    }
}
