//! Bounded, in-memory message history.
//!
//! Each conversation holds at most `capacity` messages in arrival order.
//! Appending past the capacity evicts the oldest message and marks the
//! conversation truncated for the rest of the session. History is never
//! persisted; [`HistoryStore::clear`] drops everything on logout.

use std::collections::{HashMap, VecDeque};

use super::ChatMessage;
use super::key::ConversationKey;

/// Default capacity of a room conversation.
pub const ROOM_HISTORY_LIMIT: usize = 100;

/// Default capacity of a private conversation.
pub const PRIVATE_HISTORY_LIMIT: usize = 500;

/// Which limit applies to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// Room chat.
    Room,
    /// One-to-one chat.
    Private,
}

/// Per-kind history capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Capacity of room conversations.
    pub room: usize,
    /// Capacity of private conversations.
    pub private: usize,
}

impl HistoryLimits {
    /// Capacity for a conversation of `kind`.
    #[must_use]
    pub const fn capacity_for(&self, kind: ConversationKind) -> usize {
        match kind {
            ConversationKind::Room => self.room,
            ConversationKind::Private => self.private,
        }
    }
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            room: ROOM_HISTORY_LIMIT,
            private: PRIVATE_HISTORY_LIMIT,
        }
    }
}

/// History of a single conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
    truncated: bool,
}

impl Conversation {
    fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
            truncated: false,
        }
    }

    /// Messages, oldest first.
    #[must_use]
    pub const fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.messages
    }

    /// Number of retained messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Capacity fixed when the conversation was created.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether at least one message has been evicted.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// All conversations of the session, keyed by [`ConversationKey`].
#[derive(Debug, Default)]
pub struct HistoryStore {
    conversations: HashMap<ConversationKey, Conversation>,
}

impl HistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the conversation at `key`.
    ///
    /// The conversation is created on first use with `capacity`; later calls
    /// keep the capacity it was created with. Returns the evicted message,
    /// if the append overflowed.
    pub fn append(
        &mut self,
        key: &ConversationKey,
        message: ChatMessage,
        capacity: usize,
    ) -> Option<ChatMessage> {
        let conversation = self
            .conversations
            .entry(key.clone())
            .or_insert_with(|| Conversation::new(capacity));

        conversation.messages.push_back(message);
        if conversation.messages.len() > conversation.capacity {
            conversation.truncated = true;
            let evicted = conversation.messages.pop_front();
            tracing::debug!(
                key = %key,
                capacity = conversation.capacity,
                "conversation over capacity, evicted oldest message"
            );
            return evicted;
        }
        None
    }

    /// Conversation at `key`, if any message was ever routed to it.
    #[must_use]
    pub fn get(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.conversations.get(key)
    }

    /// Number of messages retained for `key`.
    #[must_use]
    pub fn len(&self, key: &ConversationKey) -> usize {
        self.get(key).map_or(0, Conversation::len)
    }

    /// Whether the conversation at `key` has lost messages to eviction.
    #[must_use]
    pub fn is_truncated(&self, key: &ConversationKey) -> bool {
        self.get(key).is_some_and(Conversation::is_truncated)
    }

    /// Number of conversations.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Drop every conversation.
    pub fn clear(&mut self) {
        self.conversations.clear();
    }
}
