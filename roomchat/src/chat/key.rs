//! Conversation identities.
//!
//! A room conversation is keyed by its room id. A private conversation is
//! keyed by both participant ids, sorted and joined with [`KEY_DELIMITER`],
//! so that both ends of the chat resolve the same key.

use std::fmt;

/// Separator between the two user ids of a private conversation key.
pub const KEY_DELIMITER: char = '-';

/// Canonical identifier of one conversation's history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key of a room conversation.
    pub fn room(room_id: impl Into<String>) -> Self {
        Self(room_id.into())
    }

    /// Key of the private conversation between `a` and `b`.
    ///
    /// Symmetric in its arguments. `a == b` yields the self-chat key.
    #[must_use]
    pub fn private(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{low}{KEY_DELIMITER}{high}"))
    }

    /// Return the string representation of this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve the private conversation key for two user ids.
#[must_use]
pub fn conversation_key(a: &str, b: &str) -> ConversationKey {
    ConversationKey::private(a, b)
}
