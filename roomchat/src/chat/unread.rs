//! Peers with private messages the viewer has not looked at yet.

use std::collections::BTreeSet;

/// Set of user ids with unseen private messages.
#[derive(Debug, Default, Clone)]
pub struct UnreadTracker {
    peers: BTreeSet<String>,
}

impl UnreadTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `peer` unread. Returns `true` if it was not marked before.
    pub fn mark(&mut self, peer: &str) -> bool {
        self.peers.insert(peer.to_string())
    }

    /// Clear the mark on `peer`. Returns `true` if it was marked.
    pub fn clear(&mut self, peer: &str) -> bool {
        self.peers.remove(peer)
    }

    /// Whether `peer` is marked unread.
    #[must_use]
    pub fn contains(&self, peer: &str) -> bool {
        self.peers.contains(peer)
    }

    /// Marked peers in id order.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    /// Number of marked peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Clear every mark.
    pub fn reset(&mut self) {
        self.peers.clear();
    }
}
