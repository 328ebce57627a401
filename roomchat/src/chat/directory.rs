//! Id → display name lookups for every user seen during the session.

use std::collections::HashMap;

use roomchat_proto::api::User;

/// Users observed in any server payload, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `user`, replacing any earlier snapshot with the same id.
    ///
    /// Snapshots with an empty id or name are ignored.
    pub fn observe(&mut self, user: &User) {
        if user.id.is_empty() || user.name.is_empty() {
            return;
        }
        self.users.insert(user.id.clone(), user.clone());
    }

    /// Record a user given as separate id and name fields.
    pub fn observe_parts(&mut self, id: &str, name: &str) {
        self.observe(&User::new(id, name));
    }

    /// Display name of `id`, if known.
    #[must_use]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(|u| u.name.as_str())
    }

    /// Display name of `id`, falling back to the id itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name_of(id).unwrap_or(id)
    }

    /// Number of known users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
