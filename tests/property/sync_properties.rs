//! Property-based tests for the synchronization engine.
//!
//! Uses proptest to verify:
//! 1. Conversation keys are symmetric and contain both ids.
//! 2. History never exceeds its capacity, keeps the newest messages, and
//!    flags truncation exactly once eviction has happened.
//! 3. Room frames from self are never stored, whatever their content.
//! 4. The unread set only ever holds peers whose messages arrived outside
//!    the active conversation.

use proptest::prelude::*;

use roomchat::chat::history::{HistoryLimits, HistoryStore};
use roomchat::chat::key::{ConversationKey, conversation_key};
use roomchat::chat::{ChatMessage, ChatTarget, FrameOutcome, SyncEngine};
use roomchat_proto::api::User;
use roomchat_proto::frame::InboundFrame;

fn message(id: i64) -> ChatMessage {
    ChatMessage {
        id,
        content: id.to_string(),
        author: User::new("u2", "bob"),
    }
}

proptest! {
    #[test]
    fn conversation_key_is_symmetric(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
        let ab = conversation_key(&a, &b);
        prop_assert_eq!(&ab, &conversation_key(&b, &a));
        let (lo, hi) = if a <= b { (&a, &b) } else { (&b, &a) };
        prop_assert_eq!(ab.as_str(), format!("{lo}-{hi}"));
    }

    #[test]
    fn history_is_bounded_and_keeps_newest(capacity in 1usize..64, count in 0usize..200) {
        let mut store = HistoryStore::new();
        let key = ConversationKey::room("r1");
        for i in 0..count {
            store.append(&key, message(i64::try_from(i).unwrap()), capacity);
            prop_assert!(store.len(&key) <= capacity);
            prop_assert_eq!(store.is_truncated(&key), i + 1 > capacity);
        }
        if count > 0 {
            let convo = store.get(&key).unwrap();
            let expected_first = count.saturating_sub(capacity);
            prop_assert_eq!(convo.messages().front().map(|m| m.id), Some(i64::try_from(expected_first).unwrap()));
            prop_assert_eq!(convo.messages().back().map(|m| m.id), Some(i64::try_from(count - 1).unwrap()));
        }
    }

    #[test]
    fn capacity_is_fixed_at_creation(first in 1usize..20, later in 1usize..20, count in 0usize..60) {
        let mut store = HistoryStore::new();
        let key = ConversationKey::room("r1");
        store.append(&key, message(0), first);
        for i in 1..=count {
            store.append(&key, message(i64::try_from(i).unwrap()), later);
        }
        prop_assert_eq!(store.get(&key).unwrap().capacity(), first);
        prop_assert!(store.len(&key) <= first);
    }

    #[test]
    fn own_room_frames_are_never_stored(text in "\\PC{0,64}", room in "[a-z0-9]{1,8}") {
        let mut engine = SyncEngine::new(User::new("me", "me"), HistoryLimits::default());
        let outcome = engine.handle_frame(&InboundFrame::room("me", &room, text, 1));
        prop_assert!(matches!(outcome, FrameOutcome::Dropped(_)), "self echo was not dropped");
        prop_assert!(engine.conversation(&ConversationKey::room(room)).is_none());
    }

    #[test]
    fn unread_tracks_only_inactive_peers(
        senders in prop::collection::vec(0u8..5, 0..40),
        active in 0u8..5,
    ) {
        let mut engine = SyncEngine::new(User::new("me", "me"), HistoryLimits::default());
        let active_id = format!("p{active}");
        engine.select_target(ChatTarget::user(&active_id, ""));

        for (i, s) in senders.iter().enumerate() {
            let from = format!("p{s}");
            engine.handle_frame(&InboundFrame::private(&from, "me", "x", i64::try_from(i).unwrap()));
        }

        prop_assert!(!engine.unread().contains(&active_id));
        for s in &senders {
            let peer = format!("p{s}");
            prop_assert_eq!(engine.unread().contains(&peer), peer != active_id);
        }
    }
}
