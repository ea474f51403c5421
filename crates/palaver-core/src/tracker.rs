//! Read/delivery derivation over the message sequence.
//!
//! Everything here is a pure function recomputed after each store mutation;
//! nothing is cached on messages, so the values can never go stale.

use crate::types::{DeliveryState, Message};

/// Index of the earliest peer-authored message the local user has not read.
///
/// Drives the unread banner and the jump-to-unread scroll decision.
pub fn first_unread_index(messages: &[Message], self_user_id: &str) -> Option<usize> {
    messages
        .iter()
        .position(|message| message.sender_id != self_user_id && message.delivery != DeliveryState::Read)
}

/// Number of peer-authored messages not yet read by the local user.
pub fn unread_count(messages: &[Message], self_user_id: &str) -> usize {
    messages
        .iter()
        .filter(|message| message.sender_id != self_user_id && message.delivery != DeliveryState::Read)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str, delivery: DeliveryState) -> Message {
        Message {
            id: id.to_owned(),
            body: "hi".to_owned(),
            chat_id: "c1".to_owned(),
            sender_id: sender.to_owned(),
            created_at_ms: 100,
            updated_at_ms: 100,
            delivery,
        }
    }

    #[test]
    fn finds_earliest_unread_peer_message() {
        let messages = vec![
            message("M1", "peer", DeliveryState::Read),
            message("M2", "me", DeliveryState::Delivered),
            message("M3", "peer", DeliveryState::Delivered),
            message("M4", "peer", DeliveryState::Delivered),
        ];

        assert_eq!(first_unread_index(&messages, "me"), Some(2));
        assert_eq!(unread_count(&messages, "me"), 2);
    }

    #[test]
    fn own_unread_messages_do_not_count() {
        let messages = vec![
            message("M1", "me", DeliveryState::Local),
            message("M2", "me", DeliveryState::Delivered),
        ];

        assert_eq!(first_unread_index(&messages, "me"), None);
        assert_eq!(unread_count(&messages, "me"), 0);
    }

    #[test]
    fn fully_read_conversation_has_no_unread_index() {
        let messages = vec![message("M1", "peer", DeliveryState::Read)];
        assert_eq!(first_unread_index(&messages, "me"), None);
    }

    #[test]
    fn rerunning_on_unchanged_sequence_yields_identical_output() {
        let messages = vec![
            message("M1", "peer", DeliveryState::Delivered),
            message("M2", "me", DeliveryState::Read),
        ];

        let first = first_unread_index(&messages, "me");
        assert_eq!(first_unread_index(&messages, "me"), first);
    }
}
