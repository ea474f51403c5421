use tracing::warn;

use crate::types::{DeliveryState, Message};

/// How a remote `new-message` was absorbed into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMerge {
    /// Brand-new content, inserted in chronological position.
    Inserted,
    /// An entry with the same id already existed and was updated in place.
    UpdatedExisting,
    /// An optimistic local entry adopted the server copy of an own send.
    AdoptedLocal,
}

/// Canonical ordered message sequence for one conversation.
///
/// Invariants: sorted by `created_at_ms` with ties broken by arrival order,
/// ids unique. Every transition that would duplicate an id updates the
/// existing entry in place instead.
#[derive(Debug, Clone)]
pub struct MessageStore {
    chat_id: String,
    self_user_id: String,
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new(chat_id: impl Into<String>, self_user_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            self_user_id: self_user_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn self_user_id(&self) -> &str {
        &self.self_user_id
    }

    /// Current messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id of the oldest loaded message, the backward-pagination key.
    pub fn oldest_id(&self) -> Option<&str> {
        self.messages.first().map(|message| message.id.as_str())
    }

    /// Replace the whole store with an init snapshot (newest-first on the
    /// wire, normalized here to chronological order).
    pub fn initialize(&mut self, newest_first: Vec<Message>) {
        self.messages.clear();
        for message in normalize(newest_first) {
            if self.position_of(&message.id).is_some() {
                warn!(id = %message.id, "init snapshot repeated a message id");
                continue;
            }
            self.messages.push(message);
        }
        self.messages
            .sort_by_key(|message| message.created_at_ms);
    }

    /// Append an optimistic local send.
    ///
    /// The body is validated and the temporary id minted upstream; the store
    /// only places the entry.
    pub fn apply_local(&mut self, message: Message) {
        self.insert_ordered(message);
    }

    /// Absorb a `new-message` event.
    ///
    /// An echo of an own send adopts the oldest still-local optimistic entry
    /// instead of appending a second copy.
    pub fn apply_remote(&mut self, message: Message) -> RemoteMerge {
        if let Some(index) = self.position_of(&message.id) {
            self.update_in_place(index, message);
            return RemoteMerge::UpdatedExisting;
        }

        if message.sender_id == self.self_user_id
            && let Some(index) = self.messages.iter().position(Message::is_local)
        {
            let mut adopted = message;
            adopted.delivery = adopted.delivery.max(DeliveryState::Delivered);
            self.messages.remove(index);
            self.insert_ordered(adopted);
            return RemoteMerge::AdoptedLocal;
        }

        self.insert_ordered(message);
        RemoteMerge::Inserted
    }

    /// Resolve a temporary id against its server-assigned permanent id.
    ///
    /// Returns false when no entry carries the temporary id; callers treat
    /// that as an already-reconciled (or superseded) send. Applying the same
    /// event twice is a no-op the second time.
    pub fn reconcile_delivered(&mut self, temp_id: &str, actual_id: &str) -> bool {
        let Some(index) = self.position_of(temp_id) else {
            warn!(temp_id, actual_id, "delivered event referenced an unknown temporary id");
            return false;
        };

        if let Some(existing) = self.position_of(actual_id) {
            // The echo already landed under the permanent id; keep that entry.
            self.messages.remove(index);
            let kept = &mut self.messages[existing - usize::from(existing > index)];
            kept.delivery = kept.delivery.max(DeliveryState::Delivered);
            return true;
        }

        let entry = &mut self.messages[index];
        entry.id = actual_id.to_owned();
        entry.delivery = entry.delivery.max(DeliveryState::Delivered);
        true
    }

    /// Apply a server `read-all`: every own delivered message becomes read.
    ///
    /// Peer-authored entries and unacknowledged local entries are untouched.
    pub fn apply_read_all(&mut self) -> usize {
        let mut changed = 0;
        for message in &mut self.messages {
            if message.sender_id == self.self_user_id
                && message.delivery == DeliveryState::Delivered
            {
                message.delivery = DeliveryState::Read;
                changed += 1;
            }
        }
        changed
    }

    /// Locally mark every peer-authored message read.
    pub fn mark_peer_read(&mut self) -> usize {
        let mut changed = 0;
        for message in &mut self.messages {
            if message.sender_id != self.self_user_id && message.delivery != DeliveryState::Read {
                message.delivery = DeliveryState::Read;
                changed += 1;
            }
        }
        changed
    }

    /// Prepend one backward page (newest-first on the wire).
    ///
    /// Returns how many entries were actually added; ids already present are
    /// skipped so a replayed page cannot duplicate history.
    pub fn prepend_older(&mut self, newest_first: Vec<Message>) -> usize {
        let batch: Vec<Message> = normalize(newest_first)
            .into_iter()
            .filter(|message| self.position_of(&message.id).is_none())
            .collect();
        let added = batch.len();
        self.messages.splice(0..0, batch);
        added
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    fn update_in_place(&mut self, index: usize, incoming: Message) {
        let entry = &mut self.messages[index];
        entry.body = incoming.body;
        entry.updated_at_ms = incoming.updated_at_ms;
        entry.delivery = entry.delivery.max(incoming.delivery);
    }

    /// Insert keeping the sequence sorted by `created_at_ms`; equal
    /// timestamps land after existing entries (arrival order wins).
    fn insert_ordered(&mut self, message: Message) {
        let at = self
            .messages
            .iter()
            .rposition(|existing| existing.created_at_ms <= message.created_at_ms)
            .map_or(0, |index| index + 1);
        self.messages.insert(at, message);
    }
}

fn normalize(mut newest_first: Vec<Message>) -> Vec<Message> {
    newest_first.reverse();
    newest_first
}
