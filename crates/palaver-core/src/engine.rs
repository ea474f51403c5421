use tracing::{debug, warn};

use crate::{
    error::ChatError,
    pagination::PaginationCursor,
    scroll::{self, ScrollAction},
    store::MessageStore,
    temp_id::TempIdGenerator,
    tracker,
    types::{
        ChatRef, ConversationSnapshot, DeliveryState, LoadMorePayload, Message, OutboundEvent,
        Peer, SendMessagePayload, ServerEvent, ViewportSample, DEFAULT_PAGE_SIZE,
    },
};

/// Side effect produced by an engine transition.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Send this event to the server.
    Emit(OutboundEvent),
    /// Instruct the view to perform a scroll action.
    Scroll(ScrollAction),
    /// The message sequence changed; re-render.
    StoreChanged,
    /// The peer profile or presence changed.
    PeerChanged,
    /// Transient user-visible notice; the triggering action was dropped.
    Notice(ChatError),
    /// Terminal failure; the session must be torn down.
    Fatal(ChatError),
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Server batch size; a shorter init snapshot means history is complete.
    pub page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// State machine for exactly one joined conversation.
///
/// Owns the message store, the pagination cursor, and the latest viewport
/// sample. Every transition is a synchronous `(state, input) -> signals`
/// function; time is always passed in, never read from a clock.
#[derive(Debug, Clone)]
pub struct ChatEngine {
    chat_id: String,
    peer: Option<Peer>,
    store: MessageStore,
    cursor: PaginationCursor,
    viewport: ViewportSample,
    temp_ids: TempIdGenerator,
    page_size: usize,
    initialized: bool,
}

impl ChatEngine {
    pub fn new(
        chat_id: impl Into<String>,
        self_user_id: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        let chat_id = chat_id.into();
        Self {
            store: MessageStore::new(chat_id.clone(), self_user_id),
            chat_id,
            peer: None,
            cursor: PaginationCursor::new(),
            viewport: ViewportSample::default(),
            temp_ids: TempIdGenerator::new(),
            page_size: config.page_size.max(1),
            initialized: false,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn first_unread_index(&self) -> Option<usize> {
        tracker::first_unread_index(self.store.messages(), self.store.self_user_id())
    }

    pub fn history_start_reached(&self) -> bool {
        self.cursor.end_of_history()
    }

    /// Immutable view for the render layer.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            chat_id: self.chat_id.clone(),
            peer: self.peer.clone(),
            messages: self.store.messages().to_vec(),
            first_unread_index: self.first_unread_index(),
            history_start_reached: self.cursor.end_of_history(),
        }
    }

    /// Apply one inbound server event.
    pub fn apply_server_event(&mut self, event: ServerEvent, now_ms: u64) -> Vec<EngineSignal> {
        match event {
            ServerEvent::Init(payload) => {
                if payload.recipient_user.chat_id != self.chat_id {
                    warn!(
                        chat_id = %self.chat_id,
                        event_chat_id = %payload.recipient_user.chat_id,
                        "dropping init for another conversation"
                    );
                    return Vec::new();
                }

                let batch_len = payload.messages.len();
                self.peer = Some(payload.recipient_user);
                self.store.initialize(payload.messages);
                if batch_len < self.page_size {
                    self.cursor.latch_end();
                }
                self.initialized = true;

                let landing = match self.first_unread_index() {
                    Some(_) => ScrollAction::ScrollToUnreadMarker,
                    None => ScrollAction::ScrollToBottom,
                };
                vec![
                    EngineSignal::PeerChanged,
                    EngineSignal::StoreChanged,
                    EngineSignal::Scroll(landing),
                ]
            }
            ServerEvent::NewMessage(payload) => {
                if payload.message.chat_id != self.chat_id {
                    warn!(
                        chat_id = %self.chat_id,
                        event_chat_id = %payload.message.chat_id,
                        "dropping message for another conversation"
                    );
                    return Vec::new();
                }

                let from_peer = payload.message.sender_id != self.store.self_user_id();
                let merge = self.store.apply_remote(payload.message);
                debug!(?merge, from_peer, "absorbed new-message");

                let mut signals = vec![EngineSignal::StoreChanged];
                if from_peer {
                    // Addressed to us: acknowledge immediately and decide how
                    // the viewport should react.
                    self.store.mark_peer_read();
                    signals.push(EngineSignal::Emit(OutboundEvent::ReadMessages(
                        ChatRef::new(&self.chat_id),
                    )));
                    let decision = scroll::decide(self.viewport, self.first_unread_index(), None);
                    if decision.action != ScrollAction::NoOp {
                        signals.push(EngineSignal::Scroll(decision.action));
                    }
                }
                signals
            }
            ServerEvent::Delivered(payload) => {
                if self
                    .store
                    .reconcile_delivered(&payload.temp_id, &payload.actual_id)
                {
                    vec![EngineSignal::StoreChanged]
                } else {
                    Vec::new()
                }
            }
            ServerEvent::ReadAll => {
                if self.store.apply_read_all() > 0 {
                    vec![EngineSignal::StoreChanged]
                } else {
                    Vec::new()
                }
            }
            ServerEvent::MessagesLoader(payload) => {
                self.cursor.complete(payload.end_of_messages, now_ms);
                let added = self.store.prepend_older(payload.messages);
                debug!(added, end = payload.end_of_messages, "merged backward page");
                vec![
                    EngineSignal::StoreChanged,
                    EngineSignal::Scroll(ScrollAction::ScrollToAnchor(payload.last_message_id)),
                ]
            }
            ServerEvent::RecipientStatusChange(payload) => {
                let Some(peer) = self.peer.as_mut() else {
                    warn!(chat_id = %self.chat_id, "presence change before init snapshot");
                    return Vec::new();
                };
                if peer.is_online && !payload.is_online {
                    peer.last_online_ms = Some(now_ms);
                }
                peer.is_online = payload.is_online;
                vec![EngineSignal::PeerChanged]
            }
            ServerEvent::Error(payload) => {
                vec![EngineSignal::Fatal(ChatError::conversation(
                    payload.status,
                    payload.error_message,
                ))]
            }
        }
    }

    /// Optimistically send a message body.
    pub fn send_message(
        &mut self,
        body: &str,
        connected: bool,
        now_ms: u64,
    ) -> Result<Vec<EngineSignal>, ChatError> {
        if !connected {
            return Err(ChatError::connection_lost());
        }
        let Some(peer) = self.peer.as_ref() else {
            return Err(ChatError::not_ready());
        };
        if body.is_empty() {
            return Err(ChatError::empty_body());
        }

        let temp_id = self.temp_ids.next(now_ms);
        let stamp = self.temp_ids.last_ms();
        let message = Message {
            id: temp_id.clone(),
            body: body.to_owned(),
            chat_id: self.chat_id.clone(),
            sender_id: self.store.self_user_id().to_owned(),
            created_at_ms: stamp,
            updated_at_ms: stamp,
            delivery: DeliveryState::Local,
        };
        let emit = OutboundEvent::SendMessage(SendMessagePayload {
            chat_id: self.chat_id.clone(),
            recipient_id: peer.user_id.clone(),
            message: body.to_owned(),
            temp_id,
        });

        self.store.apply_local(message);
        // Replying implies everything above was seen.
        self.store.mark_peer_read();

        let mut signals = vec![EngineSignal::Emit(emit), EngineSignal::StoreChanged];
        let decision = scroll::decide(self.viewport, self.first_unread_index(), None);
        if decision.action != ScrollAction::NoOp {
            signals.push(EngineSignal::Scroll(decision.action));
        }
        Ok(signals)
    }

    /// Mark every peer message read and emit the receipt.
    pub fn mark_all_read(&mut self, connected: bool) -> Result<Vec<EngineSignal>, ChatError> {
        if !connected {
            return Err(ChatError::connection_lost());
        }

        let changed = self.store.mark_peer_read();
        let mut signals = vec![EngineSignal::Emit(OutboundEvent::ReadMessages(
            ChatRef::new(&self.chat_id),
        ))];
        if changed > 0 {
            signals.push(EngineSignal::StoreChanged);
        }
        Ok(signals)
    }

    /// Feed one raw scroll-position sample from the view.
    ///
    /// Reaching the bottom with unread messages marks them read; resting at
    /// the top arms a backward-page request, re-triggerable after each
    /// cooldown even while the sample stays pinned at the top.
    pub fn observe_viewport(
        &mut self,
        sample: ViewportSample,
        connected: bool,
        now_ms: u64,
    ) -> Vec<EngineSignal> {
        self.viewport = sample;
        let mut signals = Vec::new();

        let decision = scroll::decide(sample, self.first_unread_index(), None);
        if decision.mark_read {
            if connected {
                self.store.mark_peer_read();
                signals.push(EngineSignal::Emit(OutboundEvent::ReadMessages(
                    ChatRef::new(&self.chat_id),
                )));
                signals.push(EngineSignal::StoreChanged);
            } else {
                signals.push(EngineSignal::Notice(ChatError::connection_lost()));
            }
        }
        if decision.action != ScrollAction::NoOp {
            signals.push(EngineSignal::Scroll(decision.action));
        }

        if sample.at_top && self.initialized && self.cursor.should_request(now_ms) {
            if let Some(oldest) = self.store.oldest_id() {
                if connected {
                    let emit = OutboundEvent::LoadMore(LoadMorePayload {
                        chat_id: self.chat_id.clone(),
                        last_message_id: oldest.to_owned(),
                    });
                    self.cursor.mark_requested(now_ms);
                    signals.push(EngineSignal::Emit(emit));
                } else {
                    debug!(chat_id = %self.chat_id, "skipping pagination while disconnected");
                }
            }
        }

        signals
    }

    /// Toggle the archived flag server-side.
    pub fn archive(&self, connected: bool) -> Result<Vec<EngineSignal>, ChatError> {
        if !connected {
            return Err(ChatError::connection_lost());
        }
        Ok(vec![EngineSignal::Emit(OutboundEvent::ArchiveChat(
            ChatRef::new(&self.chat_id),
        ))])
    }

    /// Delete the conversation server-side.
    pub fn delete(&self, connected: bool) -> Result<Vec<EngineSignal>, ChatError> {
        if !connected {
            return Err(ChatError::connection_lost());
        }
        Ok(vec![EngineSignal::Emit(OutboundEvent::DeleteChat(
            ChatRef::new(&self.chat_id),
        ))])
    }
}
