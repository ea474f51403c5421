//! Conversation engine shared between the socket runtime and view consumers.
//!
//! This crate defines the message store and reconciler, the read/delivery
//! and pagination trackers, the scroll decision function, render-time
//! grouping predicates, and the common error/channel abstractions. It is
//! transport-free: every transition is a synchronous function and time is
//! always passed in.

/// Async command/event channel primitives.
pub mod channel;
/// Per-conversation orchestration: `(state, event) -> signals`.
pub mod engine;
/// Stable chat error types.
pub mod error;
/// Render-time day/gap/run grouping predicates.
pub mod grouping;
/// Backward-pagination cursor.
pub mod pagination;
/// Viewport scroll decision function.
pub mod scroll;
/// Canonical ordered message sequence and reconciler.
pub mod store;
/// Temporary id mint for optimistic sends.
pub mod temp_id;
/// Read/delivery derivation helpers.
pub mod tracker;
/// Wire payloads, session commands/events, and shared data types.
pub mod types;

pub use channel::{SessionChannelError, SessionChannels, SessionEventStream};
pub use engine::{ChatEngine, EngineConfig, EngineSignal};
pub use error::{ChatError, ChatErrorCategory};
pub use pagination::{PAGINATION_COOLDOWN_MS, PaginationCursor};
pub use scroll::{ScrollAction, ScrollDecision};
pub use store::{MessageStore, RemoteMerge};
pub use temp_id::TempIdGenerator;
pub use types::{
    ChatRef, ConversationSnapshot, DEFAULT_PAGE_SIZE, DeliveredPayload, DeliveryState,
    ErrorPayload, InitPayload, LoadMorePayload, LoaderPayload, Message, NewMessagePayload,
    OutboundEvent, Peer, SendMessagePayload, ServerEvent, SessionCommand, SessionEvent,
    StatusPayload, ViewportSample,
};
