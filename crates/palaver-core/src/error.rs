use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatErrorCategory {
    /// Transport is down at the time of a local action.
    Connection,
    /// Invalid input or unsupported session state.
    Validation,
    /// Conversation-level failure reported by the server.
    Server,
    /// Internal engine bug or invariant break.
    Internal,
}

/// Stable error payload emitted across the session event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ChatError {
    /// High-level error category.
    pub category: ChatErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ChatError {
    /// Construct a new chat error.
    pub fn new(
        category: ChatErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The transport was disconnected when a local action needed it.
    pub fn connection_lost() -> Self {
        Self::new(
            ChatErrorCategory::Connection,
            "connection_lost",
            "connection lost, action was not sent",
        )
    }

    /// An empty message body was rejected before entering the store.
    pub fn empty_body() -> Self {
        Self::new(
            ChatErrorCategory::Validation,
            "empty_message_body",
            "cannot send an empty message",
        )
    }

    /// A conversation-scoped action arrived while no conversation is joined.
    pub fn not_joined() -> Self {
        Self::new(
            ChatErrorCategory::Validation,
            "not_joined",
            "no conversation is currently joined",
        )
    }

    /// The conversation is joined but its init snapshot has not arrived yet.
    pub fn not_ready() -> Self {
        Self::new(
            ChatErrorCategory::Validation,
            "conversation_not_ready",
            "conversation is still loading",
        )
    }

    /// Terminal conversation error pushed by the server.
    pub fn conversation(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            ChatErrorCategory::Server,
            "conversation_error",
            format!("{status} - {}", message.into()),
        )
    }

    /// Whether the session must be torn down after this error.
    pub fn is_terminal(&self) -> bool {
        self.category == ChatErrorCategory::Server
    }
}
