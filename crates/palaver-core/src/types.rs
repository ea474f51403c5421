use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Messages a conversation snapshot can hold before pagination kicks in.
///
/// The server sends at most this many messages per batch; a shorter batch
/// means the beginning of history has been reached.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Per-message delivery lifecycle.
///
/// Monotonic: `Local -> Delivered -> Read`. The ordering derive is relied on
/// for the never-regress rule when entries are updated in place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Optimistic local write, not yet acknowledged by the server.
    Local,
    /// Server-acknowledged, recipient has not confirmed reading.
    Delivered,
    /// Recipient confirmed reading.
    Read,
}

impl Default for DeliveryState {
    /// Anything that reached the wire is at least delivered.
    fn default() -> Self {
        Self::Delivered
    }
}

/// One chat message as held by the store and carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Either a temporary client-minted id or a permanent server id.
    pub id: String,
    /// Text payload, non-empty for any message that was actually sent.
    pub body: String,
    /// Conversation this message belongs to.
    pub chat_id: String,
    /// Author user id.
    pub sender_id: String,
    /// Creation timestamp in milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Last-update timestamp in milliseconds since the Unix epoch.
    pub updated_at_ms: u64,
    /// Delivery lifecycle position.
    #[serde(default)]
    pub delivery: DeliveryState,
}

impl Message {
    /// Whether this is an optimistic entry still awaiting acknowledgment.
    pub fn is_local(&self) -> bool {
        self.delivery == DeliveryState::Local
    }

    /// Read-state mirror for messages not authored by the local user.
    pub fn recipient_read(&self) -> bool {
        self.delivery == DeliveryState::Read
    }
}

/// The other participant's profile and presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Peer user id.
    pub user_id: String,
    /// Display name shown in the conversation header.
    pub display_name: String,
    /// Conversation this profile was delivered for.
    pub chat_id: String,
    /// Whether the local user archived this conversation.
    pub is_archived: bool,
    /// Live presence flag.
    pub is_online: bool,
    /// Last time the peer was seen online, when known.
    pub last_online_ms: Option<u64>,
    /// Conversation creation timestamp.
    pub chat_created_ms: u64,
}

/// `*-init` payload: peer profile plus the most recent messages, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub recipient_user: Peer,
    pub messages: Vec<Message>,
}

/// `*-new-message` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub message: Message,
}

/// `*-delivered` payload: temporary-to-permanent id reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredPayload {
    pub temp_id: String,
    pub actual_id: String,
}

/// `*-messages-loader` payload: one backward page, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoaderPayload {
    pub messages: Vec<Message>,
    pub end_of_messages: bool,
    /// Id of the element that was topmost before the prepend; the re-anchor
    /// target.
    pub last_message_id: String,
}

/// `*-recipient-status-change` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub is_online: bool,
}

/// `*-error` payload: terminal conversation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status: u16,
    pub error_message: String,
}

/// Decoded inbound server event for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Snapshot replacing the whole store.
    Init(InitPayload),
    /// Message from the peer, or an echo of an own send.
    NewMessage(NewMessagePayload),
    /// Acknowledgment resolving a temporary id.
    Delivered(DeliveredPayload),
    /// The peer read everything we delivered.
    ReadAll,
    /// Backward pagination response.
    MessagesLoader(LoaderPayload),
    /// Peer presence change.
    RecipientStatusChange(StatusPayload),
    /// Terminal conversation error.
    Error(ErrorPayload),
}

/// Payload for every emit that only references the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    pub chat_id: String,
}

impl ChatRef {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
        }
    }
}

/// `send-message` emit payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub chat_id: String,
    pub recipient_id: String,
    pub message: String,
    pub temp_id: String,
}

/// `load-more` emit payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadMorePayload {
    pub chat_id: String,
    pub last_message_id: String,
}

/// Outbound emit toward the server, unscoped by conversation in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    JoinedChat(ChatRef),
    LeftChat(ChatRef),
    SendMessage(SendMessagePayload),
    ReadMessages(ChatRef),
    LoadMore(LoadMorePayload),
    ArchiveChat(ChatRef),
    DeleteChat(ChatRef),
}

impl OutboundEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinedChat(_) => "joined-chat",
            Self::LeftChat(_) => "left-chat",
            Self::SendMessage(_) => "send-message",
            Self::ReadMessages(_) => "read-messages",
            Self::LoadMore(_) => "load-more",
            Self::ArchiveChat(_) => "archive-chat",
            Self::DeleteChat(_) => "delete-chat",
        }
    }
}

/// Raw scroll-position sample reported by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportSample {
    /// Scrollbar resting at the very end of the list.
    pub at_bottom: bool,
    /// Scrollbar resting at the very top of the list.
    pub at_top: bool,
    /// False while the content is shorter than the viewport.
    pub has_overflow: bool,
}

/// Immutable view of one conversation after a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub chat_id: String,
    pub peer: Option<Peer>,
    pub messages: Vec<Message>,
    pub first_unread_index: Option<usize>,
    /// True once the oldest loaded message is the first ever sent.
    pub history_start_reached: bool,
}

/// Command channel input accepted by the session runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Join a conversation, leaving any prior one first.
    Join {
        chat_id: String,
        self_user_id: String,
    },
    /// Leave the current conversation. Idempotent.
    Leave,
    /// Optimistically send a message body.
    Send { body: String },
    /// Mark every peer message read and emit the receipt.
    MarkRead,
    /// Feed a raw scroll-position sample from the view.
    Viewport(ViewportSample),
    /// Toggle the archived flag server-side, then leave.
    Archive,
    /// Delete the conversation server-side, then leave.
    Delete,
}

/// Event channel output fanned out to view-layer subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A conversation was joined.
    Joined { chat_id: String },
    /// The conversation was left (navigation, error, or shutdown).
    Left { chat_id: String },
    /// The store or peer changed; render from this snapshot.
    Conversation(ConversationSnapshot),
    /// The view should perform this scroll action now.
    Scroll(crate::scroll::ScrollAction),
    /// Transient user-visible notice; the action was dropped.
    Notice(ChatError),
    /// Terminal conversation failure; the session was torn down.
    Fatal(ChatError),
}
