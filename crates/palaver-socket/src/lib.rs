//! Socket pub/sub binding for the conversation engine.
//!
//! The transport is reduced to a thin contract: emit named events, subscribe
//! and unsubscribe conversation-scoped topics, report connectivity. A
//! [`SessionRuntime`] task owns at most one joined conversation, decodes
//! inbound frames into engine events, and fans engine signals back out as
//! [`SessionEvent`]s.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use palaver_core::{
    ChatEngine, ChatError, ChatRef, EngineConfig, EngineSignal, OutboundEvent, ServerEvent,
    SessionChannelError, SessionChannels, SessionCommand, SessionEvent, SessionEventStream,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;
const INBOUND_BUFFER: usize = 256;

const KIND_INIT: &str = "init";
const KIND_NEW_MESSAGE: &str = "new-message";
const KIND_DELIVERED: &str = "delivered";
const KIND_READ_ALL: &str = "read-all";
const KIND_MESSAGES_LOADER: &str = "messages-loader";
const KIND_RECIPIENT_STATUS: &str = "recipient-status-change";
const KIND_ERROR: &str = "error";

/// Every topic kind a joined conversation listens on.
pub const SUBSCRIBED_KINDS: [&str; 7] = [
    KIND_INIT,
    KIND_NEW_MESSAGE,
    KIND_DELIVERED,
    KIND_READ_ALL,
    KIND_MESSAGES_LOADER,
    KIND_RECIPIENT_STATUS,
    KIND_ERROR,
];

/// Conversation-scoped topic name: `chat-{id}-{kind}`.
pub fn topic(chat_id: &str, kind: &str) -> String {
    format!("chat-{chat_id}-{kind}")
}

fn parse_topic(topic: &str) -> Option<(&str, &str)> {
    let rest = topic.strip_prefix("chat-")?;
    for kind in SUBSCRIBED_KINDS {
        if let Some(chat_id) = rest.strip_suffix(kind)
            && let Some(chat_id) = chat_id.strip_suffix('-')
            && !chat_id.is_empty()
        {
            return Some((chat_id, kind));
        }
    }
    None
}

fn decode_event(kind: &str, payload: Value) -> Result<ServerEvent, serde_json::Error> {
    match kind {
        KIND_INIT => serde_json::from_value(payload).map(ServerEvent::Init),
        KIND_NEW_MESSAGE => serde_json::from_value(payload).map(ServerEvent::NewMessage),
        KIND_DELIVERED => serde_json::from_value(payload).map(ServerEvent::Delivered),
        KIND_MESSAGES_LOADER => serde_json::from_value(payload).map(ServerEvent::MessagesLoader),
        KIND_RECIPIENT_STATUS => {
            serde_json::from_value(payload).map(ServerEvent::RecipientStatusChange)
        }
        KIND_ERROR => serde_json::from_value(payload).map(ServerEvent::Error),
        KIND_READ_ALL => Ok(ServerEvent::ReadAll),
        other => Err(serde::de::Error::custom(format!(
            "unknown event kind '{other}'"
        ))),
    }
}

fn encode_outbound(event: &OutboundEvent) -> Result<(&'static str, Value), serde_json::Error> {
    let payload = match event {
        OutboundEvent::JoinedChat(payload)
        | OutboundEvent::LeftChat(payload)
        | OutboundEvent::ReadMessages(payload)
        | OutboundEvent::ArchiveChat(payload)
        | OutboundEvent::DeleteChat(payload) => serde_json::to_value(payload)?,
        OutboundEvent::SendMessage(payload) => serde_json::to_value(payload)?,
        OutboundEvent::LoadMore(payload) => serde_json::to_value(payload)?,
    };
    Ok((event.name(), payload))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Errors returned by transport emit operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is currently disconnected.
    #[error("transport is disconnected")]
    Disconnected,
    /// The transport backend rejected the emit.
    #[error("transport backend failure: {0}")]
    Backend(String),
}

/// One inbound pub/sub frame: topic name plus raw JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFrame {
    pub topic: String,
    pub payload: Value,
}

/// Emit/subscribe half of the pub/sub transport.
///
/// Handshake and reconnection internals stay behind this seam; the runtime
/// only consumes the join/leave/event-subscribe contract. Implementations
/// deliver frames for subscribed topics into the inbound channel handed to
/// [`spawn_runtime`].
pub trait Transport: Send + Sync {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;
    fn subscribe(&self, topic: &str);
    fn unsubscribe(&self, topic: &str);
    fn is_connected(&self) -> bool;
}

/// In-memory transport used by tests and the smoke app.
///
/// Emits are captured on an unbounded channel for the scripted server side;
/// [`InMemoryTransport::deliver`] plays the server pushing an event.
pub struct InMemoryTransport {
    connected: AtomicBool,
    subscriptions: Mutex<HashSet<String>>,
    inbound_tx: mpsc::Sender<TransportFrame>,
    emitted_tx: mpsc::UnboundedSender<(String, Value)>,
}

impl InMemoryTransport {
    /// Build the transport plus the runtime's inbound frame receiver and the
    /// scripted server's view of everything emitted.
    pub fn new() -> (
        Arc<Self>,
        mpsc::Receiver<TransportFrame>,
        mpsc::UnboundedReceiver<(String, Value)>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (emitted_tx, emitted_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            connected: AtomicBool::new(true),
            subscriptions: Mutex::new(HashSet::new()),
            inbound_tx,
            emitted_tx,
        });
        (transport, inbound_rx, emitted_rx)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions
            .lock()
            .map(|subscriptions| subscriptions.contains(topic))
            .unwrap_or(false)
    }

    /// Push a server event; dropped unless the topic is subscribed.
    ///
    /// Returns whether the frame was forwarded.
    pub fn deliver(&self, topic: &str, payload: Value) -> bool {
        if !self.is_subscribed(topic) {
            return false;
        }
        self.deliver_raw(topic, payload)
    }

    /// Push a frame regardless of subscription state.
    ///
    /// Models a misbehaving broker; the runtime must still discard frames
    /// for conversations it has not joined.
    pub fn deliver_raw(&self, topic: &str, payload: Value) -> bool {
        self.inbound_tx
            .try_send(TransportFrame {
                topic: topic.to_owned(),
                payload,
            })
            .is_ok()
    }
}

impl Transport for InMemoryTransport {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.emitted_tx
            .send((event.to_owned(), payload))
            .map_err(|_| TransportError::Backend("emit receiver dropped".to_owned()))
    }

    fn subscribe(&self, topic: &str) {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.insert(topic.to_owned());
        }
    }

    fn unsubscribe(&self, topic: &str) {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.remove(topic);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Handle to a spawned session runtime.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    channels: SessionChannels,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Send one command to the runtime.
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionChannelError> {
        self.channels.send_command(command).await
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> SessionEventStream {
        self.channels.subscribe()
    }

    /// Stop the runtime, leaving any joined conversation first.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the session runtime over a transport.
pub fn spawn_runtime(
    transport: Arc<dyn Transport>,
    frames: mpsc::Receiver<TransportFrame>,
    engine_config: EngineConfig,
) -> SessionHandle {
    let (channels, command_rx) = SessionChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let runtime = SessionRuntime {
        channels: channels.clone(),
        command_rx,
        frames,
        transport,
        engine_config,
        session: None,
    };
    let stop = cancel.child_token();
    tokio::spawn(async move {
        runtime.run(stop).await;
    });

    SessionHandle { channels, cancel }
}

struct ActiveSession {
    engine: ChatEngine,
}

/// Owns the join/leave lifecycle for at most one conversation and dispatches
/// every inbound frame and local command through the engine.
struct SessionRuntime {
    channels: SessionChannels,
    command_rx: mpsc::Receiver<SessionCommand>,
    frames: mpsc::Receiver<TransportFrame>,
    transport: Arc<dyn Transport>,
    engine_config: EngineConfig,
    session: Option<ActiveSession>,
}

impl SessionRuntime {
    async fn run(mut self, stop: CancellationToken) {
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    self.leave_current();
                    break;
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        self.leave_current();
                        break;
                    };
                    self.handle_command(command);
                }
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        warn!("transport frame channel closed");
                        self.leave_current();
                        break;
                    };
                    self.handle_frame(frame);
                }
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join {
                chat_id,
                self_user_id,
            } => self.handle_join(chat_id, self_user_id),
            SessionCommand::Leave => self.leave_current(),
            SessionCommand::Send { body } => {
                let connected = self.transport.is_connected();
                let result = self.with_session(|session| {
                    session.engine.send_message(&body, connected, now_ms())
                });
                match result {
                    Ok(signals) => self.dispatch(signals),
                    Err(err) => self.notice(err),
                }
            }
            SessionCommand::MarkRead => {
                let connected = self.transport.is_connected();
                let result =
                    self.with_session(|session| session.engine.mark_all_read(connected));
                match result {
                    Ok(signals) => self.dispatch(signals),
                    Err(err) => self.notice(err),
                }
            }
            SessionCommand::Viewport(sample) => {
                let connected = self.transport.is_connected();
                let Some(session) = self.session.as_mut() else {
                    // Scroll samples can race teardown; nothing to report.
                    debug!("viewport sample without a joined conversation");
                    return;
                };
                let signals = session.engine.observe_viewport(sample, connected, now_ms());
                self.dispatch(signals);
            }
            SessionCommand::Archive => {
                let connected = self.transport.is_connected();
                let result = self.with_session(|session| session.engine.archive(connected));
                match result {
                    Ok(signals) => {
                        self.dispatch(signals);
                        self.leave_current();
                    }
                    Err(err) => self.notice(err),
                }
            }
            SessionCommand::Delete => {
                let connected = self.transport.is_connected();
                let result = self.with_session(|session| session.engine.delete(connected));
                match result {
                    Ok(signals) => {
                        self.dispatch(signals);
                        self.leave_current();
                    }
                    Err(err) => self.notice(err),
                }
            }
        }
    }

    fn handle_join(&mut self, chat_id: String, self_user_id: String) {
        if let Some(session) = &self.session
            && session.engine.chat_id() == chat_id
        {
            debug!(%chat_id, "already joined, ignoring join");
            return;
        }
        if !self.transport.is_connected() {
            self.notice(ChatError::connection_lost());
            return;
        }

        // Full teardown of any prior conversation strictly before the new
        // subscriptions exist, so the two topic sets never overlap.
        self.leave_current();

        for kind in SUBSCRIBED_KINDS {
            self.transport.subscribe(&topic(&chat_id, kind));
        }
        self.emit_outbound(&OutboundEvent::JoinedChat(ChatRef::new(&chat_id)));
        self.session = Some(ActiveSession {
            engine: ChatEngine::new(chat_id.clone(), self_user_id, self.engine_config),
        });
        info!(%chat_id, "joined conversation");
        self.channels.emit(SessionEvent::Joined { chat_id });
    }

    fn handle_frame(&mut self, frame: TransportFrame) {
        let Some((chat_id, kind)) = parse_topic(&frame.topic) else {
            debug!(topic = %frame.topic, "ignoring frame with unrecognized topic");
            return;
        };

        let signals = {
            let Some(session) = self.session.as_mut() else {
                debug!(topic = %frame.topic, "frame after teardown, dropping");
                return;
            };
            if session.engine.chat_id() != chat_id {
                debug!(
                    topic = %frame.topic,
                    joined = %session.engine.chat_id(),
                    "frame for another conversation, dropping"
                );
                return;
            }

            match decode_event(kind, frame.payload) {
                Ok(event) => session.engine.apply_server_event(event, now_ms()),
                Err(err) => {
                    warn!(topic = %frame.topic, %err, "undecodable frame payload, dropping");
                    return;
                }
            }
        };

        self.dispatch(signals);
    }

    fn with_session<T>(
        &mut self,
        action: impl FnOnce(&mut ActiveSession) -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let Some(session) = self.session.as_mut() else {
            return Err(ChatError::not_joined());
        };
        action(session)
    }

    fn dispatch(&mut self, signals: Vec<EngineSignal>) {
        let mut snapshot_needed = false;
        let mut fatal = None;

        for signal in signals {
            match signal {
                EngineSignal::Emit(event) => self.emit_outbound(&event),
                EngineSignal::Scroll(action) => self.channels.emit(SessionEvent::Scroll(action)),
                EngineSignal::StoreChanged | EngineSignal::PeerChanged => snapshot_needed = true,
                EngineSignal::Notice(err) => self.notice(err),
                EngineSignal::Fatal(err) => fatal = Some(err),
            }
        }

        if snapshot_needed
            && let Some(session) = &self.session
        {
            self.channels
                .emit(SessionEvent::Conversation(session.engine.snapshot()));
        }

        if let Some(err) = fatal {
            error!(code = %err.code, message = %err.message, "terminal conversation error");
            self.channels.emit(SessionEvent::Fatal(err));
            self.leave_current();
        }
    }

    fn leave_current(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let chat_id = session.engine.chat_id().to_owned();
        for kind in SUBSCRIBED_KINDS {
            self.transport.unsubscribe(&topic(&chat_id, kind));
        }
        self.emit_outbound(&OutboundEvent::LeftChat(ChatRef::new(&chat_id)));
        info!(%chat_id, "left conversation");
        self.channels.emit(SessionEvent::Left { chat_id });
    }

    fn emit_outbound(&self, event: &OutboundEvent) {
        match encode_outbound(event) {
            Ok((name, payload)) => {
                if let Err(err) = self.transport.emit(name, payload) {
                    warn!(event = name, %err, "emit dropped by transport");
                }
            }
            Err(err) => {
                error!(event = event.name(), %err, "outbound payload failed to serialize");
            }
        }
    }

    fn notice(&self, err: ChatError) {
        self.channels.emit(SessionEvent::Notice(err));
    }
}
