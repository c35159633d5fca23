use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::article::Article;

use super::context::ContextAttachment;
use super::message::{ChatError, ConnectionState, Message, OutboundMessage};
use super::normalize::normalize;
use super::store::ConversationStore;
use super::transport::{Transport, TransportEvent, TransportFactory};

pub const DEFAULT_WELCOME: &str =
    "Connected to TechPulse AI. Ask me anything about the latest tech news!";
pub const INVALID_MESSAGE_TEXT: &str = "Error processing message from server";
pub const CONNECTION_ERROR_TEXT: &str = "Connection error. Please try reconnecting.";

/// Owns one chat connection at a time and the transcript built on top of it.
///
/// All failures stay inside the controller: they become a state transition,
/// a synthetic transcript entry, or a silent no-op.
pub struct SessionController {
    id: Uuid,
    factory: Arc<dyn TransportFactory>,
    credential: Option<String>,
    welcome_message: String,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    events: Option<UnboundedReceiver<TransportEvent>>,
    store: ConversationStore,
    context: ContextAttachment,
    pending_response: bool,
}

impl SessionController {
    pub fn new(factory: Arc<dyn TransportFactory>, credential: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            factory,
            credential,
            welcome_message: DEFAULT_WELCOME.to_string(),
            state: ConnectionState::Idle,
            transport: None,
            events: None,
            store: ConversationStore::new(),
            context: ContextAttachment::new(),
            pending_response: false,
        }
    }

    pub fn with_welcome_message(mut self, welcome: impl Into<String>) -> Self {
        self.welcome_message = welcome.into();
        self
    }

    pub fn with_context(mut self, context: ContextAttachment) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_response
    }

    pub fn context(&self) -> &ContextAttachment {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextAttachment {
        &mut self.context
    }

    /// Request a fresh transport. No-op while connecting or connected.
    pub fn connect(&mut self) -> Result<(), ChatError> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(session = %self.id, state = %self.state, "connect ignored");
            return Ok(());
        }

        // Reconnection always starts from a fresh transport.
        self.release_transport();

        match self.factory.create_chat_transport(self.credential.as_deref()) {
            Some(handle) => {
                self.transport = Some(handle.transport);
                self.events = Some(handle.events);
                self.state = ConnectionState::Connecting;
                info!(session = %self.id, "chat session connecting");
                Ok(())
            }
            None => {
                self.state = ConnectionState::Disconnected;
                let err = ChatError::TransportConstruction {
                    reason: "no transport available".to_string(),
                };
                error!(session = %self.id, error = %err, "chat session could not connect");
                Err(err)
            }
        }
    }

    /// Send a user turn with an optional article context.
    ///
    /// Returns `false` without touching the transcript when the text is blank
    /// or the session is not connected. On success the message is echoed into
    /// the transcript before it goes on the wire.
    pub fn send(&mut self, text: &str, context: Option<&Article>) -> bool {
        if text.trim().is_empty() || self.state != ConnectionState::Connected {
            return false;
        }
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        let outbound = OutboundMessage::user(text, context);
        let payload = match outbound.and_then(|m| serde_json::to_string(&m)) {
            Ok(payload) => payload,
            Err(e) => {
                error!(session = %self.id, error = %e, "failed to serialize outbound message");
                return false;
            }
        };

        self.store.append(Message::user(text, context.cloned()));
        let sent = transport.send(payload);
        self.pending_response = true;

        if let Err(e) = sent {
            self.fail_transport(ChatError::TransportRuntime(e.to_string()));
        } else {
            debug!(session = %self.id, with_context = context.is_some(), "user message sent");
        }
        true
    }

    /// Send using the session's own context attachment.
    pub fn send_with_context(&mut self, text: &str) -> bool {
        let snapshot = self.context.consume_for_next_send().cloned();
        self.send(text, snapshot.as_ref())
    }

    /// Close the transport, if any, exactly once. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.release_transport();
        self.pending_response = false;
        if self.state != ConnectionState::Disconnected {
            info!(session = %self.id, "chat session torn down");
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Wait for the next event of the current transport.
    ///
    /// Returns `None` immediately when there is no transport. A transport whose
    /// event stream ends without a close signal is reported as `Closed`.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let events = self.events.as_mut()?;
        match events.recv().await {
            Some(event) => Some(event),
            None => {
                self.events = None;
                Some(TransportEvent::Closed)
            }
        }
    }

    /// Wait for one transport event and apply it. Returns `false` when there
    /// is nothing left to wait for.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply a transport event to the session state and transcript.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                self.state = ConnectionState::Connected;
                info!(session = %self.id, "chat session connected");
                self.store.append(Message::bot(self.welcome_message.clone()));
            }
            TransportEvent::Message(raw) => {
                match normalize(&raw) {
                    Ok(message) => self.store.append(message),
                    Err(e) => {
                        warn!(session = %self.id, error = %e, "dropping inbound payload");
                        self.store.append(Message::error(INVALID_MESSAGE_TEXT));
                    }
                }
                self.pending_response = false;
            }
            TransportEvent::Closed => {
                info!(session = %self.id, "chat session closed");
                self.release_transport();
                self.state = ConnectionState::Disconnected;
                self.pending_response = false;
            }
            TransportEvent::Error(reason) => {
                self.fail_transport(ChatError::TransportRuntime(reason));
            }
        }
    }

    fn fail_transport(&mut self, err: ChatError) {
        error!(session = %self.id, error = %err, "chat transport failed");
        self.release_transport();
        self.state = ConnectionState::Disconnected;
        self.pending_response = false;
        self.store.append(Message::error(CONNECTION_ERROR_TEXT));
    }

    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.events = None;
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
