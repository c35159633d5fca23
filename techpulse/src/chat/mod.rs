//! Chat session client: transport, normalization, transcript and article context.

pub mod context;
pub mod message;
pub mod normalize;
pub mod session;
pub mod store;
pub mod transport;

pub use context::{ContextAttachment, FileHandoff, HandoffSlot, MemoryHandoff};
pub use message::{ChatError, ConnectionState, Message, MessageKind, PLACEHOLDER_TEXT};
pub use normalize::normalize;
pub use session::SessionController;
pub use store::ConversationStore;
pub use transport::{
    build_chat_url, Transport, TransportEvent, TransportFactory, TransportHandle,
    WsTransportFactory,
};
