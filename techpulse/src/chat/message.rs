use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::article::Article;

/// Fallback text for inbound payloads that carry no textual field.
pub const PLACEHOLDER_TEXT: &str = "No message content available";

/// Discriminates rendering and styling of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    Bot,
    Error,
}

impl MessageKind {
    /// Map a wire discriminant onto a kind. Anything the backend emits that is
    /// neither a user echo nor an error renders as a bot turn.
    pub fn from_discriminant(discriminant: &str) -> Self {
        match discriminant {
            "user_message" | "user" => MessageKind::User,
            "error" => MessageKind::Error,
            _ => MessageKind::Bot,
        }
    }
}

/// A single chat turn. Immutable once appended to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    /// Only set on user messages sent while an article context was active.
    pub attached_article: Option<Article>,
}

impl Message {
    pub fn user(text: impl Into<String>, attached_article: Option<Article>) -> Self {
        Self {
            kind: MessageKind::User,
            text: text.into(),
            attached_article,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Bot,
            text: text.into(),
            attached_article: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
            attached_article: None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            MessageKind::User => "you",
            MessageKind::Bot => "techpulse",
            MessageKind::Error => "error",
        };
        write!(f, "[{}] {}", prefix, self.text)?;
        if let Some(article) = &self.attached_article {
            write!(f, " (re: {})", article.title)?;
        }
        Ok(())
    }
}

/// Outbound wire shape for a user turn.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
    /// JSON-serialized article snapshot, or null
    pub selected_news_article: Option<String>,
}

impl<'a> OutboundMessage<'a> {
    pub fn user(content: &'a str, article: Option<&Article>) -> serde_json::Result<Self> {
        let selected_news_article = article.map(Article::to_wire).transpose()?;
        Ok(Self {
            kind: "user_message",
            content,
            selected_news_article,
        })
    }
}

/// Connection lifecycle of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}

/// Failures inside the chat core. None of these escape the session
/// controller as faults: each becomes a state change or a transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("failed to connect: {reason}")]
    TransportConstruction { reason: String },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    TransportRuntime(String),
}
