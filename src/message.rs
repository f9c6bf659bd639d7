use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use crate::llm::WireMessage;

/// Placeholder shown for an assistant reply that has no text yet.
pub const PENDING_PLACEHOLDER: &str = "…";

/// Represents who sent a message in the chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Returns the display prefix for this role.
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::User => "You: ",
            Role::Assistant => "Assistant: ",
            Role::System => "System: ",
        }
    }

    /// Wire name used by the completions API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message in the chat history.
#[derive(Clone, Debug)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Text to render. An empty reply that is still arriving shows the
    /// pending placeholder.
    pub fn display_content(&self, incoming: bool) -> &str {
        if self.content.is_empty() && incoming {
            PENDING_PLACEHOLDER
        } else {
            &self.content
        }
    }

    /// Local wall-clock time the message was created, as `HH:MM`.
    pub fn time_label(&self) -> String {
        self.created_at.with_timezone(&Local).format("%H:%M").to_string()
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            role: self.role.as_str().to_string(),
            content: self.content.clone(),
        }
    }
}
