//! Conversation transcript
//!
//! An ordered message log whose first entry is always the system preamble.
//! The log is replayed verbatim to the model provider and to the exporter,
//! so ordering is significant and entries are never edited after the fact
//! (the system preamble at index 0 is the one exception).

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are Synthara, a helpful and intelligent assistant.";

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_MESSAGE)
    }
}

impl Transcript {
    pub fn new(system_message: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_message)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Content of the system preamble, or an empty string if it is missing.
    pub fn system_message(&self) -> &str {
        match self.messages.first() {
            Some(msg) if msg.role == ChatRole::System => &msg.content,
            _ => "",
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Replace the system preamble, inserting it if the log has none.
    pub fn set_system_message(&mut self, content: impl Into<String>) {
        let content = content.into();
        match self.messages.first_mut() {
            Some(first) if first.role == ChatRole::System => first.content = content,
            _ => self.messages.insert(0, ChatMessage::system(content)),
        }
    }

    /// Truncate to just the current system preamble.
    pub fn clear(&mut self) {
        let system = self.system_message().to_string();
        self.messages.clear();
        self.messages.push(ChatMessage::system(system));
    }

    /// Messages the user actually exchanged (everything but the preamble).
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != ChatRole::System)
    }
}

impl From<Vec<ChatMessage>> for Transcript {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}
