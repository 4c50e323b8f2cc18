//! Conversation history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Filenames the assistant drew on (empty for user turns and refusals)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cited_documents: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            cited_documents: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, cited_documents: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            cited_documents,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered sequence of turns, kept for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a completed exchange
    pub fn record(&mut self, user: Turn, assistant: Turn) {
        self.turns.push(user);
        self.turns.push(assistant);
    }

    /// The most recent whole exchanges fitting in `max_turns` turns, oldest first
    ///
    /// Always starts on a user turn.
    pub fn recent(&self, max_turns: usize) -> &[Turn] {
        let keep = max_turns - max_turns % 2;
        let start = self.turns.len().saturating_sub(keep);
        &self.turns[start..]
    }
}
