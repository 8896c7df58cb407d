//! Shared types for the agent core.
//!
//! History entries, parsed intents, and the router's reply type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Conversation Entries ───────────────────────────────────────────────────

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    /// Full text; only truncated when summarized.
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// ─── Intents ────────────────────────────────────────────────────────────────

/// Action a natural-language tool request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    CreatePr,
    ListTools,
    Help,
}

/// Classification of one line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedIntent {
    /// `/name args`; `name` is lower-cased, `args` trimmed (possibly empty).
    Command { name: String, args: String },
    /// Free text that matched a tool pattern.
    ToolRequest {
        action: ToolAction,
        original_text: String,
    },
    /// Anything else.
    Conversation(String),
}

// ─── Replies ────────────────────────────────────────────────────────────────

/// What the router hands back for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    /// The user asked to leave chat mode.
    Exit,
}

