//! ConversationHistory — bounded, in-memory chat history.
//!
//! Keeps the most recent entries in insertion order and renders a short
//! plain-text summary for `/history`.

use std::collections::VecDeque;

use chrono::Utc;

use super::types::{ConversationEntry, Role};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Maximum entries retained; older ones are evicted from the front.
pub const MAX_HISTORY_ENTRIES: usize = 20;

/// Entries shown by a default summary.
pub const DEFAULT_SUMMARY_ENTRIES: usize = 5;

/// Characters of each entry shown in a summary.
const SUMMARY_CONTENT_CHARS: usize = 100;

// ─── ConversationHistory ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: VecDeque<ConversationEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push_back(ConversationEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while self.entries.len() > MAX_HISTORY_ENTRIES {
            self.entries.pop_front();
        }
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.append(Role::User, content);
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.append(Role::Assistant, content);
    }

    /// Summarize the last `n` entries, one `role: content` line each.
    pub fn summarize(&self, n: usize) -> String {
        if self.entries.is_empty() {
            return "No previous conversation.".to_string();
        }

        let skip = self.entries.len().saturating_sub(n);
        let mut summary = String::from("Recent conversation:\n");
        for entry in self.entries.iter().skip(skip) {
            summary.push_str(&format!(
                "{}: {}\n",
                entry.role,
                truncate_chars(&entry.content, SUMMARY_CONTENT_CHARS)
            ));
        }
        summary
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.back()
    }
}

/// First `max` characters of `text`, with `...` appended when cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
