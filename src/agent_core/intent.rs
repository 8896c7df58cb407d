//! Intent parsing for chat input.
//!
//! Classification order: slash command, then the tool-request patterns in
//! table order, then plain conversation. Patterns are compiled once.

use std::sync::OnceLock;

use regex::Regex;

use super::types::{ParsedIntent, ToolAction};

// ─── Pattern Tables ─────────────────────────────────────────────────────────

/// Tool-request patterns, tested in order against the lower-cased input.
const TOOL_PATTERNS: &[(&str, ToolAction)] = &[
    (r"create.*pull.*request|make.*pr|new.*pr", ToolAction::CreatePr),
    (r"list.*tools|show.*tools|what.*tools", ToolAction::ListTools),
    (r"help|assistance", ToolAction::Help),
];

fn tool_patterns() -> &'static [(Regex, ToolAction)] {
    static PATTERNS: OnceLock<Vec<(Regex, ToolAction)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TOOL_PATTERNS
            .iter()
            .map(|(pattern, action)| (Regex::new(pattern).expect("static pattern"), *action))
            .collect()
    })
}

fn pr_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bpr\b").expect("static pattern"))
}

fn greeting_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(hello|hi|hey)\b").expect("static pattern"))
}

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Classify one line of user input. Never fails.
pub fn parse_input(input: &str) -> ParsedIntent {
    let text = input.trim();

    if let Some(rest) = text.strip_prefix('/') {
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        return ParsedIntent::Command {
            name: name.to_lowercase(),
            args: args.to_string(),
        };
    }

    let lowered = text.to_lowercase();
    for (pattern, action) in tool_patterns() {
        if pattern.is_match(&lowered) {
            return ParsedIntent::ToolRequest {
                action: *action,
                original_text: text.to_string(),
            };
        }
    }

    ParsedIntent::Conversation(text.to_string())
}

// ─── Conversation Topics ────────────────────────────────────────────────────

/// Which canned reply a conversational input gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationTopic {
    /// Mentions both "github" and "mcp".
    GithubMcp,
    /// Mentions "pull request" or the word "pr".
    PullRequest,
    /// Mentions "tools" or "what can you do".
    Capabilities,
    /// Contains hello, hi or hey as a word.
    Greeting,
    Other,
}

/// Pick the topic for conversational text; first matching rule wins.
pub fn conversation_topic(text: &str) -> ConversationTopic {
    let lowered = text.to_lowercase();

    if lowered.contains("github") && lowered.contains("mcp") {
        ConversationTopic::GithubMcp
    } else if lowered.contains("pull request") || pr_word().is_match(&lowered) {
        ConversationTopic::PullRequest
    } else if lowered.contains("tools") || lowered.contains("what can you do") {
        ConversationTopic::Capabilities
    } else if greeting_word().is_match(&lowered) {
        ConversationTopic::Greeting
    } else {
        ConversationTopic::Other
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
