//! Result normalizer — turns a raw `tools/call` envelope into a `CallResult`.
//!
//! Remote content items are arbitrary JSON objects. Whether an item "has
//! text" is decided here, once, and recorded in the `ContentItem` variant so
//! no caller ever inspects raw items again.
//!
//! Error payloads from the GitHub MCP server embed upstream HTTP status lines
//! in free text. The marker strings below are matched literally and
//! case-sensitively; unrecognized text passes through unchanged.

use serde::{Deserialize, Serialize};

use super::types::CallToolResponse;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Error text used when an error response carries no readable text at all.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Tool execution failed with unknown error";

/// Marker for an authentication failure.
pub const UNAUTHORIZED_MARKER: &str = "401: Unauthorized";

/// Marker for a missing repository (or one the token cannot see).
pub const NOT_FOUND_MARKER: &str = "404: Not Found";

/// Marker for a permission failure.
pub const FORBIDDEN_MARKER: &str = "403: Forbidden";

/// Placeholder for `owner`/`repo` when the call arguments lack them.
const UNKNOWN_ARGUMENT: &str = "unknown";

// ─── Types ───────────────────────────────────────────────────────────────────

/// One normalized content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// The remote item exposed readable text.
    Text { text: String },
    /// Anything else, kept as its string representation.
    Unknown { data: String },
}

impl ContentItem {
    /// Classify a raw remote content item.
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        match readable_text(raw) {
            Some(text) => ContentItem::Text {
                text: text.to_string(),
            },
            None => ContentItem::Unknown {
                data: raw.to_string(),
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            ContentItem::Unknown { .. } => None,
        }
    }
}

/// Canonical outcome of a tool call.
///
/// Fields are private so that `error` is present exactly when `success` is
/// false; build values through [`CallResult::succeeded`] and
/// [`CallResult::failed`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallResult {
    success: bool,
    content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structured: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CallResult {
    pub fn succeeded(content: Vec<ContentItem>, structured: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            content,
            structured,
            error: None,
        }
    }

    /// A failed call with no content.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Vec::new(),
            structured: None,
            error: Some(error.into()),
        }
    }

    fn with_structured(mut self, structured: Option<serde_json::Value>) -> Self {
        self.structured = structured;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    pub fn structured(&self) -> Option<&serde_json::Value> {
        self.structured.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// All text items joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Normalize a protocol-level `tools/call` response.
///
/// `arguments` are the arguments the call was made with; the 404 guidance
/// interpolates their `owner` and `repo`.
pub fn normalize_response(response: CallToolResponse, arguments: &serde_json::Value) -> CallResult {
    let CallToolResponse {
        is_error,
        content,
        structured_content,
    } = response;

    if is_error {
        let message = match content.iter().find_map(readable_text) {
            Some(raw) => classify_error(raw, arguments),
            None => UNKNOWN_ERROR_MESSAGE.to_string(),
        };
        return CallResult::failed(message).with_structured(structured_content);
    }

    let items = content.iter().map(ContentItem::from_raw).collect();
    CallResult::succeeded(items, structured_content)
}

/// Map raw remote error text to a human-readable message.
///
/// First matching marker wins; anything unrecognized is returned verbatim.
pub fn classify_error(raw: &str, arguments: &serde_json::Value) -> String {
    if raw.contains(UNAUTHORIZED_MARKER) {
        return "Authentication failed (401: Unauthorized).\n\
                Please check that:\n  \
                • your GitHub token is valid and has not expired\n  \
                • the token has the required permissions (repo, read:org)\n  \
                • the token has access to the target repository"
            .to_string();
    }

    if raw.contains(NOT_FOUND_MARKER) {
        let owner = string_argument(arguments, "owner");
        let repo = string_argument(arguments, "repo");
        return format!(
            "Repository '{owner}/{repo}' was not found (404: Not Found).\n\
             Please verify that:\n  \
             • the owner and repository names are spelled correctly\n  \
             • the repository exists\n  \
             • your token has access to it (private repositories need the repo scope)"
        );
    }

    if raw.contains(FORBIDDEN_MARKER) {
        return "Access forbidden (403: Forbidden): your GitHub token does not have \
                sufficient permissions for this operation."
            .to_string();
    }

    raw.to_string()
}

/// The item's text, if it exposes any.
fn readable_text(raw: &serde_json::Value) -> Option<&str> {
    raw.get("text").and_then(|t| t.as_str())
}

fn string_argument<'a>(arguments: &'a serde_json::Value, key: &str) -> &'a str {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ARGUMENT)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
