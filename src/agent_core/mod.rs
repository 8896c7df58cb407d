//! Agent Core — the chat layer on top of the MCP session.
//!
//! Submodules:
//! - `conversation`: Bounded chat history and summaries
//! - `intent`: Classifies input as command, tool request, or conversation
//! - `router`: Dispatches parsed input and produces replies
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod errors;
pub mod intent;
pub mod router;
pub mod types;

// Re-exports for convenience
pub use conversation::ConversationHistory;
pub use errors::AgentError;
pub use intent::parse_input;
pub use router::ChatRouter;
pub use types::{ConversationEntry, ParsedIntent, Reply, Role, ToolAction};
