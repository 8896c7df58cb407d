//! MCP Client — a single authenticated session against the GitHub MCP server.
//!
//! This module handles:
//! - JSON-RPC 2.0 over MCP streamable HTTP (JSON or SSE replies)
//! - The connect / initialize / close lifecycle
//! - Tool discovery into a replaceable catalog
//! - Tool calls and normalization of their results
//!
//! The session is used by the chat router in `agent_core` and by the CLI.

pub mod catalog;
pub mod errors;
pub mod normalize;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use catalog::ToolCatalog;
pub use errors::McpError;
pub use normalize::{CallResult, ContentItem};
pub use session::{McpSession, PullRequestRequest, SessionState, PR_TOOL_NAME};
pub use transport::{Connector, HttpConnector, McpTransport};
pub use types::{ServerInfo, Tool};
