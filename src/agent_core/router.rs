//! ChatRouter — turns one line of chat input into one reply.
//!
//! The router owns the (optional) MCP session, the free-form context map set
//! by `/context`, and the chat history. Every input is recorded before it is
//! dispatched; every reply except [`Reply::Exit`] is recorded after. Dispatch
//! errors are rendered as text and never reach the caller.

use serde_json::{Map, Value};

use crate::mcp_client::{McpSession, PR_TOOL_NAME};

use super::conversation::{truncate_chars, ConversationHistory, DEFAULT_SUMMARY_ENTRIES};
use super::errors::AgentError;
use super::intent::{conversation_topic, parse_input, ConversationTopic};
use super::types::{ParsedIntent, Reply, ToolAction};

// ─── Canned Replies ─────────────────────────────────────────────────────────

const HELP_TEXT: &str = "\
GitHub MCP Chat Commands:
========================

/help                    - Show this help message
/tools                   - List available MCP tools
/history                 - Show recent chat history
/clear                   - Clear chat history
/context [json]          - Set/view conversation context
/quit or /exit           - Exit chat mode

Tool Requests:
- \"create a pull request\" - Guide you through PR creation
- \"list tools\"           - Show available tools
- \"help\"                 - General assistance

You can also have natural conversations about GitHub, coding, or ask questions!";

const NO_CONNECTION_TOOLS: &str = "Sorry, I can't list tools without a connection to the \
GitHub MCP server. Please check your GITHUB_TOKEN and connection.";

const CONTEXT_USAGE: &str = r#"Invalid JSON format for context. Use: /context {"key": "value"}"#;

const PR_GUIDANCE_DISCONNECTED: &str = "\
I'd love to help you create a pull request, but I need a connection to the GitHub MCP server.

Please:
1. Set your GITHUB_TOKEN environment variable (create one at https://github.com/settings/tokens)
2. Restart the chat mode
3. Then I can help you create PRs with GitHub Copilot!

For now, I can provide guidance on PR creation best practices if you'd like.";

const PR_GUIDANCE_CONNECTED: &str = "\
To create a pull request, I need some information:

Please provide:
1. Repository owner
2. Repository name
3. Pull request title
4. Problem statement (what you want to implement)
5. Base branch (optional)

You can provide this in natural language or use the format:
\"Create PR for owner/repo with title 'Your Title' to implement: Your problem statement\"";

const TOPIC_GITHUB_MCP: &str = "\
I'm a GitHub MCP (Model Context Protocol) client! I can help you:

• Connect to GitHub's MCP server
• Create pull requests with AI assistance
• List and use available GitHub tools
• Provide information about MCP and GitHub integration

What would you like to know or do?";

const TOPIC_PULL_REQUEST: &str = "\
I can help you create pull requests with GitHub Copilot assistance!

To create a PR, I need:
- Repository (owner/name)
- Title for the PR
- Problem statement describing what to implement

Would you like to start creating a pull request?";

const TOPIC_CAPABILITIES: &str = "\
I can access GitHub's MCP tools! Use '/tools' to see what's available.

Common things I can help with:
• Creating pull requests with AI
• Listing repository information
• GitHub API interactions
• Copilot-assisted coding

What specific task would you like help with?";

const TOPIC_GREETING: &str = "\
Hello! I'm your GitHub MCP assistant. I can help you:

• Create AI-assisted pull requests
• Access GitHub tools via MCP
• Answer questions about GitHub and development

What would you like to work on today?";

/// Characters of the user's text echoed by the fallback reply.
const ECHO_CHARS: usize = 100;

// ─── ChatRouter ─────────────────────────────────────────────────────────────

/// Routes chat input to commands, tool requests, or canned conversation.
pub struct ChatRouter {
    session: Option<McpSession>,
    context: Map<String, Value>,
    history: ConversationHistory,
}

impl ChatRouter {
    /// Create a router. `None` runs in disconnected mode.
    pub fn new(session: Option<McpSession>) -> Self {
        Self {
            session,
            context: Map::new(),
            history: ConversationHistory::new(),
        }
    }

    pub fn session(&self) -> Option<&McpSession> {
        self.session.as_ref()
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Summary of the last few history entries.
    pub fn history_summary(&self) -> String {
        self.history.summarize(DEFAULT_SUMMARY_ENTRIES)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Close the owned session, if any.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.close().await;
        }
    }

    fn connected_session(&mut self) -> Option<&mut McpSession> {
        self.session.as_mut().filter(|s| s.is_connected())
    }

    // ─── Processing ─────────────────────────────────────────────────────

    /// Process one line of input. Never fails.
    pub async fn process_input(&mut self, input: &str) -> Reply {
        self.history.add_user_message(input);

        let intent = parse_input(input);
        tracing::debug!(?intent, "parsed chat input");

        match self.dispatch(intent).await {
            Ok(Reply::Exit) => Reply::Exit,
            Ok(Reply::Message(text)) => {
                self.history.add_assistant_message(text.as_str());
                Reply::Message(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat dispatch failed");
                let text = format!("Error processing request: {e}");
                self.history.add_assistant_message(text.as_str());
                Reply::Message(text)
            }
        }
    }

    async fn dispatch(&mut self, intent: ParsedIntent) -> Result<Reply, AgentError> {
        match intent {
            ParsedIntent::Command { name, args } => self.handle_command(&name, &args).await,
            ParsedIntent::ToolRequest { action, .. } => Ok(self.handle_tool_request(action).await),
            ParsedIntent::Conversation(text) => Ok(Reply::Message(conversation_reply(&text))),
        }
    }

    // ─── Commands ───────────────────────────────────────────────────────

    async fn handle_command(&mut self, name: &str, args: &str) -> Result<Reply, AgentError> {
        let reply = match name {
            "help" => HELP_TEXT.to_string(),
            "tools" => self.list_tools_reply().await,
            "history" => self.history_summary(),
            "clear" => {
                self.history.clear();
                "Chat history cleared.".to_string()
            }
            "context" => self.handle_context(args)?,
            "quit" | "exit" => return Ok(Reply::Exit),
            other => format!("Unknown command: /{other}. Type /help for available commands."),
        };
        Ok(Reply::Message(reply))
    }

    /// `/context` with args merges a JSON object; without args shows the map.
    fn handle_context(&mut self, args: &str) -> Result<String, AgentError> {
        if args.is_empty() {
            let rendered = serde_json::to_string_pretty(&self.context)?;
            return Ok(format!("Current context: {rendered}"));
        }

        let parsed: Value = match serde_json::from_str(args) {
            Ok(value) => value,
            Err(_) => return Ok(CONTEXT_USAGE.to_string()),
        };

        let update = match parsed {
            Value::Object(update) => update,
            other => {
                return Err(AgentError::InvalidContext {
                    found: json_kind(&other).to_string(),
                })
            }
        };

        let keys: Vec<&String> = update.keys().collect();
        let reply = format!("Context updated: {keys:?}");
        self.context.extend(update);
        Ok(reply)
    }

    async fn list_tools_reply(&mut self) -> String {
        let Some(session) = self.connected_session() else {
            return NO_CONNECTION_TOOLS.to_string();
        };

        match session.list_tools().await {
            Ok(tools) => {
                let mut reply = format!("Available tools ({}):", tools.len());
                for tool in &tools {
                    reply.push_str(&format!("\n  • {}: {}", tool.name, tool.description));
                }
                reply
            }
            Err(e) => format!("Error listing tools: {e}"),
        }
    }

    // ─── Tool Requests ──────────────────────────────────────────────────

    async fn handle_tool_request(&mut self, action: ToolAction) -> Reply {
        let text = match action {
            ToolAction::CreatePr => self.pr_guidance(),
            ToolAction::ListTools => self.list_tools_reply().await,
            ToolAction::Help => HELP_TEXT.to_string(),
        };
        Reply::Message(text)
    }

    /// PR guidance from cached state only; never touches the network.
    fn pr_guidance(&mut self) -> String {
        let Some(session) = self.connected_session() else {
            return PR_GUIDANCE_DISCONNECTED.to_string();
        };

        let catalog = session.catalog();
        if !catalog.is_empty() && !catalog.contains(PR_TOOL_NAME) {
            return format!(
                "{PR_GUIDANCE_CONNECTED}\n\n\
                 Warning: the server did not list {PR_TOOL_NAME}; it may be unavailable \
                 for your account or this server."
            );
        }

        PR_GUIDANCE_CONNECTED.to_string()
    }
}

/// Canned reply for conversational input.
fn conversation_reply(text: &str) -> String {
    match conversation_topic(text) {
        ConversationTopic::GithubMcp => TOPIC_GITHUB_MCP.to_string(),
        ConversationTopic::PullRequest => TOPIC_PULL_REQUEST.to_string(),
        ConversationTopic::Capabilities => TOPIC_CAPABILITIES.to_string(),
        ConversationTopic::Greeting => TOPIC_GREETING.to_string(),
        ConversationTopic::Other => format!(
            "I'm here to help with GitHub and MCP-related tasks. You mentioned: \"{}\"\n\n\
             I can help you:\n\
             • Create pull requests (/tools to see available options)\n\
             • Access GitHub via MCP protocol\n\
             • Answer questions about development\n\n\
             Type /help for commands or ask me anything specific!",
            truncate_chars(text, ECHO_CHARS)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
