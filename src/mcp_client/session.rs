//! MCP Session — one logical connection to the GitHub MCP server.
//!
//! State machine: `Disconnected --connect()--> Connected --close()--> Disconnected`.
//! Every operation except `connect()` and `close()` fails with
//! [`McpError::NotConnected`] while disconnected. `connect()` on a connected
//! session fails with [`McpError::AlreadyConnected`] and leaves the live
//! connection untouched.

use std::time::Instant;

use serde_json::{json, Map, Value};

use crate::config::{ClientConfig, TOKEN_ENV_VAR};

use super::catalog::ToolCatalog;
use super::errors::McpError;
use super::normalize::{normalize_response, CallResult};
use super::transport::{extract_result, Connector, HttpConnector, McpTransport};
use super::types::{
    error_codes, CallToolResponse, InitializeResult, ListToolsResult, ServerInfo, Tool,
    PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// The remote tool this client exists for.
pub const PR_TOOL_NAME: &str = "create_pull_request_with_copilot";

/// Upper bound on `tools/list` pages followed in one listing.
const MAX_LIST_PAGES: usize = 50;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Arguments for the Copilot pull-request tool.
#[derive(Debug, Clone, Default)]
pub struct PullRequestRequest {
    pub owner: String,
    pub repo: String,
    pub problem_statement: String,
    pub title: String,
    /// Base branch; omitted from the call when `None` or empty.
    pub base_ref: Option<String>,
}

impl PullRequestRequest {
    /// Build the exact argument object the remote tool expects.
    pub fn to_arguments(&self) -> Value {
        let mut args = Map::new();
        args.insert("owner".into(), json!(self.owner));
        args.insert("repo".into(), json!(self.repo));
        args.insert("problem_statement".into(), json!(self.problem_statement));
        args.insert("title".into(), json!(self.title));
        if let Some(base_ref) = self.base_ref.as_deref().filter(|b| !b.is_empty()) {
            args.insert("base_ref".into(), json!(base_ref));
        }
        Value::Object(args)
    }
}

/// Live connection, exclusively owned by the session.
struct Connection {
    transport: Box<dyn McpTransport>,
    server_info: Option<ServerInfo>,
}

// ─── McpSession ──────────────────────────────────────────────────────────────

/// Session against a single MCP server, authenticated with a bearer token.
pub struct McpSession {
    credential: String,
    server_url: String,
    user_agent: String,
    connector: Box<dyn Connector>,
    connection: Option<Connection>,
    catalog: ToolCatalog,
}

impl McpSession {
    /// Create a session using the HTTP transport.
    ///
    /// The token is taken from `token`, then the config, then `GITHUB_TOKEN`.
    /// Fails immediately if none is available; no network access happens here.
    pub fn new(token: Option<String>, config: &ClientConfig) -> Result<Self, McpError> {
        let credential = resolve_credential(
            token,
            config.configured_token(),
            std::env::var(TOKEN_ENV_VAR).ok(),
        )?;
        let connector = HttpConnector::new(config.connect_timeout(), config.request_timeout());
        Self::with_connector(credential, config, Box::new(connector))
    }

    /// Create a session with an explicit credential and connector.
    pub fn with_connector(
        credential: String,
        config: &ClientConfig,
        connector: Box<dyn Connector>,
    ) -> Result<Self, McpError> {
        if credential.trim().is_empty() {
            return Err(McpError::MissingCredential {
                env_var: TOKEN_ENV_VAR.to_string(),
            });
        }

        Ok(Self {
            credential,
            server_url: config.server_url.clone(),
            user_agent: config.user_agent.clone(),
            connector,
            connection: None,
            catalog: ToolCatalog::new(),
        })
    }

    // ─── Status ──────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        if self.connection.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// What the server reported about itself during initialization.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.connection.as_ref().and_then(|c| c.server_info.as_ref())
    }

    /// The tool snapshot from the last successful listing (no network access).
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    fn transport(&self) -> Result<&dyn McpTransport, McpError> {
        self.connection
            .as_ref()
            .map(|c| c.transport.as_ref())
            .ok_or(McpError::NotConnected)
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.credential),
            ),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ]
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Open the transport and perform the MCP initialization handshake.
    ///
    /// On failure the session stays disconnected and the error is returned
    /// unchanged. No retries.
    pub async fn connect(&mut self) -> Result<(), McpError> {
        if self.connection.is_some() {
            return Err(McpError::AlreadyConnected);
        }

        tracing::info!(url = %self.server_url, "connecting to MCP server");

        let mut transport = self
            .connector
            .open(&self.server_url, &self.request_headers())
            .await
            .map_err(|e| {
                tracing::error!(url = %self.server_url, error = %e, "failed to open MCP transport");
                e
            })?;

        let init = match initialize(transport.as_ref()).await {
            Ok(init) => init,
            Err(e) => {
                tracing::error!(url = %self.server_url, error = %e, "MCP initialization failed");
                if let Err(close_err) = transport.close().await {
                    tracing::warn!(error = %close_err, "error closing transport after failed init");
                }
                return Err(e);
            }
        };

        tracing::info!(
            url = %self.server_url,
            server = %init.server_info.clone().unwrap_or_default(),
            protocol = init.protocol_version.as_deref().unwrap_or("unspecified"),
            "connected to MCP server"
        );

        if !init.supports_tools() {
            tracing::warn!(url = %self.server_url, "server did not advertise the tools capability");
        }

        self.connection = Some(Connection {
            transport,
            server_info: init.server_info,
        });
        Ok(())
    }

    /// Tear down the connection. Teardown errors are logged, never returned.
    ///
    /// Safe to call when never connected and safe to call repeatedly.
    pub async fn close(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        match connection.transport.close().await {
            Ok(()) => tracing::info!(url = %self.server_url, "closed MCP session"),
            Err(e) => tracing::error!(url = %self.server_url, error = %e, "error closing MCP session"),
        }
    }

    // ─── Tools ───────────────────────────────────────────────────────────

    /// List the server's tools and replace the catalog with the result.
    ///
    /// On failure the previous catalog is kept and the error is returned.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, McpError> {
        let tools = {
            let transport = self.transport()?;
            fetch_all_tools(transport).await.map_err(|e| {
                tracing::error!(error = %e, "failed to list tools");
                e
            })?
        };

        let count = self.catalog.replace(tools);
        tracing::info!(tools = count, "listed available tools");
        Ok(self.catalog.tools().to_vec())
    }

    /// Call a tool. Only a disconnected session produces `Err`; every remote
    /// outcome, including transport failure, comes back as a [`CallResult`].
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallResult, McpError> {
        let transport = self.transport()?;
        let start = Instant::now();

        tracing::info!(tool = name, "calling tool");
        tracing::debug!(tool = name, arguments = %arguments, "tool arguments");

        let params = json!({
            "name": name,
            "arguments": arguments,
        });

        let outcome = match transport.request("tools/call", Some(params)).await {
            Ok(response) => extract_result(response),
            Err(e) => Err(e),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(raw) => match serde_json::from_value::<CallToolResponse>(raw) {
                Ok(response) => normalize_response(response, &arguments),
                Err(e) => CallResult::failed(format!("invalid tools/call response: {e}")),
            },
            Err(e) => {
                tracing::error!(tool = name, error = %e, elapsed_ms, "tool call failed");
                return Ok(CallResult::failed(call_failure_message(name, &e)));
            }
        };

        if result.is_success() {
            tracing::info!(tool = name, elapsed_ms, "tool call succeeded");
        } else {
            tracing::warn!(
                tool = name,
                elapsed_ms,
                error = result.error().unwrap_or_default(),
                "tool reported an error"
            );
        }

        Ok(result)
    }

    /// Ask the Copilot coding agent to open a pull request.
    pub async fn create_pull_request_with_assist(
        &mut self,
        request: &PullRequestRequest,
    ) -> Result<CallResult, McpError> {
        self.call_tool(PR_TOOL_NAME, request.to_arguments()).await
    }
}

// ─── Protocol helpers ────────────────────────────────────────────────────────

/// Resolve the credential: explicit, then configured, then environment.
pub fn resolve_credential(
    explicit: Option<String>,
    configured: Option<&str>,
    env: Option<String>,
) -> Result<String, McpError> {
    explicit
        .filter(|t| !t.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .or_else(|| env.filter(|t| !t.trim().is_empty()))
        .ok_or_else(|| McpError::MissingCredential {
            env_var: TOKEN_ENV_VAR.to_string(),
        })
}

/// Error text for a `tools/call` that never produced a tool result.
fn call_failure_message(name: &str, error: &McpError) -> String {
    match error {
        McpError::ServerError { code, message, .. } if *code == error_codes::INVALID_PARAMS => {
            format!("Invalid arguments for tool '{name}': {message}")
        }
        McpError::ServerError { code, message, .. } if *code == error_codes::METHOD_NOT_FOUND => {
            format!("The server does not support tool calls: {message}")
        }
        other => other.to_string(),
    }
}

/// Perform the MCP initialization handshake.
async fn initialize(transport: &dyn McpTransport) -> Result<InitializeResult, McpError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    });

    let response = transport.request("initialize", Some(params)).await?;
    let result = extract_result(response)?;

    let init: InitializeResult =
        serde_json::from_value(result).map_err(|e| McpError::InitFailed {
            reason: format!("failed to parse initialize response: {e}"),
        })?;

    transport.notify("notifications/initialized", None).await?;
    Ok(init)
}

/// Fetch every page of `tools/list`.
async fn fetch_all_tools(transport: &dyn McpTransport) -> Result<Vec<Tool>, McpError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_LIST_PAGES {
        let params = cursor.take().map(|c| json!({ "cursor": c }));
        let response = transport.request("tools/list", params).await?;
        let result = extract_result(response)?;

        let page: ListToolsResult =
            serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
                method: "tools/list".into(),
                reason: e.to_string(),
            })?;

        tools.extend(page.tools.into_iter().map(Tool::from));

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => return Ok(tools),
        }
    }

    tracing::warn!(pages = MAX_LIST_PAGES, "stopped following tools/list pagination");
    Ok(tools)
}

// ─── Test support ────────────────────────────────────────────────────────────

/// In-memory transport doubles shared by the session and router tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::super::errors::McpError;
    use super::super::transport::{Connector, McpTransport};
    use super::super::types::{JsonRpcError, JsonRpcResponse};

    /// One scripted reply to a request.
    pub enum Scripted {
        Result(Value),
        RpcError(i32, &'static str),
        Fail(&'static str),
    }

    /// Everything the fake observed, shared with the test.
    #[derive(Default)]
    pub struct Log {
        pub opened: usize,
        pub headers: Vec<(String, String)>,
        pub requests: Vec<(String, Option<Value>)>,
        pub notifications: Vec<String>,
        pub closed: usize,
    }

    #[derive(Clone, Default)]
    pub struct FakeServer {
        pub log: Arc<Mutex<Log>>,
        replies: Arc<Mutex<VecDeque<Scripted>>>,
        fail_open: Arc<Mutex<bool>>,
        fail_close: Arc<Mutex<bool>>,
    }

    impl FakeServer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, reply: Scripted) -> &Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        /// Queue a successful initialize reply.
        pub fn push_initialize(&self) -> &Self {
            self.push(Scripted::Result(json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "github-mcp-server", "version": "test"}
            })))
        }

        pub fn fail_open(&self) {
            *self.fail_open.lock().unwrap() = true;
        }

        pub fn fail_close(&self) {
            *self.fail_close.lock().unwrap() = true;
        }

        pub fn request_count(&self) -> usize {
            self.log.lock().unwrap().requests.len()
        }

        pub fn connector(&self) -> Box<dyn Connector> {
            Box::new(self.clone())
        }
    }

    struct FakeTransport {
        server: FakeServer,
    }

    #[async_trait]
    impl Connector for FakeServer {
        async fn open(
            &self,
            endpoint: &str,
            headers: &[(String, String)],
        ) -> Result<Box<dyn McpTransport>, McpError> {
            if *self.fail_open.lock().unwrap() {
                return Err(McpError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".into(),
                });
            }
            let mut log = self.log.lock().unwrap();
            log.opened += 1;
            log.headers = headers.to_vec();
            Ok(Box::new(FakeTransport {
                server: self.clone(),
            }))
        }
    }

    #[async_trait]
    impl McpTransport for FakeTransport {
        async fn request(
            &self,
            method: &str,
            params: Option<Value>,
        ) -> Result<JsonRpcResponse, McpError> {
            self.server
                .log
                .lock()
                .unwrap()
                .requests
                .push((method.to_string(), params));

            let reply = self.server.replies.lock().unwrap().pop_front();
            match reply {
                Some(Scripted::Result(result)) => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: 1,
                    result: Some(result),
                    error: None,
                }),
                Some(Scripted::RpcError(code, message)) => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: 1,
                    result: None,
                    error: Some(JsonRpcError {
                        code,
                        message: message.to_string(),
                        data: None,
                    }),
                }),
                Some(Scripted::Fail(reason)) => Err(McpError::TransportError {
                    reason: reason.to_string(),
                }),
                None => Err(McpError::TransportError {
                    reason: format!("no scripted reply for {method}"),
                }),
            }
        }

        async fn notify(&self, method: &str, _params: Option<Value>) -> Result<(), McpError> {
            self.server
                .log
                .lock()
                .unwrap()
                .notifications
                .push(method.to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), McpError> {
            self.server.log.lock().unwrap().closed += 1;
            if *self.server.fail_close.lock().unwrap() {
                return Err(McpError::TransportError {
                    reason: "socket already gone".into(),
                });
            }
            Ok(())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::{FakeServer, Scripted};
    use super::*;

    fn session(server: &FakeServer) -> McpSession {
        McpSession::with_connector("ghp_test".into(), &ClientConfig::default(), server.connector())
            .unwrap()
    }

    async fn connected(server: &FakeServer) -> McpSession {
        server.push_initialize();
        let mut s = session(server);
        s.connect().await.unwrap();
        s
    }

    fn tools_page(names: &[&str]) -> Scripted {
        let tools: Vec<Value> = names
            .iter()
            .map(|n| json!({"name": n, "description": format!("{n} tool"), "inputSchema": {"type": "object"}}))
            .collect();
        Scripted::Result(json!({ "tools": tools }))
    }

    #[test]
    fn test_construction_without_credential_fails() {
        let server = FakeServer::new();
        let result = McpSession::with_connector(
            "  ".into(),
            &ClientConfig::default(),
            server.connector(),
        );
        assert!(matches!(result, Err(McpError::MissingCredential { .. })));
        assert_eq!(server.log.lock().unwrap().opened, 0);
    }

    #[test]
    fn test_resolve_credential_order() {
        assert_eq!(
            resolve_credential(Some("a".into()), Some("b"), Some("c".into())).unwrap(),
            "a"
        );
        assert_eq!(resolve_credential(None, Some("b"), Some("c".into())).unwrap(), "b");
        assert_eq!(resolve_credential(Some("".into()), None, Some("c".into())).unwrap(), "c");
        assert!(matches!(
            resolve_credential(None, None, None),
            Err(McpError::MissingCredential { .. })
        ));
        assert!(resolve_credential(None, None, Some(" ".into())).is_err());
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let server = FakeServer::new();
        let s = session(&server);
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(s.server_info().is_none());
        assert!(s.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_guarded_operations_fail_when_disconnected() {
        let server = FakeServer::new();
        let mut s = session(&server);

        assert!(matches!(s.list_tools().await, Err(McpError::NotConnected)));
        assert!(matches!(
            s.call_tool("get_me", json!({})).await,
            Err(McpError::NotConnected)
        ));
        assert_eq!(server.request_count(), 0);
        assert_eq!(server.log.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_connect_sends_auth_headers_and_handshake() {
        let server = FakeServer::new();
        let s = connected(&server).await;

        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(s.server_info().unwrap().name.as_deref(), Some("github-mcp-server"));

        let log = server.log.lock().unwrap();
        assert!(log
            .headers
            .contains(&("Authorization".to_string(), "Bearer ghp_test".to_string())));
        assert!(log
            .headers
            .contains(&("User-Agent".to_string(), "GitHub-MCP-Client/1.0".to_string())));
        assert_eq!(log.requests[0].0, "initialize");
        assert_eq!(log.notifications, vec!["notifications/initialized"]);
    }

    #[tokio::test]
    async fn test_connect_open_failure_stays_disconnected() {
        let server = FakeServer::new();
        server.fail_open();
        let mut s = session(&server);

        let err = s.connect().await.unwrap_err();
        assert!(matches!(err, McpError::ConnectFailed { .. }));
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_init_failure_closes_transport() {
        let server = FakeServer::new();
        server.push(Scripted::Fail("handshake reset"));
        let mut s = session(&server);

        let err = s.connect().await.unwrap_err();
        assert!(err.to_string().contains("handshake reset"));
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(server.log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        let err = s.connect().await.unwrap_err();
        assert!(matches!(err, McpError::AlreadyConnected));
        assert!(s.is_connected());
        assert_eq!(server.log.lock().unwrap().opened, 1);
    }

    #[tokio::test]
    async fn test_list_tools_replaces_catalog() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(tools_page(&["a", "b"]));
        let tools = s.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].description, "a tool");

        server.push(tools_page(&["c"]));
        s.list_tools().await.unwrap();
        assert_eq!(s.catalog().names(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::Result(json!({"tools": [{"name": "a"}], "nextCursor": "p2"})));
        server.push(tools_page(&["b"]));
        let tools = s.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);

        let log = server.log.lock().unwrap();
        let last = log.requests.last().unwrap();
        assert_eq!(last.1.as_ref().unwrap()["cursor"], "p2");
    }

    #[tokio::test]
    async fn test_list_tools_failure_keeps_previous_catalog() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(tools_page(&["keep_me"]));
        s.list_tools().await.unwrap();

        server.push(Scripted::Fail("connection reset"));
        let err = s.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::TransportError { .. }));
        assert!(s.catalog().contains("keep_me"));
    }

    #[tokio::test]
    async fn test_list_tools_rpc_error_propagates() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::RpcError(-32601, "Method not found"));
        let err = s.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::ServerError { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_call_tool_transport_failure_becomes_result() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::Fail("broken pipe"));
        let result = s.call_tool("get_me", json!({})).await.unwrap();
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("broken pipe"));
        assert!(result.content().is_empty());
    }

    #[tokio::test]
    async fn test_call_tool_invalid_params_names_the_tool() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::RpcError(-32602, "missing required field: repo"));
        let result = s.call_tool(PR_TOOL_NAME, json!({"owner": "acme"})).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.error(),
            Some("Invalid arguments for tool 'create_pull_request_with_copilot': missing required field: repo")
        );
    }

    #[tokio::test]
    async fn test_call_tool_other_rpc_error_passes_through() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::RpcError(-32603, "boom"));
        let result = s.call_tool("get_me", json!({})).await.unwrap();
        assert_eq!(result.error(), Some("server error [-32603]: boom"));
    }

    #[tokio::test]
    async fn test_call_tool_business_error_is_classified() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::Result(json!({
            "isError": true,
            "content": [{"type": "text", "text": "GET https://api.github.com/repos/acme/widgets: 404: Not Found"}]
        })));
        let result = s
            .call_tool(PR_TOOL_NAME, json!({"owner": "acme", "repo": "widgets"}))
            .await
            .unwrap();
        let error = result.error().unwrap();
        assert!(error.contains("acme/widgets"));
    }

    #[tokio::test]
    async fn test_call_tool_success_sends_name_and_arguments() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::Result(json!({
            "content": [{"type": "text", "text": "done"}],
            "structuredContent": {"url": "https://github.com/acme/widgets/pull/1"}
        })));
        let result = s.call_tool("get_me", json!({"x": 1})).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.text(), "done");
        assert!(result.structured().is_some());

        let log = server.log.lock().unwrap();
        let (method, params) = log.requests.last().unwrap();
        assert_eq!(method, "tools/call");
        assert_eq!(params.as_ref().unwrap()["name"], "get_me");
        assert_eq!(params.as_ref().unwrap()["arguments"]["x"], 1);
    }

    #[tokio::test]
    async fn test_create_pull_request_omits_missing_base_ref() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        server.push(Scripted::Result(json!({"content": []})));
        let request = PullRequestRequest {
            owner: "acme".into(),
            repo: "widgets".into(),
            problem_statement: "Add a /time endpoint".into(),
            title: "feat: time endpoint".into(),
            base_ref: None,
        };
        s.create_pull_request_with_assist(&request).await.unwrap();

        let log = server.log.lock().unwrap();
        let params = log.requests.last().unwrap().1.as_ref().unwrap();
        assert_eq!(params["name"], PR_TOOL_NAME);
        let args = params["arguments"].as_object().unwrap();
        assert_eq!(args.len(), 4);
        assert!(!args.contains_key("base_ref"));
    }

    #[test]
    fn test_pull_request_arguments_with_base_ref() {
        let request = PullRequestRequest {
            owner: "o".into(),
            repo: "r".into(),
            problem_statement: "p".into(),
            title: "t".into(),
            base_ref: Some("main".into()),
        };
        assert_eq!(request.to_arguments()["base_ref"], "main");

        let empty = PullRequestRequest {
            base_ref: Some(String::new()),
            ..request
        };
        assert!(empty.to_arguments().get("base_ref").is_none());
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;

        s.close().await;
        assert_eq!(s.state(), SessionState::Disconnected);
        s.close().await;
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(server.log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_close_without_connect() {
        let server = FakeServer::new();
        let mut s = session(&server);
        s.close().await;
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_swallows_teardown_error() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;
        server.fail_close();

        s.close().await;
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_use_after_close_is_not_connected() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;
        s.close().await;

        let requests_before = server.request_count();
        assert!(matches!(s.list_tools().await, Err(McpError::NotConnected)));
        assert!(matches!(
            s.call_tool("get_me", json!({})).await,
            Err(McpError::NotConnected)
        ));
        assert_eq!(server.request_count(), requests_before);
    }

    #[tokio::test]
    async fn test_reconnect_after_close() {
        let server = FakeServer::new();
        let mut s = connected(&server).await;
        s.close().await;

        server.push_initialize();
        s.connect().await.unwrap();
        assert!(s.is_connected());
        assert_eq!(server.log.lock().unwrap().opened, 2);
    }
}
