//! JSON-RPC transport over MCP streamable HTTP.
//!
//! The session talks to the server through two seams:
//! - [`Connector`] opens a channel given the endpoint and request headers
//! - [`McpTransport`] sends requests and notifications over that channel
//!
//! [`HttpConnector`] / [`HttpTransport`] are the production implementations:
//! - every JSON-RPC message is POSTed to the endpoint
//! - the reply is either `application/json` or a `text/event-stream` whose
//!   `data:` events are scanned for the response with the matching id
//! - the `Mcp-Session-Id` header is captured and echoed on later requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use tokio::sync::Mutex;

use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Streamable HTTP clients must accept both reply forms.
const ACCEPT_STREAMABLE: &str = "application/json, text/event-stream";

/// Error bodies are cut to this many bytes before they land in an error.
const MAX_ERROR_BODY: usize = 2000;

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Seams ───────────────────────────────────────────────────────────────────

/// An open request/response channel to an MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the matching response.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError>;

    /// Release the channel. Called at most once per transport.
    async fn close(&mut self) -> Result<(), McpError>;
}

/// Opens transports. Held by the session so `connect()` can be retried.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Box<dyn McpTransport>, McpError>;
}

// ─── HttpConnector ───────────────────────────────────────────────────────────

/// Builds [`HttpTransport`]s with fixed timeouts.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(120))
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Box<dyn McpTransport>, McpError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| McpError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: format!("invalid header name '{name}': {e}"),
                })?;
            // The value may be a credential, so it never goes into the message.
            let mut header_value =
                HeaderValue::from_str(value).map_err(|_| McpError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: format!("invalid value for header '{name}'"),
                })?;
            if header_name == AUTHORIZATION {
                header_value.set_sensitive(true);
            }
            default_headers.insert(header_name, header_value);
        }

        let http = HttpClient::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| McpError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Box::new(HttpTransport::new(endpoint, http)))
    }
}

// ─── HttpTransport ───────────────────────────────────────────────────────────

/// JSON-RPC over MCP streamable HTTP.
pub struct HttpTransport {
    endpoint: String,
    http: HttpClient,
    session_id: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(endpoint: &str, http: HttpClient) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            http,
            session_id: Mutex::new(None),
        }
    }

    /// The server-assigned session id, once one has been seen.
    async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    /// POST one serialized message, capture the session id, reject non-2xx.
    async fn post(&self, body: String) -> Result<reqwest::Response, McpError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, ACCEPT_STREAMABLE)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(id) = self.session_id().await {
            request = request.header(SESSION_ID_HEADER, id);
        }

        let response = request.send().await.map_err(|e| McpError::TransportError {
            reason: format!("request to {} failed: {e}", self.endpoint),
        })?;

        let assigned = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(id) = assigned {
            let mut current = self.session_id.lock().await;
            if current.as_deref() != Some(id.as_str()) {
                tracing::debug!(session_id = %id, "MCP session id assigned");
                *current = Some(id);
            }
        }

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                body = truncate_on_char_boundary(&body, MAX_ERROR_BODY).to_string();
                body.push_str("...(truncated)");
            }
            return Err(McpError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = next_request_id();
        let req = JsonRpcRequest::new(id, method, params);

        let json = serde_json::to_string(&req).map_err(|e| McpError::TransportError {
            reason: format!("failed to serialize request: {e}"),
        })?;

        let response = self.post(json).await?;

        if is_event_stream(response.headers()) {
            return read_event_stream(response, id).await;
        }

        let text = response.text().await.map_err(|e| McpError::TransportError {
            reason: format!("failed to read response body: {e}"),
        })?;
        let parsed: JsonRpcResponse =
            serde_json::from_str(&text).map_err(|e| McpError::TransportError {
                reason: format!("failed to parse JSON-RPC response: {e}"),
            })?;

        if parsed.id != id {
            return Err(McpError::TransportError {
                reason: format!("response id {} does not match request id {id}", parsed.id),
            });
        }

        Ok(parsed)
    }

    async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notification).map_err(|e| McpError::TransportError {
            reason: format!("failed to serialize notification: {e}"),
        })?;

        // 202 Accepted with an empty body is the expected reply.
        self.post(json).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), McpError> {
        let Some(id) = self.session_id.lock().await.take() else {
            return Ok(());
        };

        let response = self
            .http
            .delete(&self.endpoint)
            .header(SESSION_ID_HEADER, id)
            .send()
            .await
            .map_err(|e| McpError::TransportError {
                reason: format!("failed to terminate session: {e}"),
            })?;

        // Servers that do not support explicit termination answer 405.
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::METHOD_NOT_ALLOWED {
            return Err(McpError::TransportError {
                reason: format!("session termination returned HTTP {}", status.as_u16()),
            });
        }

        Ok(())
    }
}

// ─── Event stream ────────────────────────────────────────────────────────────

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("text/event-stream"))
        .unwrap_or(false)
}

/// Read SSE events until one carries the response for `id`.
///
/// Server-initiated requests and notifications on the same stream are skipped.
async fn read_event_stream(
    response: reqwest::Response,
    id: u64,
) -> Result<JsonRpcResponse, McpError> {
    let mut byte_stream = response.bytes_stream();
    let mut events = EventBuffer::default();

    loop {
        while let Some(event) = events.next_event() {
            if let Some(resp) = match_event(&event?, id) {
                return Ok(resp);
            }
        }

        match byte_stream.next().await {
            Some(Ok(bytes)) => events.push(&bytes),
            Some(Err(e)) => {
                return Err(McpError::TransportError {
                    reason: format!("event stream read error: {e}"),
                });
            }
            None => {
                // Stream ended; the last event may lack its blank-line terminator
                if let Some(resp) = match_event(events.finish()?.trim(), id) {
                    return Ok(resp);
                }
                return Err(McpError::TransportError {
                    reason: "event stream closed before the response arrived".into(),
                });
            }
        }
    }
}

/// Raw SSE bytes, split into events only at `\n\n` boundaries.
///
/// Chunks may end mid-character, so bytes are decoded one complete event at
/// a time.
#[derive(Debug, Default)]
struct EventBuffer {
    pending: Vec<u8>,
}

impl EventBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        if self.pending.contains(&b'\r') {
            self.pending = normalize_crlf(&self.pending);
        }
    }

    /// The next complete event, if one has fully arrived.
    fn next_event(&mut self) -> Option<Result<String, McpError>> {
        let end = self.pending.windows(2).position(|w| w == b"\n\n")?;
        let mut raw: Vec<u8> = self.pending.drain(..end + 2).collect();
        raw.truncate(end);
        Some(decode_event(raw))
    }

    /// Whatever is left once the stream has ended.
    fn finish(self) -> Result<String, McpError> {
        decode_event(self.pending)
    }
}

/// Collapse `\r\n` to `\n`. A trailing lone `\r` is kept for the next chunk.
fn normalize_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

fn decode_event(raw: Vec<u8>) -> Result<String, McpError> {
    String::from_utf8(raw).map_err(|e| McpError::TransportError {
        reason: format!("event stream is not valid UTF-8: {e}"),
    })
}

/// Concatenated `data:` payload of one SSE event (`None` for keep-alives).
fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn match_event(event: &str, id: u64) -> Option<JsonRpcResponse> {
    let data = event_data(event)?;
    match serde_json::from_str::<JsonRpcResponse>(&data) {
        Ok(resp) if resp.id == id => Some(resp),
        Ok(resp) => {
            tracing::debug!(expected = id, got = resp.id, "skipping response for another request");
            None
        }
        Err(_) => {
            tracing::debug!("skipping non-response event on MCP stream");
            None
        }
    }
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: super::types::error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
