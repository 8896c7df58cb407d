//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP session operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// No credential was supplied explicitly, via config, or via the environment.
    #[error("GitHub token is required. Set {env_var} environment variable or pass a token explicitly.")]
    MissingCredential { env_var: String },

    /// A guarded operation was attempted while the session is disconnected.
    #[error("not connected to the MCP server; call connect() first")]
    NotConnected,

    /// `connect()` was called on a session that already holds a connection.
    #[error("already connected to the MCP server; call close() before reconnecting")]
    AlreadyConnected,

    /// The transport could not be constructed (bad header, client build failure).
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// The initialization handshake returned something unusable.
    #[error("MCP initialization failed: {reason}")]
    InitFailed { reason: String },

    /// I/O or framing error on the underlying channel.
    #[error("transport error: {reason}")]
    TransportError { reason: String },

    /// Non-2xx HTTP response from the MCP endpoint.
    #[error("HTTP {status}: {reason}: {body}")]
    Http {
        status: u16,
        reason: String,
        body: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A JSON-RPC result did not have the shape the method promises.
    #[error("invalid {method} response: {reason}")]
    InvalidResponse { method: String, reason: String },

    /// Configuration error (unreadable or malformed config file).
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message_carries_status_marker() {
        let err = McpError::Http {
            status: 401,
            reason: "Unauthorized".into(),
            body: "bad credentials".into(),
        };
        assert!(err.to_string().contains("401: Unauthorized"));
    }

    #[test]
    fn test_missing_credential_names_env_var() {
        let err = McpError::MissingCredential {
            env_var: "GITHUB_TOKEN".into(),
        };
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }
}
