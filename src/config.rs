//! Client configuration loading.
//!
//! Reads an optional `ghmcp.yaml` and resolves environment variables. Every
//! field has a default, so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::mcp_client::McpError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// GitHub's hosted MCP endpoint.
pub const DEFAULT_SERVER_URL: &str = "https://api.githubcopilot.com/mcp/";

/// Client identity sent with every request.
pub const DEFAULT_USER_AGENT: &str = "GitHub-MCP-Client/1.0";

/// Environment variable holding the GitHub token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GHMCP_CONFIG";

/// Config file name searched for upward from the working directory.
pub const CONFIG_FILE_NAME: &str = "ghmcp.yaml";

// ─── ClientConfig ────────────────────────────────────────────────────────────

/// Runtime configuration for the MCP session and its transport.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Optional token; usually `${GITHUB_TOKEN}` or left out entirely.
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 120,
            token: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("user_agent", &self.user_agent)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured token, if it is non-empty after interpolation.
    pub fn configured_token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate a config file.
///
/// Checks `GHMCP_CONFIG` first, then walks upward from `start` looking for
/// `ghmcp.yaml`. Returns `None` when neither exists.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    // 1. Check env var
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points at a missing file");
    }

    // 2. Walk upward from `start`
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load and parse a config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_client_config(path: &Path) -> Result<ClientConfig, McpError> {
    let raw = std::fs::read_to_string(path).map_err(|e| McpError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    parse_client_config(&raw)
}

/// Parse config YAML (after interpolation). An empty document yields defaults.
pub fn parse_client_config(raw: &str) -> Result<ClientConfig, McpError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(ClientConfig::default());
    }

    serde_yaml::from_str(&interpolated).map_err(|e| McpError::ConfigError {
        reason: format!("failed to parse config: {e}"),
    })
}

/// Load the explicit file if given, else the discovered one, else defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ClientConfig, McpError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().unwrap_or_default();
            find_config_path(&cwd)
        }
    };

    match path {
        Some(path) => {
            let config = load_client_config(&path)?;
            tracing::info!(path = %path.display(), server_url = %config.server_url, "loaded client config");
            Ok(config)
        }
        None => Ok(ClientConfig::default()),
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
///
/// A `${` with no closing `}` is kept as literal text.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_expr.push(c);
            }
            if closed {
                result.push_str(&resolve_var_expr(&var_expr));
            } else {
                result.push_str("${");
                result.push_str(&var_expr);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
