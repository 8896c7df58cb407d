use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use ghmcp_client::agent_core::{ChatRouter, Reply};
use ghmcp_client::config::{self, ClientConfig};
use ghmcp_client::mcp_client::{
    CallResult, McpSession, PullRequestRequest, ToolCatalog, PR_TOOL_NAME,
};

/// ghmcp — talk to GitHub's MCP server and open Copilot-assisted pull requests.
#[derive(Parser, Debug)]
#[command(name = "ghmcp", version, about)]
struct Cli {
    /// Config file path override (default: $GHMCP_CONFIG or ./ghmcp.yaml upward).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GitHub token (default: config `token`, then $GITHUB_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Write log lines as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// List the server's tools
    Tools,
    /// Ask Copilot to open a pull request
    CreatePr {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        title: String,
        /// What the pull request should implement
        #[arg(long)]
        problem: String,
        #[arg(long)]
        base_ref: Option<String>,
    },
    /// Call any tool with JSON arguments
    Call {
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = ghmcp_client::init_tracing(cli.log_json) {
        eprintln!("warning: file logging disabled: {e}");
    }

    let config = config::load_or_default(cli.config.as_deref()).context("loading config")?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(cli.token, &config).await,
        Command::Tools => run_tools(cli.token, &config).await,
        Command::CreatePr {
            owner,
            repo,
            title,
            problem,
            base_ref,
        } => {
            let request = PullRequestRequest {
                owner,
                repo,
                problem_statement: problem,
                title,
                base_ref,
            };
            let mut session = connect(cli.token, &config).await?;
            let result = session.create_pull_request_with_assist(&request).await;
            session.close().await;
            report(result?)
        }
        Command::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("tool arguments must be JSON")?;
            let mut session = connect(cli.token, &config).await?;
            let result = session.call_tool(&tool, arguments).await;
            session.close().await;
            report(result?)
        }
    }
}

async fn connect(token: Option<String>, config: &ClientConfig) -> Result<McpSession> {
    let mut session = McpSession::new(token, config)?;
    session
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.server_url))?;
    Ok(session)
}

/// Print a call result as JSON; a failed call exits non-zero.
fn report(result: CallResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.error() {
        Some(error) => anyhow::bail!("tool call failed: {error}"),
        None => Ok(()),
    }
}

async fn run_tools(token: Option<String>, config: &ClientConfig) -> Result<()> {
    let mut session = connect(token, config).await?;
    let listed = session.list_tools().await;
    session.close().await;
    listed.context("listing tools")?;

    print!("{}", render_catalog(session.catalog()));
    Ok(())
}

/// Text for `ghmcp tools`: count, listing time, one line per tool.
fn render_catalog(catalog: &ToolCatalog) -> String {
    let mut out = format!("Available tools: {}", catalog.len());
    if let Some(at) = catalog.refreshed_at() {
        out.push_str(&format!(" (listed {})", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out.push('\n');
    for tool in catalog.tools() {
        out.push_str(&format!("  • {}: {}\n", tool.name, tool.description));
    }
    if !catalog.contains(PR_TOOL_NAME) {
        out.push_str(&format!("\nWarning: {PR_TOOL_NAME} was not listed by this server.\n"));
    }
    out
}

async fn run_chat(token: Option<String>, config: &ClientConfig) -> Result<()> {
    println!("GitHub MCP Chat");
    println!("===============");

    let session = match McpSession::new(token, config) {
        Ok(mut session) => match session.connect().await {
            Ok(()) => {
                let server = session
                    .server_info()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| config.server_url.clone());
                println!("Connected to {server}");
                Some(session)
            }
            Err(e) => {
                println!("Could not connect to the GitHub MCP server: {e}");
                println!("Continuing without a connection.");
                None
            }
        },
        Err(e) => {
            println!("{e}");
            println!("Continuing without a connection.");
            None
        }
    };

    println!("Type /help for commands, /quit to exit.\n");

    let mut router = ChatRouter::new(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match router.process_input(&line).await {
            Reply::Message(text) => println!("\nAssistant: {text}\n"),
            Reply::Exit => break,
        }
    }

    router.close().await;
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghmcp_client::mcp_client::Tool;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: format!("does {name}"),
            input_schema: serde_json::json!({}),
        }
    }

    #[test]
    fn test_render_catalog_shows_listing_time() {
        let mut catalog = ToolCatalog::new();
        catalog.replace(vec![tool("get_me"), tool(PR_TOOL_NAME)]);
        let text = render_catalog(&catalog);

        let stamp = catalog
            .refreshed_at()
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();
        assert!(text.starts_with(&format!("Available tools: 2 (listed {stamp})\n")));
        assert!(text.contains("  • get_me: does get_me\n"));
        assert!(!text.contains("Warning"));
    }

    #[test]
    fn test_render_catalog_warns_without_pr_tool() {
        let mut catalog = ToolCatalog::new();
        catalog.replace(vec![tool("get_me")]);
        let text = render_catalog(&catalog);
        assert!(text.contains(&format!("Warning: {PR_TOOL_NAME} was not listed")));
    }

    #[test]
    fn test_render_catalog_never_listed() {
        let text = render_catalog(&ToolCatalog::new());
        assert!(text.starts_with("Available tools: 0\n"));
    }
}
