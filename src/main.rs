//! # mcp-tools
//!
//! Lists or calls the tools of an MCP server.
//!
//! ```bash
//! # Command-based server (stdio transport)
//! mcp-tools --command npx --args @modelcontextprotocol/server-filesystem --args . list
//!
//! # HTTP server
//! mcp-tools --url http://localhost:3000/mcp call add '{"a": 1, "b": 2}'
//!
//! # Server described in a JSON file
//! mcp-tools --config server.json list
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mcp_tool_adapter::{create_mcp_tool_functions, list_mcp_tools, MCPClientBuilder, MCPConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Lists or calls the tools of an MCP server
#[derive(Parser, Debug)]
#[command(name = "mcp-tools", version)]
struct Args {
    /// JSON file describing the server
    #[arg(long, conflicts_with_all = ["command", "url"])]
    config: Option<PathBuf>,

    /// MCP server name
    #[arg(long, default_value = "mcp")]
    name: String,

    /// Connect via command (stdio transport)
    #[arg(long, conflicts_with = "url")]
    command: Option<String>,

    /// Arguments for the command
    #[arg(long, requires = "command", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Connect via HTTP URL
    #[arg(long)]
    url: Option<String>,

    /// Extra HTTP header, as `Name: value`
    #[arg(long = "header", requires = "url")]
    headers: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print every tool's name, description, title and input schema
    List,
    /// Validate arguments and call one tool
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

fn server_config(args: &Args) -> Result<MCPConfig> {
    if let Some(path) = &args.config {
        return MCPConfig::from_json_file(path).context("Failed to load server config");
    }

    let builder = MCPClientBuilder::new()
        .with_name(&args.name)
        .with_timeout(Duration::from_secs(args.timeout));

    let builder = match (&args.command, &args.url) {
        (Some(command), None) => builder.with_stdio_transport(command, args.args.clone()),
        (None, Some(url)) => {
            let mut builder = builder.with_http_transport(url);
            for header in &args.headers {
                let Some((key, value)) = header.split_once(':') else {
                    bail!("Invalid header `{}`, expected `Name: value`", header);
                };
                builder = builder.with_header(key.trim(), value.trim());
            }
            builder
        }
        _ => bail!("Specify one of --config, --command or --url"),
    };

    Ok(builder.build_config()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = server_config(&args)?;

    match &args.action {
        Action::List => {
            let tools = list_mcp_tools(&config).await?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Action::Call { tool, arguments } => {
            let arguments: Value =
                serde_json::from_str(arguments).context("Arguments must be valid JSON")?;
            let functions = create_mcp_tool_functions(&config).await?;
            let output = functions.call(tool, arguments).await?;
            println!("{}", serde_json::to_string_pretty(&output.into_value().await)?);
        }
    }

    Ok(())
}
