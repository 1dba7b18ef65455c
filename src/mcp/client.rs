use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::debug;

use super::config::{MCPClientBuilder, MCPConfig, MCPTransport};
use super::sse::{EventParser, SseConnection};

/// Protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const SESSION_HEADER: &str = "mcp-session-id";

/// Errors from MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum MCPError {
    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// Protocol error
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// The server answered with a JSON-RPC error
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Timeout
    #[error("Timeout")]
    Timeout,
    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Invalid configuration
    #[error("Config error: {0}")]
    ConfigError(String),
}

struct StdioConnection {
    process: Child,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, LinesCodec>,
}

struct HttpConnection {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    session_id: Option<String>,
}

/// A client for connecting to MCP servers.
pub struct MCPClient {
    config: MCPConfig,
    stdio: Option<StdioConnection>,
    http: Option<HttpConnection>,
    sse: Option<SseConnection>,
    // Message ID counter for JSON-RPC
    message_id: AtomicU64,
}

impl MCPClient {
    /// Creates a disconnected client.
    pub fn new(config: MCPConfig) -> Self {
        Self {
            config,
            stdio: None,
            http: None,
            sse: None,
            message_id: AtomicU64::new(1),
        }
    }

    /// Creates a new builder.
    pub fn builder() -> MCPClientBuilder {
        MCPClientBuilder::new()
    }

    pub fn config(&self) -> &MCPConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stdio.is_some() || self.http.is_some() || self.sse.is_some()
    }

    /// Connects to the MCP server and performs the initialize handshake.
    pub async fn connect(&mut self) -> Result<(), MCPError> {
        match self.config.transport.clone() {
            MCPTransport::Stdio { command, args, env } => {
                self.connect_stdio(&command, &args, env.as_ref())?
            }
            MCPTransport::Http { url, headers } => self.connect_http(url, headers)?,
            MCPTransport::Sse { url, auth, mut headers } => {
                if let Some(auth) = auth {
                    headers.insert("Authorization".to_string(), auth);
                }
                self.connect_sse(&url, headers).await?
            }
        }

        let init = self.request("initialize", initialize_params()).await?;
        let protocol = init
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(server = %self.config.name, protocol, "MCP server initialized");
        self.notify("notifications/initialized").await
    }

    fn connect_stdio(
        &mut self,
        command: &str,
        args: &[String],
        env: Option<&HashMap<String, String>>,
    ) -> Result<(), MCPError> {
        debug!("Starting MCP server: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = env {
            cmd.envs(env);
        }

        let mut process = cmd.spawn().map_err(|e| {
            MCPError::ConnectionError(format!("Failed to start MCP server: {}", e))
        })?;
        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MCPError::ConnectionError("Failed to get stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| MCPError::ConnectionError("Failed to get stdout".to_string()))?;

        self.stdio = Some(StdioConnection {
            process,
            stdin,
            stdout: FramedRead::new(stdout, LinesCodec::new()),
        });
        Ok(())
    }

    fn connect_http(
        &mut self,
        url: String,
        headers: HashMap<String, String>,
    ) -> Result<(), MCPError> {
        debug!("Connecting to MCP server via HTTP: {}", url);

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| MCPError::ConnectionError(e.to_string()))?;

        self.http = Some(HttpConnection {
            client,
            url,
            headers,
            session_id: None,
        });
        Ok(())
    }

    async fn connect_sse(
        &mut self,
        url: &str,
        headers: HashMap<String, String>,
    ) -> Result<(), MCPError> {
        debug!("Connecting to MCP server via SSE: {}", url);

        // The event stream outlives any single request, so the client only
        // bounds connecting; requests are bounded by `with_timeout`.
        let timeout = self.config.timeout();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| MCPError::ConnectionError(e.to_string()))?;

        let connection = with_timeout(timeout, SseConnection::open(client, url, headers)).await?;
        self.sse = Some(connection);
        Ok(())
    }

    /// Disconnects from the MCP server.
    pub async fn disconnect(&mut self) -> Result<(), MCPError> {
        if let Some(mut stdio) = self.stdio.take() {
            // Closing stdin asks a well-behaved server to exit.
            drop(stdio.stdin);
            if let Err(e) = stdio.process.kill().await {
                debug!("MCP server already exited: {}", e);
            }
        }
        self.http = None;
        self.sse = None;
        Ok(())
    }

    /// Lists available tools from the MCP server, following pagination.
    pub async fn list_tools(&mut self) -> Result<Vec<MCToolInfo>, MCPError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(cursor) => serde_json::json!({ "cursor": cursor }),
                None => Value::Object(Map::new()),
            };
            let result = self.request("tools/list", params).await?;
            let page: ToolsListResponse = serde_json::from_value(result)
                .map_err(|e| MCPError::ProtocolError(e.to_string()))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(server = %self.config.name, count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Calls a tool on the MCP server and returns the raw result.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, MCPError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });
        self.request("tools/call", params).await
    }

    /// Sends a JSON-RPC request and waits for its result.
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, MCPError> {
        let id = self.message_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        debug!(method, id, "Sending MCP request");

        let timeout = self.config.timeout();
        let response = with_timeout(timeout, async {
            if let Some(stdio) = self.stdio.as_mut() {
                stdio.send(&message).await?;
                stdio.receive(id).await
            } else if let Some(http) = self.http.as_mut() {
                http.post(&message, Some(id)).await?.ok_or_else(|| {
                    MCPError::ProtocolError(format!("No response to request {}", id))
                })
            } else if let Some(sse) = self.sse.as_mut() {
                sse.post(&message).await?;
                sse.receive(id).await
            } else {
                Err(MCPError::ConnectionError("Not connected".to_string()))
            }
        })
        .await?;

        extract_result(response)
    }

    /// Sends a JSON-RPC notification.
    async fn notify(&mut self, method: &str) -> Result<(), MCPError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method
        });

        with_timeout(self.config.timeout(), async {
            if let Some(stdio) = self.stdio.as_mut() {
                stdio.send(&message).await
            } else if let Some(http) = self.http.as_mut() {
                http.post(&message, None).await.map(|_| ())
            } else if let Some(sse) = self.sse.as_mut() {
                sse.post(&message).await
            } else {
                Err(MCPError::ConnectionError("Not connected".to_string()))
            }
        })
        .await
    }
}

impl std::fmt::Debug for MCPClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCPClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl StdioConnection {
    async fn send(&mut self, message: &Value) -> Result<(), MCPError> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| MCPError::ProtocolError(e.to_string()))?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await.map_err(|e| {
            MCPError::ConnectionError(format!("Failed to write to stdin: {}", e))
        })?;
        self.stdin
            .flush()
            .await
            .map_err(|e| MCPError::ConnectionError(format!("Failed to flush stdin: {}", e)))
    }

    /// Reads lines until the response to request `id` arrives.
    async fn receive(&mut self, id: u64) -> Result<Value, MCPError> {
        while let Some(line) = self.stdout.next().await {
            let line = line.map_err(|e| {
                MCPError::ProtocolError(format!("Failed to read response: {}", e))
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(_) => {
                    debug!("Skipping non-JSON line: {}", trimmed);
                    continue;
                }
            };

            if response_id(&message) == Some(id) {
                return Ok(message);
            }
            debug!("Skipping unrelated message: {}", trimmed);
        }

        Err(MCPError::ConnectionError(
            "MCP server closed its output".to_string(),
        ))
    }
}

impl HttpConnection {
    /// Posts a message. Returns the response to `id`, when one is expected.
    async fn post(
        &mut self,
        message: &Value,
        id: Option<u64>,
    ) -> Result<Option<Value>, MCPError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(message);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;
        let response = check_status(response).await?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }

        let Some(id) = id else {
            return Ok(None);
        };

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;

        if is_event_stream {
            find_event_response(&body, id).map(Some).ok_or_else(|| {
                MCPError::ProtocolError(format!(
                    "No response to request {} in event stream",
                    id
                ))
            })
        } else {
            serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| MCPError::ProtocolError(format!("Failed to parse response: {}", e)))
        }
    }
}

/// Turns a non-2xx response into [`MCPError::HttpError`] carrying the status and body.
pub(super) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, MCPError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MCPError::HttpError(format!("{} - {}", status, body)))
}

async fn with_timeout<T>(
    timeout: std::time::Duration,
    future: impl Future<Output = Result<T, MCPError>>,
) -> Result<T, MCPError> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| MCPError::Timeout)?
}

fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

pub(super) fn response_id(message: &Value) -> Option<u64> {
    // Requests from the server carry a method; only responses are matched.
    if message.get("method").is_some() {
        return None;
    }
    message.get("id").and_then(Value::as_u64)
}

/// Extracts the result of a JSON-RPC response.
fn extract_result(mut response: Value) -> Result<Value, MCPError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(MCPError::ExecutionError(message));
    }

    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| MCPError::ProtocolError("No result in response".to_string()))
}

/// Finds the response to `id` among the `data:` events of an event-stream body.
fn find_event_response(body: &str, id: u64) -> Option<Value> {
    let mut parser = EventParser::default();
    let mut events: Vec<_> = body.lines().filter_map(|line| parser.push_line(line)).collect();
    events.extend(parser.finish());

    events
        .iter()
        .filter(|event| event.event == "message")
        .filter_map(|event| serde_json::from_str::<Value>(&event.data).ok())
        .find(|message| response_id(message) == Some(id))
}

/// Information about a tool from the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl MCToolInfo {
    /// Display title, falling back to the annotation title.
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or_else(|| self.annotations.as_ref()?.title.as_deref())
    }
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Optional hints a server attaches to a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub hints: Map<String, Value>,
}

/// Response from tools/list method.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResponse {
    pub tools: Vec<MCToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
