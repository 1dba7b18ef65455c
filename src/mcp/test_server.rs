//! Minimal HTTP MCP server for transport tests.
//!
//! Serves one `echo` tool either as a Streamable HTTP endpoint (`POST /mcp`)
//! or as a legacy SSE server (`GET /sse` plus `POST /messages`). Every
//! response closes its connection, so each request arrives on a fresh socket.

use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub(crate) const SESSION_ID: &str = "session-1";
pub(crate) const MESSAGE_PATH: &str = "/messages?sessionId=1";

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Mode {
    StreamableHttp,
    LegacySse,
}

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub(crate) struct Seen {
    pub method: String,
    pub path: String,
    pub session_id: Option<String>,
    pub body: Option<Value>,
}

pub(crate) struct TestServer {
    pub base: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl TestServer {
    pub(crate) async fn spawn(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let state = Arc::new(State {
            mode,
            seen: seen.clone(),
            events_tx,
            events_rx: tokio::sync::Mutex::new(Some(events_rx)),
        });
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = state.clone();
                tokio::spawn(async move {
                    let _ = state.handle(stream).await;
                });
            }
        });

        Self { base, seen }
    }

    pub(crate) fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

struct State {
    mode: Mode,
    seen: Arc<Mutex<Vec<Seen>>>,
    events_tx: mpsc::UnboundedSender<Value>,
    events_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
}

impl State {
    async fn handle(&self, stream: TcpStream) -> io::Result<()> {
        let mut stream = BufReader::new(stream);
        let request = read_request(&mut stream).await?;
        let body: Option<Value> = serde_json::from_slice(&request.body).ok();
        self.seen.lock().unwrap().push(Seen {
            method: request.method.clone(),
            path: request.path.clone(),
            session_id: request.header("mcp-session-id").map(str::to_string),
            body: body.clone(),
        });

        match (self.mode, request.method.as_str(), request.path.as_str()) {
            (Mode::StreamableHttp, "POST", "/mcp") => streamable(&mut stream, body).await,
            (Mode::LegacySse, "GET", "/sse") => self.event_stream(&mut stream).await,
            (Mode::LegacySse, "POST", MESSAGE_PATH) => {
                if let Some(reply) = body.as_ref().and_then(answer) {
                    let _ = self.events_tx.send(reply);
                }
                respond(&mut stream, "202 Accepted", &[], "").await
            }
            _ => respond(&mut stream, "405 Method Not Allowed", &[], "").await,
        }
    }

    async fn event_stream(&self, stream: &mut BufReader<TcpStream>) -> io::Result<()> {
        let mut events = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| io::Error::other("event stream already open"))?;

        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
                    Cache-Control: no-cache\r\n\r\n";
        write(stream, head).await?;
        write(stream, &format!(": ready\n\nevent: endpoint\ndata: {}\n\n", MESSAGE_PATH)).await?;

        while let Some(reply) = events.recv().await {
            write(stream, &format!("event: message\ndata: {}\n\n", reply)).await?;
        }
        Ok(())
    }
}

async fn streamable(stream: &mut BufReader<TcpStream>, body: Option<Value>) -> io::Result<()> {
    let Some(message) = body else {
        return respond(stream, "400 Bad Request", &[], "").await;
    };
    let Some(reply) = answer(&message) else {
        return respond(stream, "202 Accepted", &[], "").await;
    };

    match message["method"].as_str() {
        Some("initialize") => {
            let headers = [("Content-Type", "application/json"), ("Mcp-Session-Id", SESSION_ID)];
            respond(stream, "200 OK", &headers, &reply.to_string()).await
        }
        Some("tools/list") => {
            let progress = json!({"jsonrpc": "2.0", "method": "notifications/progress"});
            let events = format!(
                "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
                progress, reply
            );
            respond(stream, "200 OK", &[("Content-Type", "text/event-stream")], &events).await
        }
        _ => {
            let headers = [("Content-Type", "application/json")];
            respond(stream, "200 OK", &headers, &reply.to_string()).await
        }
    }
}

/// The JSON-RPC response to `message`, or `None` for notifications.
fn answer(message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let result = match message["method"].as_str() {
        Some("initialize") => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "test", "version": "0"}
        }),
        Some("tools/list") => json!({
            "tools": [{
                "name": "echo",
                "title": "Echo",
                "description": "Echoes text",
                "inputSchema": {
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }
            }]
        }),
        Some("tools/call") => json!({
            "content": [{"type": "text", "text": message["params"]["arguments"]["text"]}]
        }),
        _ => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            }));
        }
    };
    Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

async fn read_request(stream: &mut BufReader<TcpStream>) -> io::Result<Request> {
    let mut line = String::new();
    stream.read_line(&mut line).await?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        stream.read_line(&mut line).await?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut request = Request {
        method,
        path,
        headers,
        body: Vec::new(),
    };
    let length = request
        .header("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    request.body = vec![0; length];
    stream.read_exact(&mut request.body).await?;
    Ok(request)
}

async fn respond(
    stream: &mut BufReader<TcpStream>,
    status: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> io::Result<()> {
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (key, value) in headers {
        response.push_str(&format!("{}: {}\r\n", key, value));
    }
    response.push_str("\r\n");
    response.push_str(body);
    write(stream, &response).await
}

async fn write(stream: &mut BufReader<TcpStream>, text: &str) -> io::Result<()> {
    let socket = stream.get_mut();
    socket.write_all(text.as_bytes()).await?;
    socket.flush().await
}
