//! Server-Sent Events framing and the legacy SSE transport.
//!
//! A legacy SSE server keeps one `GET` event stream open. Its first
//! `endpoint` event names the URL that accepts JSON-RPC messages by `POST`;
//! responses come back as `message` events on the stream.

use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

use super::client::{check_status, response_id, MCPError};

/// One dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Assembles events from the lines of an event stream.
#[derive(Debug, Default)]
pub(crate) struct EventParser {
    event: Option<String>,
    data: Option<String>,
}

impl EventParser {
    /// Feeds one line without its terminator. A blank line dispatches the
    /// pending event.
    pub(crate) fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            _ => {}
        }
        None
    }

    /// Dispatches whatever is pending at the end of the input.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        // An event without data is dropped, and its name with it.
        let event = self.event.take();
        let data = self.data.take()?;
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

type EventLines = FramedRead<Pin<Box<dyn AsyncRead + Send>>, LinesCodec>;

pub(crate) struct SseConnection {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    headers: HashMap<String, String>,
    lines: EventLines,
    parser: EventParser,
}

impl SseConnection {
    /// Opens the event stream at `url` and waits for the server to announce
    /// its message endpoint.
    pub(crate) async fn open(
        client: reqwest::Client,
        url: &str,
        headers: HashMap<String, String>,
    ) -> Result<Self, MCPError> {
        let base = reqwest::Url::parse(url)
            .map_err(|e| MCPError::ConfigError(format!("Invalid SSE URL {}: {}", url, e)))?;

        let mut request = client.get(base.clone()).header("Accept", "text/event-stream");
        for (key, value) in &headers {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;
        let response = check_status(response).await?;

        let body = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
        let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(StreamReader::new(body));

        let mut connection = Self {
            client,
            endpoint: base.clone(),
            headers,
            lines: FramedRead::new(reader, LinesCodec::new()),
            parser: EventParser::default(),
        };

        let announced = loop {
            let event = connection.next_event().await?;
            if event.event == "endpoint" {
                break event.data;
            }
            debug!("Skipping SSE event before endpoint: {}", event.event);
        };
        connection.endpoint = base.join(announced.trim()).map_err(|e| {
            MCPError::ProtocolError(format!("Invalid endpoint `{}`: {}", announced, e))
        })?;

        debug!(endpoint = %connection.endpoint, "SSE endpoint announced");
        Ok(connection)
    }

    /// Posts a message to the announced endpoint.
    pub(crate) async fn post(&mut self, message: &Value) -> Result<(), MCPError> {
        let mut request = self.client.post(self.endpoint.clone()).json(message);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }

    /// Reads `message` events until the response to request `id` arrives.
    pub(crate) async fn receive(&mut self, id: u64) -> Result<Value, MCPError> {
        loop {
            let event = self.next_event().await?;
            if event.event != "message" {
                continue;
            }
            match serde_json::from_str::<Value>(&event.data) {
                Ok(message) if response_id(&message) == Some(id) => return Ok(message),
                _ => debug!("Skipping unrelated event: {}", event.data),
            }
        }
    }

    async fn next_event(&mut self) -> Result<SseEvent, MCPError> {
        while let Some(line) = self.lines.next().await {
            let line = line.map_err(|e| {
                MCPError::ConnectionError(format!("Failed to read event stream: {}", e))
            })?;
            if let Some(event) = self.parser.push_line(&line) {
                return Ok(event);
            }
        }

        Err(MCPError::ConnectionError("MCP server closed the event stream".to_string()))
    }
}
