use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::client::{MCPClient, MCPError};

/// Configuration for connecting to an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPConfig {
    /// Name of the MCP server
    pub name: String,
    /// Transport type and configuration
    pub transport: MCPTransport,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl MCPConfig {
    pub fn new(name: impl Into<String>, transport: MCPTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, MCPError> {
        serde_json::from_str(json).map_err(|e| MCPError::ConfigError(e.to_string()))
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MCPError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MCPError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }
}

/// Transport type for MCP connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MCPTransport {
    /// Connect via stdin/stdout of a process
    Stdio {
        /// The command to run
        command: String,
        /// Command arguments
        #[serde(default)]
        args: Vec<String>,
        /// Environment variables
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env: Option<HashMap<String, String>>,
    },
    /// Connect via HTTP
    Http {
        /// The URL of the MCP endpoint
        url: String,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
    /// Connect via Server-Sent Events
    Sse {
        /// The URL of the SSE endpoint
        url: String,
        /// Optional authorization header value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth: Option<String>,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
}

/// Builder for MCP client.
#[derive(Debug, Default)]
pub struct MCPClientBuilder {
    name: Option<String>,
    transport: Option<MCPTransport>,
    timeout: Option<Duration>,
}

impl MCPClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Configures stdio transport.
    pub fn with_stdio_transport(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.transport = Some(MCPTransport::Stdio {
            command: command.into(),
            args,
            env: None,
        });
        self
    }

    /// Configures HTTP transport.
    pub fn with_http_transport(mut self, url: impl Into<String>) -> Self {
        self.transport = Some(MCPTransport::Http {
            url: url.into(),
            headers: HashMap::new(),
        });
        self
    }

    /// Configures SSE transport.
    pub fn with_sse_transport(mut self, url: impl Into<String>) -> Self {
        self.transport = Some(MCPTransport::Sse {
            url: url.into(),
            auth: None,
            headers: HashMap::new(),
        });
        self
    }

    /// Adds a request header. Ignored for stdio transport.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.transport {
            Some(MCPTransport::Http { headers, .. }) | Some(MCPTransport::Sse { headers, .. }) => {
                headers.insert(key.into(), value.into());
            }
            _ => {}
        }
        self
    }

    /// Adds an environment variable. Only used by stdio transport.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(MCPTransport::Stdio { env, .. }) = &mut self.transport {
            env.get_or_insert_with(HashMap::new)
                .insert(key.into(), value.into());
        }
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> Result<MCPConfig, MCPError> {
        let name = self
            .name
            .ok_or_else(|| MCPError::ConfigError("MCP server name is required".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| MCPError::ConfigError("MCP transport is required".to_string()))?;
        let timeout_secs = self
            .timeout
            .map(|t| t.as_secs().max(1))
            .unwrap_or_else(default_timeout_secs);

        Ok(MCPConfig {
            name,
            transport,
            timeout_secs,
        })
    }

    /// Builds the MCP client.
    pub fn build(self) -> Result<MCPClient, MCPError> {
        Ok(MCPClient::new(self.build_config()?))
    }
}
