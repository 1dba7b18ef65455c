//! Turns the tools of an MCP server into [`ToolInfo`] records or callable
//! [`ToolFunctions`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AdapterError;
use crate::mcp::client::{MCPClient, MCPError, MCToolInfo};
use crate::mcp::config::MCPConfig;
use crate::schema::{resolve_schema, SchemaSource, ValidatorCache};
use crate::tool::{ToolDefinition, ToolError, ToolFunction, ToolFunctions, ToolOutput, ToolSet};

/// Metadata of one tool, as returned by listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// JSON Schema of the tool input
    pub input_schema: Value,
}

/// An open connection able to enumerate a server's tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpConnection: Send {
    /// Lists the server's tools. Their execute functions call back into the server.
    async fn tools(&mut self) -> Result<ToolSet, MCPError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), MCPError>;
}

/// Opens connections to MCP servers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpClientFactory: Send + Sync {
    async fn create(&self, config: &MCPConfig) -> Result<Box<dyn McpConnection>, MCPError>;
}

/// Factory backed by the built-in JSON-RPC [`MCPClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcClientFactory;

#[async_trait]
impl McpClientFactory for JsonRpcClientFactory {
    async fn create(&self, config: &MCPConfig) -> Result<Box<dyn McpConnection>, MCPError> {
        let mut client = MCPClient::new(config.clone());
        client.connect().await?;
        Ok(Box::new(SharedClient {
            client: Arc::new(Mutex::new(client)),
        }))
    }
}

/// A connected client shared by the execute functions of its tools.
struct SharedClient {
    client: Arc<Mutex<MCPClient>>,
}

#[async_trait]
impl McpConnection for SharedClient {
    async fn tools(&mut self) -> Result<ToolSet, MCPError> {
        let listed = self.client.lock().await.list_tools().await?;

        let mut tools = ToolSet::new();
        for info in listed {
            let name = info.name.clone();
            tools.insert(name, mcp_tool_definition(info, self.client.clone()));
        }
        Ok(tools)
    }

    async fn close(&mut self) -> Result<(), MCPError> {
        self.client.lock().await.disconnect().await
    }
}

/// Wraps a listed MCP tool as a [`ToolDefinition`] that executes on `client`.
pub fn mcp_tool_definition(info: MCToolInfo, client: Arc<Mutex<MCPClient>>) -> ToolDefinition {
    let title = info.display_title().map(str::to_string);
    let name = info.name;

    let schema = SchemaSource::json(normalize_input_schema(info.input_schema));
    let mut definition = ToolDefinition::new(schema).with_execute(move |args, _options| {
        let client = client.clone();
        let name = name.clone();
        async move {
            let mut client = client.lock().await;
            let result = client
                .call_tool(&name, args)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok::<_, ToolError>(ToolOutput::Value(result))
        }
    });
    definition.description = info.description;
    definition.title = title;
    definition
}

/// Closes the server's input schema: missing `properties` become `{}` and
/// `additionalProperties` is set to `false`.
pub fn normalize_input_schema(schema: Value) -> Value {
    let mut object = match schema {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    if !object.contains_key("properties") {
        object.insert("properties".to_string(), Value::Object(Map::new()));
    }
    object.insert("additionalProperties".to_string(), Value::Bool(false));
    Value::Object(object)
}

/// Lists tool metadata for every defined entry of `tools`, in order.
pub fn list_mcp_tools_from_tool_set(tools: &ToolSet) -> Result<Vec<ToolInfo>, AdapterError> {
    let mut infos = Vec::with_capacity(tools.len());

    for (name, definition) in tools.defined() {
        let schema = resolve_schema(&definition.input_schema)?;
        infos.push(ToolInfo {
            name: name.to_string(),
            description: definition.description.clone(),
            title: definition.title.clone(),
            input_schema: schema.json_schema()?.clone(),
        });
    }

    Ok(infos)
}

/// Builds a validating function for every defined entry of `tools`.
///
/// Uses the process-wide [`ValidatorCache`]. The first tool that fails to
/// build aborts the whole pass.
pub fn create_tool_functions_from_tool_set(tools: &ToolSet) -> Result<ToolFunctions, AdapterError> {
    create_tool_functions_from_tool_set_with_cache(tools, &ValidatorCache::global())
}

/// [`create_tool_functions_from_tool_set`] with an explicit cache.
pub fn create_tool_functions_from_tool_set_with_cache(
    tools: &ToolSet,
    cache: &ValidatorCache,
) -> Result<ToolFunctions, AdapterError> {
    let mut functions = ToolFunctions::new();
    for (name, definition) in tools.defined() {
        functions.insert(ToolFunction::new(name, definition, cache)?);
    }
    Ok(functions)
}

/// Connects to the server described by `config` and lists its tools.
pub async fn list_mcp_tools(config: &MCPConfig) -> Result<Vec<ToolInfo>, AdapterError> {
    list_mcp_tools_with_factory(&JsonRpcClientFactory, config).await
}

/// [`list_mcp_tools`] through a custom client factory.
pub async fn list_mcp_tools_with_factory(
    factory: &dyn McpClientFactory,
    config: &MCPConfig,
) -> Result<Vec<ToolInfo>, AdapterError> {
    let mut connection = factory.create(config).await?;

    let listed = match connection.tools().await {
        Ok(tools) => list_mcp_tools_from_tool_set(&tools),
        Err(e) => Err(e.into()),
    };
    let closed = connection.close().await;

    let infos = listed?;
    closed?;
    debug!(server = %config.name, count = infos.len(), "Listed tools");
    Ok(infos)
}

/// Connects to the server described by `config` and builds a function per tool.
///
/// The connection stays open while any returned function is alive.
pub async fn create_mcp_tool_functions(config: &MCPConfig) -> Result<ToolFunctions, AdapterError> {
    let cache = ValidatorCache::global();
    create_mcp_tool_functions_with_factory(&JsonRpcClientFactory, config, &cache).await
}

/// [`create_mcp_tool_functions`] through a custom client factory and cache.
pub async fn create_mcp_tool_functions_with_factory(
    factory: &dyn McpClientFactory,
    config: &MCPConfig,
    cache: &ValidatorCache,
) -> Result<ToolFunctions, AdapterError> {
    let mut connection = factory.create(config).await?;

    let built = match connection.tools().await {
        Ok(tools) => create_tool_functions_from_tool_set_with_cache(&tools, cache),
        Err(e) => Err(e.into()),
    };
    if built.is_err() {
        // Nothing will call back into the server.
        if let Err(e) = connection.close().await {
            debug!("Failed to close MCP connection: {}", e);
        }
    }

    let functions = built?;
    debug!(server = %config.name, count = functions.len(), "Built tool functions");
    Ok(functions)
}
