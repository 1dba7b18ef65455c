//! # MCP Tool Adapter
//!
//! Adapts the tools of a Model Context Protocol server into plain metadata
//! records and into callable functions that validate their input against the
//! tool's declared schema before running.
//!
//! ## Features
//!
//! - **Tool listing**: name, description, title and JSON Schema for every tool
//! - **Tool functions**: validated calls that forward to the tool's execution function
//! - **Schema dialects**: JSON Schema, standard schemas (including `schemars` types)
//!   and bare validators
//! - **Validator cache**: JSON Schemas are compiled once per schema identity
//! - **MCP client**: stdio, Streamable HTTP and legacy SSE transports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcp_tool_adapter::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MCPClient::builder()
//!         .with_name("filesystem")
//!         .with_stdio_transport(
//!             "npx",
//!             vec!["@modelcontextprotocol/server-filesystem".into(), ".".into()],
//!         )
//!         .build_config()?;
//!
//!     for tool in list_mcp_tools(&config).await? {
//!         println!("{}: {:?}", tool.name, tool.description);
//!     }
//!
//!     let functions = create_mcp_tool_functions(&config).await?;
//!     let output = functions.call("list_directory", json!({"path": "."})).await?;
//!     println!("{:?}", output.into_value().await);
//!
//!     Ok(())
//! }
//! ```
//!
//! Toolsets that are already in hand skip the connection step:
//!
//! ```rust
//! use mcp_tool_adapter::prelude::*;
//! use serde_json::json;
//!
//! let tools = ToolSet::new().with_tool(
//!     "calc",
//!     ToolDefinition::new(SchemaSource::json(json!({"type": "object"})))
//!         .with_description("Adds values")
//!         .with_title("Calculator"),
//! );
//!
//! let infos = list_mcp_tools_from_tool_set(&tools).unwrap();
//! assert_eq!(infos[0].title.as_deref(), Some("Calculator"));
//! ```

pub mod error;
pub mod mcp;
pub mod schema;
pub mod tool;

// Re-exports for convenient usage
pub use error::{AdapterError, BoxError};
pub use mcp::{
    create_mcp_tool_functions, create_mcp_tool_functions_with_factory,
    create_tool_functions_from_tool_set, create_tool_functions_from_tool_set_with_cache,
    list_mcp_tools, list_mcp_tools_from_tool_set, list_mcp_tools_with_factory,
    JsonRpcClientFactory, MCPClient, MCPClientBuilder, MCPConfig, MCPError, MCPTransport,
    McpClientFactory, McpConnection, ToolInfo,
};
pub use schema::{
    materialize_validator, resolve_schema, validate_types, ResolvedSchema, SchemaId, SchemaSource,
    StandardSchema, TypeValidationError, TypedSchema, ValidationResult, ValidatorCache,
};
pub use tool::{
    ToolDefinition, ToolError, ToolExecutionOptions, ToolFunction, ToolFunctions, ToolOutput,
    ToolSet,
};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::mcp::{
        create_mcp_tool_functions, create_tool_functions_from_tool_set, list_mcp_tools,
        list_mcp_tools_from_tool_set, MCPClient, MCPConfig, ToolInfo,
    };
    pub use crate::schema::{SchemaSource, TypedSchema, ValidationResult};
    pub use crate::tool::{ToolDefinition, ToolError, ToolFunctions, ToolOutput, ToolSet};
    pub use crate::AdapterError;
}
