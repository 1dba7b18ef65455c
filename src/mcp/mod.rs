pub mod adapter;
pub mod client;
pub mod config;
mod sse;
#[cfg(test)]
mod test_server;

pub use adapter::{
    create_mcp_tool_functions, create_mcp_tool_functions_with_factory,
    create_tool_functions_from_tool_set, create_tool_functions_from_tool_set_with_cache,
    list_mcp_tools, list_mcp_tools_from_tool_set, list_mcp_tools_with_factory,
    mcp_tool_definition, normalize_input_schema, JsonRpcClientFactory, McpClientFactory,
    McpConnection, ToolInfo,
};
pub use client::{MCPClient, MCPError, MCToolInfo, ToolAnnotations, ToolsListResponse};
pub use config::{MCPClientBuilder, MCPConfig, MCPTransport};
