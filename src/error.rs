//! Error types for the mcp-tool-adapter library.

use thiserror::Error;

use crate::schema::{SchemaId, TypeValidationError};

/// Boxed error used where the cause comes from caller-supplied code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The tool's input schema has no recognized shape
    #[error("unsupported schema: {0}")]
    UnsupportedSchema(String),

    /// The tool input was rejected by its schema
    #[error(transparent)]
    TypeValidation(#[from] TypeValidationError),

    /// The tool was declared without an execution function
    #[error("tool `{0}` does not have an execute function")]
    MissingExecute(String),

    /// The schema exposes no way to validate values
    #[error("{0} does not provide a validate function")]
    MissingValidate(SchemaId),

    /// The schema can only be validated asynchronously
    #[error("{0} requires asynchronous validation, which is not supported")]
    UnsupportedAsyncValidation(SchemaId),

    /// The JSON Schema could not be compiled
    #[error("failed to compile {0}: {1}")]
    SchemaCompilation(SchemaId, String),

    /// The tool's execution function failed
    #[error("Tool error: {0}")]
    Tool(#[from] crate::tool::ToolError),

    /// MCP-related error
    #[error("MCP error: {0}")]
    Mcp(#[from] crate::mcp::MCPError),
}

impl AdapterError {
    /// Whether this error is an input validation failure.
    pub fn is_type_validation(&self) -> bool {
        matches!(self, Self::TypeValidation(_))
    }
}
