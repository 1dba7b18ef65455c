pub mod context;
pub mod function;
pub mod toolset;

pub use context::{Message, MessageContent, MessageRole, ToolExecutionOptions};
pub use function::{ToolFunction, ToolFunctions};
pub use toolset::ToolSet;
pub use tool_types::{ExecuteFn, ToolDefinition, ToolError, ToolOutput};

mod tool_types {
    use futures::future::BoxFuture;
    use futures::stream::{BoxStream, StreamExt};
    use serde_json::Value;
    use std::fmt;
    use std::future::Future;
    use std::sync::Arc;

    use super::context::ToolExecutionOptions;
    use crate::schema::SchemaSource;

    /// Execution function of a tool: takes validated input and call options.
    pub type ExecuteFn = Arc<
        dyn Fn(Value, ToolExecutionOptions) -> BoxFuture<'static, Result<ToolOutput, ToolError>>
            + Send
            + Sync,
    >;

    /// Definition of a tool as exposed by a toolset.
    #[derive(Clone)]
    pub struct ToolDefinition {
        /// A description of what the tool does
        pub description: Option<String>,
        /// Human-readable display name
        pub title: Option<String>,
        /// The tool's declared input schema
        pub input_schema: SchemaSource,
        /// Runs the tool; tools without one cannot be called
        pub execute: Option<ExecuteFn>,
    }

    impl ToolDefinition {
        /// Creates a definition with no description, title or execute function.
        pub fn new(input_schema: SchemaSource) -> Self {
            Self {
                description: None,
                title: None,
                input_schema,
                execute: None,
            }
        }

        pub fn with_description(mut self, description: impl Into<String>) -> Self {
            self.description = Some(description.into());
            self
        }

        pub fn with_title(mut self, title: impl Into<String>) -> Self {
            self.title = Some(title.into());
            self
        }

        /// Sets the execution function.
        pub fn with_execute<F, Fut>(mut self, execute: F) -> Self
        where
            F: Fn(Value, ToolExecutionOptions) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
        {
            self.execute = Some(Arc::new(move |args: Value, options: ToolExecutionOptions| {
                Box::pin(execute(args, options)) as BoxFuture<'static, _>
            }));
            self
        }
    }

    impl fmt::Debug for ToolDefinition {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ToolDefinition")
                .field("description", &self.description)
                .field("title", &self.title)
                .field("input_schema", &self.input_schema)
                .field("has_execute", &self.execute.is_some())
                .finish()
        }
    }

    /// What a tool returned: a single value or a stream of values.
    pub enum ToolOutput {
        Value(Value),
        Stream(BoxStream<'static, Value>),
    }

    impl ToolOutput {
        /// Wraps a stream of partial results.
        pub fn stream<S>(stream: S) -> Self
        where
            S: futures::Stream<Item = Value> + Send + 'static,
        {
            Self::Stream(stream.boxed())
        }

        pub fn is_stream(&self) -> bool {
            matches!(self, Self::Stream(_))
        }

        /// Returns the value, if this is not a stream.
        pub fn as_value(&self) -> Option<&Value> {
            match self {
                Self::Value(value) => Some(value),
                Self::Stream(_) => None,
            }
        }

        /// Resolves to the final value; a stream yields its last item, or null if empty.
        pub async fn into_value(self) -> Value {
            match self {
                Self::Value(value) => value,
                Self::Stream(mut stream) => {
                    let mut last = Value::Null;
                    while let Some(item) = stream.next().await {
                        last = item;
                    }
                    last
                }
            }
        }
    }

    impl From<Value> for ToolOutput {
        fn from(value: Value) -> Self {
            Self::Value(value)
        }
    }

    impl fmt::Debug for ToolOutput {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
                Self::Stream(_) => f.write_str("Stream(..)"),
            }
        }
    }

    /// Errors that can occur when executing a tool.
    #[derive(Debug, thiserror::Error)]
    pub enum ToolError {
        #[error("Execution failed: {0}")]
        ExecutionFailed(String),
        #[error("Tool not found: {0}")]
        NotFound(String),
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[tokio::test]
        async fn test_stream_output_resolves_to_last_item() {
            let output = ToolOutput::stream(async_stream::stream! {
                yield json!({"progress": 50});
                yield json!({"progress": 100, "done": true});
            });
            assert!(output.is_stream());
            assert_eq!(output.into_value().await, json!({"progress": 100, "done": true}));
        }

        #[test]
        fn test_empty_stream_resolves_to_null() {
            let output = ToolOutput::stream(futures::stream::empty());
            assert_eq!(tokio_test::block_on(output.into_value()), Value::Null);
        }

        #[test]
        fn test_definition_builder() {
            let def = ToolDefinition::new(SchemaSource::json(json!({"type": "object"})))
                .with_description("Adds values")
                .with_title("Calculator");

            assert_eq!(def.description.as_deref(), Some("Adds values"));
            assert_eq!(def.title.as_deref(), Some("Calculator"));
            assert!(def.execute.is_none());
        }
    }
}
