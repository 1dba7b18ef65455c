use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::AdapterError;
use crate::schema::{
    materialize_validator, resolve_schema, validate_types, ResolvedSchema, ValidatorCache,
};
use crate::tool::{ExecuteFn, ToolDefinition, ToolError, ToolExecutionOptions, ToolOutput};

/// A callable tool that validates its arguments before running.
///
/// The schema is resolved and its validator materialized once, when the
/// function is built; every call reuses them.
#[derive(Clone)]
pub struct ToolFunction {
    name: String,
    schema: Arc<ResolvedSchema>,
    execute: Option<ExecuteFn>,
}

impl ToolFunction {
    /// Builds the callable for the tool `name`.
    pub fn new(
        name: impl Into<String>,
        definition: &ToolDefinition,
        cache: &ValidatorCache,
    ) -> Result<Self, AdapterError> {
        let name = name.into();
        let resolved = resolve_schema(&definition.input_schema)?;
        let schema = materialize_validator(&resolved, cache)?;
        debug!(tool = %name, schema = %schema.id(), "Built tool function");

        Ok(Self {
            name,
            schema: Arc::new(schema),
            execute: definition.execute.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved input schema.
    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    /// Whether the tool can be executed at all.
    pub fn has_execute(&self) -> bool {
        self.execute.is_some()
    }

    /// Validates `args` and runs the tool, returning its output untouched.
    pub async fn call(&self, args: Value) -> Result<ToolOutput, AdapterError> {
        let execute = self
            .execute
            .as_ref()
            .ok_or_else(|| AdapterError::MissingExecute(self.name.clone()))?;

        let input = validate_types(args, &self.schema).await?;
        let options = ToolExecutionOptions::for_tool(&self.name);
        debug!(tool = %self.name, call_id = %options.tool_call_id, "Executing tool");

        Ok(execute(input, options).await?)
    }
}

impl fmt::Debug for ToolFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolFunction")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("has_execute", &self.execute.is_some())
            .finish()
    }
}

/// Tool functions by name, in toolset order.
#[derive(Clone, Default)]
pub struct ToolFunctions {
    functions: Vec<ToolFunction>,
}

impl ToolFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function, replacing one with the same name in place.
    pub fn insert(&mut self, function: ToolFunction) {
        match self.functions.iter_mut().find(|f| f.name == function.name) {
            Some(existing) => *existing = function,
            None => self.functions.push(function),
        }
    }

    /// Gets a function by tool name.
    pub fn get(&self, name: &str) -> Option<&ToolFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Calls the tool `name` with `args`.
    pub async fn call(&self, name: &str, args: Value) -> Result<ToolOutput, AdapterError> {
        let function = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        function.call(args).await
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ToolFunction> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Converts into a map keyed by tool name.
    pub fn into_map(self) -> HashMap<String, ToolFunction> {
        self.functions
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect()
    }
}

impl fmt::Debug for ToolFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolFunctions")
            .field("tools", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl IntoIterator for ToolFunctions {
    type Item = ToolFunction;
    type IntoIter = std::vec::IntoIter<ToolFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ToolFunctions {
    type Item = &'a ToolFunction;
    type IntoIter = std::slice::Iter<'a, ToolFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaSource;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn greet_schema() -> SchemaSource {
        SchemaSource::json(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        }))
    }

    fn greet(calls: Arc<AtomicUsize>) -> ToolDefinition {
        ToolDefinition::new(greet_schema()).with_execute(move |args, options| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                assert!(options.tool_call_id.starts_with("call_greet_"));
                assert!(options.messages.is_empty());
                let name = args["name"].as_str().unwrap_or_default().to_string();
                Ok::<_, ToolError>(ToolOutput::Value(json!({"greeting": format!("hello {name}")})))
            }
        })
    }

    #[tokio::test]
    async fn test_valid_call_executes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ValidatorCache::default();
        let function = ToolFunction::new("greet", &greet(calls.clone()), &cache).unwrap();

        let output = function.call(json!({"name": "bob"})).await.unwrap();
        assert_eq!(output.as_value(), Some(&json!({"greeting": "hello bob"})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_call_is_rejected_before_execute() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ValidatorCache::default();
        let function = ToolFunction::new("greet", &greet(calls.clone()), &cache).unwrap();

        let err = function.call(json!({"name": 123})).await.unwrap_err();
        assert!(err.is_type_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_execute_always_fails() {
        let cache = ValidatorCache::default();
        let definition = ToolDefinition::new(greet_schema());
        let function = ToolFunction::new("noop", &definition, &cache).unwrap();

        for args in [json!({"name": "bob"}), json!({"name": 1}), json!(null)] {
            let err = function.call(args).await.unwrap_err();
            assert!(matches!(err, AdapterError::MissingExecute(_)));
            assert!(err.to_string().contains("execute function"));
        }
    }

    #[tokio::test]
    async fn test_repeated_calls_compile_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ValidatorCache::default();
        let function = ToolFunction::new("greet", &greet(calls.clone()), &cache).unwrap();

        for _ in 0..5 {
            function.call(json!({"name": "bob"})).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(cache.compilations(), 1);
    }

    #[tokio::test]
    async fn test_execution_errors_propagate() {
        let cache = ValidatorCache::default();
        let def = ToolDefinition::new(greet_schema()).with_execute(|_, _| async {
            Err::<ToolOutput, _>(ToolError::ExecutionFailed("server unavailable".to_string()))
        });
        let function = ToolFunction::new("greet", &def, &cache).unwrap();

        let err = function.call(json!({"name": "bob"})).await.unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_unknown_function_name() {
        let functions = ToolFunctions::new();
        let err = functions.call("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::NotFound(_))));
    }
}
