//! Vendor-neutral schema objects.
//!
//! A [`StandardSchema`] validates values itself and may describe its shape as
//! JSON Schema. [`TypedSchema`] provides one for any Rust type deriving
//! `schemars::JsonSchema` and serde's traits.

use async_trait::async_trait;
use futures::future::BoxFuture;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::validation::{Validate, ValidationResult};

/// A single problem reported by a standard schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardIssue {
    pub message: String,
    /// Path of keys/indices leading to the offending value.
    pub path: Vec<String>,
}

impl StandardIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn at(mut self, path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for StandardIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "/{}: {}", self.path.join("/"), self.message)
        }
    }
}

/// Issues raised by a standard schema, reported together.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct StandardIssues(pub Vec<StandardIssue>);

pub type StandardResult = Result<Value, Vec<StandardIssue>>;

/// Result of [`StandardSchema::validate`], which may complete later.
pub enum StandardOutcome {
    Ready(StandardResult),
    Pending(BoxFuture<'static, StandardResult>),
}

impl From<StandardResult> for StandardOutcome {
    fn from(result: StandardResult) -> Self {
        Self::Ready(result)
    }
}

/// A schema object exposing the standard validation interface.
pub trait StandardSchema: Send + Sync {
    /// Name of the library that produced the schema.
    fn vendor(&self) -> &str;

    /// Version of the interface the schema implements.
    fn version(&self) -> u32 {
        1
    }

    /// Validates `value`, returning the accepted value or the issues found.
    fn validate(&self, value: &Value) -> StandardOutcome;

    /// JSON Schema describing accepted values, when the vendor can produce one.
    fn json_schema(&self) -> Option<Value> {
        None
    }
}

pub(crate) struct StandardValidator {
    schema: Arc<dyn StandardSchema>,
}

impl StandardValidator {
    pub(crate) fn new(schema: Arc<dyn StandardSchema>) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl Validate for StandardValidator {
    async fn validate(&self, value: Value) -> ValidationResult {
        let result = match self.schema.validate(&value) {
            StandardOutcome::Ready(result) => result,
            StandardOutcome::Pending(pending) => pending.await,
        };

        match result {
            Ok(accepted) => ValidationResult::Success(accepted),
            Err(issues) => ValidationResult::Failure(Box::new(StandardIssues(issues))),
        }
    }
}

/// Standard schema for a Rust type, described by `schemars`.
///
/// Validation deserializes the value into `T`; the accepted value is `T`
/// serialized back, so serde defaults are filled in.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StandardSchema for TypedSchema<T>
where
    T: JsonSchema + DeserializeOwned + Serialize + 'static,
{
    fn vendor(&self) -> &str {
        "schemars"
    }

    fn validate(&self, value: &Value) -> StandardOutcome {
        let result = serde_json::from_value::<T>(value.clone())
            .and_then(|typed| serde_json::to_value(&typed))
            .map_err(|e| vec![StandardIssue::new(e.to_string())]);
        StandardOutcome::Ready(result)
    }

    fn json_schema(&self) -> Option<Value> {
        serde_json::to_value(schema_for!(T)).ok()
    }
}
