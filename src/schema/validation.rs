use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::ResolvedSchema;
use crate::error::{AdapterError, BoxError};

/// Outcome of validating a value against a schema.
#[derive(Debug)]
pub enum ValidationResult {
    /// The value was accepted; carries the accepted value.
    Success(Value),
    /// The value was rejected.
    Failure(BoxError),
}

impl ValidationResult {
    /// Builds a failure from a message.
    pub fn failure(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A bare validation callable.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> ValidationResult + Send + Sync>;

/// A validation capability attached to a resolved schema.
#[async_trait]
pub trait Validate: Send + Sync {
    /// Validates `value`.
    async fn validate(&self, value: Value) -> ValidationResult;
}

/// Adapts a [`ValidatorFn`] to [`Validate`].
#[derive(Clone)]
pub struct FnValidator {
    validate: ValidatorFn,
}

impl FnValidator {
    pub fn new(validate: ValidatorFn) -> Self {
        Self { validate }
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Validate for FnValidator {
    async fn validate(&self, value: Value) -> ValidationResult {
        (self.validate)(&value)
    }
}

/// A value was rejected by a tool's input schema.
#[derive(Debug, thiserror::Error)]
#[error("Type validation failed: Value: {value}.\nError message: {cause}")]
pub struct TypeValidationError {
    /// The rejected value.
    pub value: Value,
    /// Why the value was rejected.
    #[source]
    pub cause: BoxError,
}

impl TypeValidationError {
    pub fn new(value: Value, cause: BoxError) -> Self {
        Self { value, cause }
    }
}

/// Validates `value` against `schema`, returning the accepted value.
pub async fn validate_types(value: Value, schema: &ResolvedSchema) -> Result<Value, AdapterError> {
    match safe_validate_types(value.clone(), schema).await? {
        ValidationResult::Success(accepted) => Ok(accepted),
        ValidationResult::Failure(cause) => Err(TypeValidationError::new(value, cause).into()),
    }
}

/// Validates `value` against `schema` without turning a rejection into an error.
///
/// Fails only when the schema has no validation capability at all.
pub async fn safe_validate_types(
    value: Value,
    schema: &ResolvedSchema,
) -> Result<ValidationResult, AdapterError> {
    let validator = schema
        .validator()
        .ok_or(AdapterError::MissingValidate(schema.id()))?;
    Ok(validator.validate(value).await)
}
