//! Input schema handling for tools.
//!
//! A tool declares its input schema in one of a closed set of dialects
//! ([`SchemaSource`]). Resolution turns any of them into a
//! [`ResolvedSchema`] handle with a lazily computed JSON Schema and an
//! optional built-in validator; [`materialize_validator`] fills in a
//! compiled validator when the dialect does not bring its own.

pub mod cache;
pub mod standard;
pub mod validation;

pub use cache::{materialize_validator, ValidatorCache, DEFAULT_CACHE_CAPACITY};
pub use standard::{StandardIssue, StandardOutcome, StandardResult, StandardSchema, TypedSchema};
pub use validation::{
    safe_validate_types, validate_types, FnValidator, TypeValidationError, Validate,
    ValidationResult, ValidatorFn,
};

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::AdapterError;

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a schema object.
///
/// Allocated once when a [`SchemaSource`] is built and shared by its clones,
/// so two structurally equal schemas built separately have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

impl SchemaId {
    fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

/// A JSON Schema document, optionally paired with its own validator.
#[derive(Clone)]
pub struct JsonSchemaDef {
    id: SchemaId,
    schema: Arc<Value>,
    validate: Option<ValidatorFn>,
}

impl JsonSchemaDef {
    /// Wraps a JSON Schema document.
    pub fn new(schema: Value) -> Self {
        Self {
            id: SchemaId::next(),
            schema: Arc::new(schema),
            validate: None,
        }
    }

    /// Attaches a validator that replaces compiled JSON Schema validation.
    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> ValidationResult + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// The schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }
}

impl fmt::Debug for JsonSchemaDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaDef")
            .field("id", &self.id)
            .field("schema", &self.schema)
            .field("has_validator", &self.validate.is_some())
            .finish()
    }
}

/// The input schema a tool declares, in any of the recognized dialects.
#[derive(Clone)]
pub enum SchemaSource {
    /// A bare validator callable with no declared shape.
    Validator(SchemaId, ValidatorFn),
    /// A schema object implementing the standard validation interface.
    Standard(SchemaId, Arc<dyn StandardSchema>),
    /// A JSON Schema document.
    Json(JsonSchemaDef),
    /// A value of no recognized shape. Resolution rejects it.
    Opaque(Value),
}

impl SchemaSource {
    /// A JSON Schema source.
    pub fn json(schema: Value) -> Self {
        Self::Json(JsonSchemaDef::new(schema))
    }

    /// A bare validator source.
    pub fn validator<F>(validate: F) -> Self
    where
        F: Fn(&Value) -> ValidationResult + Send + Sync + 'static,
    {
        Self::Validator(SchemaId::next(), Arc::new(validate))
    }

    /// A standard schema source.
    pub fn standard<S>(schema: S) -> Self
    where
        S: StandardSchema + 'static,
    {
        Self::Standard(SchemaId::next(), Arc::new(schema))
    }

    /// Identity of the schema, if it has a recognized shape.
    pub fn id(&self) -> Option<SchemaId> {
        match self {
            Self::Validator(id, _) | Self::Standard(id, _) => Some(*id),
            Self::Json(def) => Some(def.id),
            Self::Opaque(_) => None,
        }
    }
}

impl From<JsonSchemaDef> for SchemaSource {
    fn from(def: JsonSchemaDef) -> Self {
        Self::Json(def)
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validator(id, _) => f.debug_tuple("Validator").field(id).finish(),
            Self::Standard(id, schema) => f
                .debug_tuple("Standard")
                .field(id)
                .field(&schema.vendor())
                .finish(),
            Self::Json(def) => f.debug_tuple("Json").field(def).finish(),
            Self::Opaque(value) => f.debug_tuple("Opaque").field(value).finish(),
        }
    }
}

#[derive(Clone)]
enum Representation {
    Fixed(Arc<Value>),
    Permissive,
    Standard(Arc<dyn StandardSchema>),
}

/// Uniform handle over a resolved schema.
pub struct ResolvedSchema {
    id: SchemaId,
    representation: Representation,
    json: OnceLock<Option<Value>>,
    validator: Option<Arc<dyn Validate>>,
}

impl ResolvedSchema {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// The JSON Schema representation, computed on first access.
    pub fn json_schema(&self) -> Result<&Value, AdapterError> {
        let json = self.json.get_or_init(|| match &self.representation {
            Representation::Fixed(value) => Some(value.as_ref().clone()),
            Representation::Permissive => Some(serde_json::json!({
                "type": "object",
                "properties": {}
            })),
            Representation::Standard(schema) => schema.json_schema(),
        });

        json.as_ref().ok_or_else(|| match &self.representation {
            Representation::Standard(schema) => AdapterError::UnsupportedSchema(format!(
                "standard schema from vendor `{}` has no JSON Schema representation",
                schema.vendor()
            )),
            _ => AdapterError::UnsupportedSchema(format!("{} has no JSON Schema", self.id)),
        })
    }

    /// The built-in validator, if the schema dialect provides one.
    pub fn validator(&self) -> Option<&Arc<dyn Validate>> {
        self.validator.as_ref()
    }

    /// Returns a copy of this handle using `validator`.
    pub fn with_validator(&self, validator: Arc<dyn Validate>) -> Self {
        Self {
            id: self.id,
            representation: self.representation.clone(),
            json: self.json.clone(),
            validator: Some(validator),
        }
    }
}

impl fmt::Debug for ResolvedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSchema")
            .field("id", &self.id)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Resolves a schema source into a uniform handle.
///
/// The source is not modified. Values of unrecognized shape are rejected
/// with [`AdapterError::UnsupportedSchema`].
pub fn resolve_schema(source: &SchemaSource) -> Result<ResolvedSchema, AdapterError> {
    let (id, representation, validator) = match source {
        SchemaSource::Validator(id, validate) => (
            *id,
            Representation::Permissive,
            Some(Arc::new(FnValidator::new(validate.clone())) as Arc<dyn Validate>),
        ),
        SchemaSource::Standard(id, schema) => (
            *id,
            Representation::Standard(schema.clone()),
            Some(Arc::new(standard::StandardValidator::new(schema.clone())) as Arc<dyn Validate>),
        ),
        SchemaSource::Json(def) => (
            def.id,
            Representation::Fixed(def.schema.clone()),
            def.validate
                .clone()
                .map(|validate| Arc::new(FnValidator::new(validate)) as Arc<dyn Validate>),
        ),
        SchemaSource::Opaque(value) => {
            return Err(AdapterError::UnsupportedSchema(describe_value(value)));
        }
    };

    Ok(ResolvedSchema {
        id,
        representation,
        json: OnceLock::new(),
        validator,
    })
}

fn describe_value(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("unrecognized {} value: {}", kind, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_schema_resolves_without_validator() {
        let source = SchemaSource::json(json!({"type": "object"}));
        let resolved = resolve_schema(&source).unwrap();

        assert_eq!(Some(resolved.id()), source.id());
        assert!(resolved.validator().is_none());
        assert_eq!(resolved.json_schema().unwrap(), &json!({"type": "object"}));
    }

    #[test]
    fn test_json_schema_with_own_validator() {
        let source = SchemaSource::from(
            JsonSchemaDef::new(json!({"type": "object"}))
                .with_validator(|value| ValidationResult::Success(value.clone())),
        );
        let resolved = resolve_schema(&source).unwrap();
        assert!(resolved.validator().is_some());
    }

    #[test]
    fn test_validator_has_permissive_representation() {
        let source = SchemaSource::validator(|value| ValidationResult::Success(value.clone()));
        let resolved = resolve_schema(&source).unwrap();

        assert!(resolved.validator().is_some());
        assert_eq!(resolved.json_schema().unwrap()["type"], "object");
    }

    #[test]
    fn test_opaque_value_is_rejected() {
        let err = resolve_schema(&SchemaSource::Opaque(json!(42))).unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedSchema(_)));
        assert!(err.to_string().contains("unsupported schema"));
    }

    #[test]
    fn test_clones_share_identity() {
        let source = SchemaSource::json(json!({"type": "string"}));
        let copy = source.clone();
        let other = SchemaSource::json(json!({"type": "string"}));

        assert_eq!(source.id(), copy.id());
        assert_ne!(source.id(), other.id());
    }
}
