//! Compiled JSON Schema validators, cached by schema identity.

use async_trait::async_trait;
use jsonschema::{ErrorIterator, JSONSchema};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use tracing::debug;

use super::validation::{Validate, ValidationResult};
use super::{ResolvedSchema, SchemaId};
use crate::error::AdapterError;

/// Number of compiled validators kept before the oldest is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

static GLOBAL_CACHE: LazyLock<Arc<ValidatorCache>> =
    LazyLock::new(|| Arc::new(ValidatorCache::new(DEFAULT_CACHE_CAPACITY)));

#[derive(Default)]
struct CacheState {
    entries: HashMap<SchemaId, Arc<JSONSchema>>,
    // insertion order, oldest first
    order: VecDeque<SchemaId>,
}

/// Bounded cache of compiled validators keyed by [`SchemaId`].
///
/// Entries are never invalidated; when the cache is full the oldest entry is
/// evicted to make room.
pub struct ValidatorCache {
    capacity: usize,
    state: Mutex<CacheState>,
    compilations: AtomicUsize,
}

impl ValidatorCache {
    /// Creates an empty cache holding at most `capacity` validators.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            compilations: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache.
    pub fn global() -> Arc<ValidatorCache> {
        GLOBAL_CACHE.clone()
    }

    /// Returns the validator compiled for `id`, compiling `schema` on a miss.
    pub fn get_or_compile(
        &self,
        id: SchemaId,
        schema: &Value,
    ) -> Result<Arc<JSONSchema>, AdapterError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(compiled) = state.entries.get(&id) {
            return Ok(compiled.clone());
        }

        debug!(%id, "Compiling JSON Schema validator");
        let compiled = JSONSchema::compile(schema)
            .map_err(|e| AdapterError::SchemaCompilation(id, e.to_string()))?;
        let compiled = Arc::new(compiled);
        self.compilations.fetch_add(1, Ordering::Relaxed);

        if state.order.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                debug!(id = %oldest, "Evicting compiled validator");
                state.entries.remove(&oldest);
            }
        }
        state.entries.insert(id, compiled.clone());
        state.order.push_back(id);

        Ok(compiled)
    }

    /// Whether a validator is cached for `id`.
    pub fn contains(&self, id: SchemaId) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.contains_key(&id)
    }

    /// Number of cached validators.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of schema compilations performed by this cache.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("compilations", &self.compilations())
            .finish()
    }
}

/// Validator backed by a compiled JSON Schema. Runs synchronously.
struct CompiledValidator {
    compiled: Arc<JSONSchema>,
}

#[async_trait]
impl Validate for CompiledValidator {
    async fn validate(&self, value: Value) -> ValidationResult {
        let violations = match self.compiled.validate(&value) {
            Ok(()) => None,
            Err(errors) => Some(describe_violations(errors)),
        };

        match violations {
            None => ValidationResult::Success(value),
            Some(message) => ValidationResult::failure(message),
        }
    }
}

fn describe_violations(errors: ErrorIterator<'_>) -> String {
    errors
        .map(|error| {
            let location = error.instance_path.to_string();
            let location = if location.is_empty() { "/" } else { location.as_str() };
            format!("{}: {}", location, error)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ensures `schema` has a validator.
///
/// A schema that brings its own validator is returned with it unchanged.
/// Otherwise its JSON representation is compiled through `cache`.
pub fn materialize_validator(
    schema: &ResolvedSchema,
    cache: &ValidatorCache,
) -> Result<ResolvedSchema, AdapterError> {
    if let Some(validator) = schema.validator() {
        return Ok(schema.with_validator(validator.clone()));
    }

    let json = schema.json_schema()?;
    // Asynchronous schemas cannot be checked by a synchronous validator.
    if json.get("$async").and_then(Value::as_bool) == Some(true) {
        return Err(AdapterError::UnsupportedAsyncValidation(schema.id()));
    }

    let compiled = cache.get_or_compile(schema.id(), json)?;
    Ok(schema.with_validator(Arc::new(CompiledValidator { compiled })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve_schema, validate_types, SchemaSource};
    use serde_json::json;

    fn person_schema() -> SchemaSource {
        SchemaSource::json(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name"]
        }))
    }

    fn compiled_person(cache: &ValidatorCache) -> ResolvedSchema {
        let resolved = resolve_schema(&person_schema()).unwrap();
        materialize_validator(&resolved, cache).unwrap()
    }

    #[tokio::test]
    async fn test_compiled_validator_accepts_valid_input() {
        let cache = ValidatorCache::default();
        let schema = compiled_person(&cache);

        let value = validate_types(json!({"name": "ann", "age": 3}), &schema).await.unwrap();
        assert_eq!(value, json!({"name": "ann", "age": 3}));
    }

    #[tokio::test]
    async fn test_violations_are_joined_with_locations() {
        let cache = ValidatorCache::default();
        let schema = compiled_person(&cache);

        let err = validate_types(json!({"name": 5, "age": -1}), &schema).await.unwrap_err();
        let message = match err {
            AdapterError::TypeValidation(e) => e.cause.to_string(),
            other => panic!("unexpected error: {other}"),
        };

        assert!(message.contains("/name: "), "{message}");
        assert!(message.contains("/age: "), "{message}");
        assert!(message.contains("; "), "{message}");
    }

    #[tokio::test]
    async fn test_root_violation_location() {
        let cache = ValidatorCache::default();
        let schema = compiled_person(&cache);

        let err = validate_types(json!({}), &schema).await.unwrap_err();
        assert!(err.to_string().contains("/: "));
    }

    #[test]
    fn test_schema_compiled_once_per_identity() {
        let cache = ValidatorCache::default();
        let source = person_schema();

        for _ in 0..3 {
            let resolved = resolve_schema(&source).unwrap();
            materialize_validator(&resolved, &cache).unwrap();
        }
        assert_eq!(cache.compilations(), 1);

        let other = person_schema();
        materialize_validator(&resolve_schema(&other).unwrap(), &cache).unwrap();
        assert_eq!(cache.compilations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let cache = ValidatorCache::new(2);
        let sources: Vec<_> = (0..3).map(|_| person_schema()).collect();

        for source in &sources {
            materialize_validator(&resolve_schema(source).unwrap(), &cache).unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(sources[0].id().unwrap()));
        assert!(cache.contains(sources[2].id().unwrap()));
    }

    #[test]
    fn test_async_schema_is_rejected() {
        let cache = ValidatorCache::default();
        let source = SchemaSource::json(json!({"$async": true, "type": "object"}));
        let err = materialize_validator(&resolve_schema(&source).unwrap(), &cache).unwrap_err();

        assert!(matches!(err, AdapterError::UnsupportedAsyncValidation(_)));
        assert_eq!(cache.compilations(), 0);
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let cache = ValidatorCache::default();
        let source = SchemaSource::json(json!({"type": "not-a-type"}));
        let err = materialize_validator(&resolve_schema(&source).unwrap(), &cache).unwrap_err();
        assert!(matches!(err, AdapterError::SchemaCompilation(..)));
    }

    #[test]
    fn test_own_validator_skips_compilation() {
        let cache = ValidatorCache::default();
        let source = SchemaSource::validator(|value| ValidationResult::Success(value.clone()));
        let schema = materialize_validator(&resolve_schema(&source).unwrap(), &cache).unwrap();

        assert!(schema.validator().is_some());
        assert_eq!(cache.compilations(), 0);
    }
}
