//! In-memory implementation of the document store for testing and development
//!
//! Collections live in a shared `HashMap` behind an `RwLock`. The backend
//! mirrors the behaviors the engine relies on from a real document store:
//! equality filters with string/native type coercion, multi-key sort,
//! skip/limit pagination, projection, two-level relation expansion, and
//! unique-field enforcement on insert.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::core::populate::Expansion;
use crate::core::query::{SortKey, SortOrder};
use crate::core::schema::{ModelBinding, Projection, Schema, SchemaRegistry};
use crate::core::store::{DocumentStore, FindSpec, JsonObject, StoreError};

type Collections = Arc<RwLock<HashMap<String, Vec<JsonObject>>>>;

/// Shared in-memory document store.
///
/// One backend holds every collection; [`InMemoryBackend::bind`] hands out
/// per-collection [`ModelBinding`]s that all see the same data, so relation
/// expansion across collections works.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    collections: Collections,
    registry: Arc<RwLock<SchemaRegistry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema and bind it to a store handle for its collection
    pub fn bind(&self, schema: Arc<Schema>) -> ModelBinding {
        if let Ok(mut registry) = self.registry.write() {
            registry.register(schema.clone());
        }

        let store = InMemoryStore {
            collection: schema.collection().to_string(),
            schema: schema.clone(),
            collections: self.collections.clone(),
            registry: self.registry.clone(),
        };

        ModelBinding::new(Arc::new(store), schema)
    }
}

/// Per-collection store handle produced by [`InMemoryBackend::bind`]
#[derive(Clone)]
pub struct InMemoryStore {
    collection: String,
    schema: Arc<Schema>,
    collections: Collections,
    registry: Arc<RwLock<SchemaRegistry>>,
}

impl InMemoryStore {
    fn read_all(&self) -> Result<Vec<JsonObject>, StoreError> {
        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections.get(&self.collection).cloned().unwrap_or_default())
    }

    /// Expand relation fields on a document, then project it.
    ///
    /// Projection runs after expansion so a request-level allow-list also
    /// governs whether an expanded relation survives in the output.
    fn finalize(
        &self,
        mut document: JsonObject,
        projection: Option<&Projection>,
        expansions: &[Expansion],
    ) -> Result<Value, StoreError> {
        for expansion in expansions {
            self.expand(&mut document, expansion)?;
        }

        if let Some(projection) = projection {
            projection.apply(&mut document);
        }

        Ok(Value::Object(document))
    }

    fn expand(&self, document: &mut JsonObject, expansion: &Expansion) -> Result<(), StoreError> {
        let target = self
            .schema
            .relation_target(&expansion.path)
            .ok_or_else(|| StoreError::InvalidValue {
                message: format!(
                    "unknown relation path '{}' on {}",
                    expansion.path, self.collection
                ),
            })?
            .to_string();

        let Some(reference) = document.get(&expansion.path).cloned() else {
            return Ok(());
        };
        if reference.is_null() {
            return Ok(());
        }

        let mut related = self.lookup(&target, &reference)?;

        if let Some(related_doc) = related.as_mut() {
            if let Some(nested) = &expansion.nested {
                self.expand_nested(related_doc, &target, nested)?;
            }
            if let Some(select) = &expansion.select {
                Projection::Include(select.clone()).apply(related_doc);
            }
        }

        document.insert(
            expansion.path.clone(),
            related.map(Value::Object).unwrap_or(Value::Null),
        );

        Ok(())
    }

    /// Second expansion level, resolved against the target's schema
    fn expand_nested(
        &self,
        document: &mut JsonObject,
        parent_collection: &str,
        nested: &crate::core::populate::NestedExpansion,
    ) -> Result<(), StoreError> {
        let registry = self.registry.read().map_err(lock_error)?;
        let parent_schema =
            registry
                .get(parent_collection)
                .ok_or_else(|| StoreError::InvalidValue {
                    message: format!("no schema registered for '{}'", parent_collection),
                })?;
        let target = parent_schema
            .relation_target(&nested.path)
            .ok_or_else(|| StoreError::InvalidValue {
                message: format!(
                    "unknown relation path '{}' on {}",
                    nested.path, parent_collection
                ),
            })?
            .to_string();
        drop(registry);

        let Some(reference) = document.get(&nested.path).cloned() else {
            return Ok(());
        };
        if reference.is_null() {
            return Ok(());
        }

        let mut related = self.lookup(&target, &reference)?;

        if let Some(related_doc) = related.as_mut()
            && let Some(select) = &nested.select
        {
            Projection::Include(select.clone()).apply(related_doc);
        }

        document.insert(
            nested.path.clone(),
            related.map(Value::Object).unwrap_or(Value::Null),
        );

        Ok(())
    }

    fn lookup(&self, collection: &str, id: &Value) -> Result<Option<JsonObject>, StoreError> {
        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.get("id") == Some(id)).cloned()))
    }

    fn check_unique(
        &self,
        docs: &[JsonObject],
        candidate: &JsonObject,
        skip_index: Option<usize>,
    ) -> Result<(), StoreError> {
        for field in self.schema.unique_fields() {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let conflict = docs
                .iter()
                .enumerate()
                .any(|(i, d)| Some(i) != skip_index && d.get(field) == Some(value));
            if conflict {
                return Err(StoreError::DuplicateKey {
                    message: format!(
                        "duplicate value for unique field '{}' in {}",
                        field, self.collection
                    ),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(&self, filter: &JsonObject, spec: &FindSpec) -> Result<Vec<Value>, StoreError> {
        let mut matched: Vec<JsonObject> = self
            .read_all()?
            .into_iter()
            .filter(|doc| matches_filter(doc, filter))
            .collect();

        sort_documents(&mut matched, &spec.sort);

        let skip = spec.skip as usize;
        let page: Vec<JsonObject> = match spec.limit {
            Some(limit) => matched.into_iter().skip(skip).take(limit as usize).collect(),
            None => matched.into_iter().skip(skip).collect(),
        };

        page.into_iter()
            .map(|doc| self.finalize(doc, spec.projection.as_ref(), &spec.expansions))
            .collect()
    }

    async fn find_one(
        &self,
        filter: &JsonObject,
        projection: Option<&Projection>,
        expansions: &[Expansion],
    ) -> Result<Option<Value>, StoreError> {
        let first = self
            .read_all()?
            .into_iter()
            .find(|doc| matches_filter(doc, filter));

        match first {
            Some(doc) => Ok(Some(self.finalize(doc, projection, expansions)?)),
            None => Ok(None),
        }
    }

    async fn count(&self, filter: &JsonObject) -> Result<u64, StoreError> {
        Ok(self
            .read_all()?
            .iter()
            .filter(|doc| matches_filter(doc, filter))
            .count() as u64)
    }

    async fn insert_one(&self, mut document: JsonObject) -> Result<Value, StoreError> {
        let mut collections = self.collections.write().map_err(lock_error)?;
        let docs = collections.entry(self.collection.clone()).or_default();

        document
            .entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

        self.check_unique(docs, &document, None)?;

        docs.push(document.clone());
        Ok(Value::Object(document))
    }

    async fn update_one(
        &self,
        filter: &JsonObject,
        changes: JsonObject,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().map_err(lock_error)?;
        let docs = collections.entry(self.collection.clone()).or_default();

        let Some(index) = docs.iter().position(|doc| matches_filter(doc, filter)) else {
            return Ok(None);
        };

        let mut updated = docs[index].clone();
        for (key, value) in changes {
            updated.insert(key, value);
        }

        self.check_unique(docs, &updated, Some(index))?;

        docs[index] = updated.clone();
        Ok(Some(Value::Object(updated)))
    }

    async fn delete_many(&self, filter: &JsonObject) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().map_err(lock_error)?;
        let docs = collections.entry(self.collection.clone()).or_default();

        let before = docs.len();
        docs.retain(|doc| !matches_filter(doc, filter));

        Ok((before - docs.len()) as u64)
    }

    async fn exists(&self, filter: &JsonObject) -> Result<bool, StoreError> {
        Ok(self
            .read_all()?
            .iter()
            .any(|doc| matches_filter(doc, filter)))
    }
}

fn lock_error<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend {
        message: format!("Failed to acquire collection lock: {}", err),
    }
}

/// Equality match of a document against a filter.
///
/// Filter values arriving as strings (residual query-string filters) also
/// match the native-typed value they parse to, so `"42"` matches the
/// integer 42 and `"true"` matches the boolean true.
fn matches_filter(document: &JsonObject, filter: &JsonObject) -> bool {
    filter.iter().all(|(key, expected)| {
        let Some(actual) = document.get(key) else {
            return false;
        };
        if actual == expected {
            return true;
        }
        match expected.as_str() {
            Some(text) => coerced_variants(text).iter().any(|v| actual == v),
            None => false,
        }
    })
}

/// Native-type variants of a string filter value
fn coerced_variants(text: &str) -> Vec<Value> {
    let mut variants = Vec::new();
    match text {
        "true" => variants.push(Value::Bool(true)),
        "false" => variants.push(Value::Bool(false)),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                variants.push(Value::from(i));
            }
            if text.contains('.')
                && let Ok(f) = text.parse::<f64>()
            {
                variants.push(Value::from(f));
            }
        }
    }
    variants
}

fn sort_documents(documents: &mut [JsonObject], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for key in keys {
            let ordering = compare_values(a.get(&key.field), b.get(&key.field));
            let ordering = match key.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Total order over JSON values for sorting: absent < null < bool < number
/// < string; anything else compares by its serialized form.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal => {
                let x = a.map(Value::to_string).unwrap_or_default();
                let y = b.map(Value::to_string).unwrap_or_default();
                x.cmp(&y)
            }
            ordering => ordering,
        },
    }
}
