//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides [`MongoBackend`] and the per-collection [`MongoStore`] handle
//! backed by a `mongodb::Database`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! crudkit = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Collection-per-schema: each bound schema operates on the collection named
//! by `Schema::collection()`. Relation expansion runs as an aggregation
//! pipeline of `$lookup`/`$unwind` stages; a nested expansion becomes a
//! sub-`$lookup` inside the pipeline form, so the two-level contract maps to
//! exactly one pipeline per expansion.
//!
//! # Serialization strategy
//!
//! Documents cross the engine boundary as `serde_json` values and are
//! converted to BSON here. The `id` field maps to MongoDB's `_id`
//! convention in documents, filters, sort keys, and projections.
//!
//! String filter values (residual query-string filters) are matched with
//! `$in` over the string plus its parsed native variants, so `"42"` matches
//! documents storing the integer 42.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ReturnDocument;
use std::sync::{Arc, RwLock};

use crate::core::populate::Expansion;
use crate::core::query::{SortKey, SortOrder};
use crate::core::schema::{ModelBinding, Projection, Schema, SchemaRegistry};
use crate::core::store::{DocumentStore, FindSpec, JsonObject, StoreError};

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// MongoDB's duplicate-key error codes
const DUPLICATE_KEY_CODES: [i32; 2] = [11000, 11001];

/// Rename a field key for the store side: `id` → `_id`
fn store_key(key: &str) -> String {
    if key == "id" { "_id".to_string() } else { key.to_string() }
}

/// Convert an engine document into a BSON document, renaming `id` → `_id`.
fn json_to_document(json: &JsonObject) -> Result<Document, StoreError> {
    let bson_val =
        mongodb::bson::to_bson(json).map_err(|e| StoreError::InvalidValue {
            message: format!("Failed to convert JSON to BSON: {}", e),
        })?;

    let mut document = match bson_val {
        Bson::Document(d) => d,
        _ => {
            return Err(StoreError::InvalidValue {
                message: "Expected BSON document, got non-object".to_string(),
            });
        }
    };

    if let Some(id) = document.remove("id") {
        document.insert("_id", id);
    }

    Ok(document)
}

/// Convert a BSON document back into a JSON value, renaming `_id` → `id`.
fn document_to_json(mut document: Document) -> serde_json::Value {
    if let Some(id) = document.remove("_id") {
        document.insert("id", id);
    }

    Bson::Document(document).into_relaxed_extjson()
}

/// Build the BSON filter for an engine filter.
///
/// String values match their native-typed variants through `$in`; other
/// values convert directly.
fn filter_to_document(filter: &JsonObject) -> Result<Document, StoreError> {
    let mut document = Document::new();

    for (key, value) in filter {
        let key = store_key(key);
        match value.as_str() {
            Some(text) => {
                let mut variants: Vec<Bson> = vec![Bson::String(text.to_string())];
                match text {
                    "true" => variants.push(Bson::Boolean(true)),
                    "false" => variants.push(Bson::Boolean(false)),
                    _ => {
                        if let Ok(i) = text.parse::<i64>() {
                            variants.push(Bson::Int64(i));
                        }
                        if text.contains('.')
                            && let Ok(f) = text.parse::<f64>()
                        {
                            variants.push(Bson::Double(f));
                        }
                    }
                }
                if variants.len() == 1 {
                    document.insert(key, variants.into_iter().next().unwrap());
                } else {
                    document.insert(key, doc! { "$in": variants });
                }
            }
            None => {
                let bson = mongodb::bson::to_bson(value).map_err(|e| StoreError::InvalidValue {
                    message: format!("Failed to convert filter value: {}", e),
                })?;
                document.insert(key, bson);
            }
        }
    }

    Ok(document)
}

fn sort_to_document(keys: &[SortKey]) -> Document {
    let mut document = Document::new();
    for key in keys {
        let direction = match key.order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        };
        document.insert(store_key(&key.field), direction);
    }
    document
}

fn projection_to_document(projection: &Projection) -> Document {
    let mut document = Document::new();
    match projection {
        Projection::Include(fields) => {
            for field in fields {
                document.insert(store_key(field), 1);
            }
        }
        Projection::Exclude(fields) => {
            for field in fields {
                document.insert(store_key(field), 0);
            }
        }
    }
    document
}

/// Map a driver error into a store error, keeping the duplicate-key and
/// BSON-cast signals the classifier needs.
fn map_mongo_error(context: &str, err: mongodb::error::Error) -> StoreError {
    use mongodb::error::{ErrorKind, WriteFailure};

    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_err))
            if DUPLICATE_KEY_CODES.contains(&write_err.code) =>
        {
            StoreError::DuplicateKey {
                message: write_err.message.clone(),
            }
        }
        ErrorKind::Command(command_err) if DUPLICATE_KEY_CODES.contains(&command_err.code) => {
            StoreError::DuplicateKey {
                message: command_err.message.clone(),
            }
        }
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::InvalidValue {
                message: format!("{}: {}", context, err),
            }
        }
        _ => StoreError::Backend {
            message: format!("{}: {}", context, err),
        },
    }
}

// ---------------------------------------------------------------------------
// MongoBackend
// ---------------------------------------------------------------------------

/// MongoDB-backed document store.
///
/// Holds the database handle and the schema registry that nested expansions
/// resolve against. [`MongoBackend::bind`] hands out per-collection
/// [`ModelBinding`]s.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use crudkit::storage::MongoBackend;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let backend = MongoBackend::new(client.database("mydb"));
/// let posts = backend.bind(post_schema);
/// ```
#[derive(Clone)]
pub struct MongoBackend {
    database: Database,
    registry: Arc<RwLock<SchemaRegistry>>,
}

impl MongoBackend {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            registry: Arc::new(RwLock::new(SchemaRegistry::new())),
        }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Create unique indexes for every unique field of `schema`.
    ///
    /// The unique index is the authoritative uniqueness guard; the engine's
    /// pre-insert check only narrows the race window. Idempotent, safe to
    /// call on every startup.
    pub async fn ensure_indexes(&self, schema: &Schema) -> Result<(), StoreError> {
        use mongodb::IndexModel;
        use mongodb::options::IndexOptions;

        let indexes: Vec<IndexModel> = schema
            .unique_fields()
            .map(|field| {
                IndexModel::builder()
                    .keys(doc! { store_key(field): 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build()
            })
            .collect();

        if indexes.is_empty() {
            return Ok(());
        }

        self.database
            .collection::<Document>(schema.collection())
            .create_indexes(indexes)
            .await
            .map_err(|e| map_mongo_error("Failed to create unique indexes", e))?;

        Ok(())
    }

    /// Register the schema and bind it to its collection.
    pub fn bind(&self, schema: Arc<Schema>) -> ModelBinding {
        if let Ok(mut registry) = self.registry.write() {
            registry.register(schema.clone());
        }

        let store = MongoStore {
            database: self.database.clone(),
            schema: schema.clone(),
            registry: self.registry.clone(),
        };

        ModelBinding::new(Arc::new(store), schema)
    }
}

/// Per-collection store handle produced by [`MongoBackend::bind`]
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    schema: Arc<Schema>,
    registry: Arc<RwLock<SchemaRegistry>>,
}

impl MongoStore {
    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection(self.schema.collection())
    }

    /// Target collection of an expansion, from this store's schema
    fn expansion_target(&self, path: &str) -> Result<String, StoreError> {
        self.schema
            .relation_target(path)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidValue {
                message: format!(
                    "unknown relation path '{}' on {}",
                    path,
                    self.schema.collection()
                ),
            })
    }

    /// `$lookup` + `$unwind` stages for one resolved expansion.
    ///
    /// The pipeline form carries the nested level and field selection, so
    /// the bounded two-level contract maps to exactly one lookup stage pair.
    fn expansion_stages(&self, expansion: &Expansion) -> Result<Vec<Document>, StoreError> {
        let target = self.expansion_target(&expansion.path)?;

        let mut inner: Vec<Document> = vec![doc! {
            "$match": { "$expr": { "$eq": ["$_id", "$$ref_id"] } }
        }];

        if let Some(nested) = &expansion.nested {
            let registry = self.registry.read().map_err(|e| StoreError::Backend {
                message: format!("Failed to acquire registry lock: {}", e),
            })?;
            let target_schema = registry.get(&target).ok_or_else(|| StoreError::InvalidValue {
                message: format!("no schema registered for '{}'", target),
            })?;
            let nested_target = target_schema
                .relation_target(&nested.path)
                .ok_or_else(|| StoreError::InvalidValue {
                    message: format!("unknown relation path '{}' on {}", nested.path, target),
                })?
                .to_string();
            drop(registry);

            inner.push(doc! {
                "$lookup": {
                    "from": nested_target,
                    "localField": nested.path.clone(),
                    "foreignField": "_id",
                    "as": nested.path.clone(),
                }
            });
            inner.push(doc! {
                "$unwind": {
                    "path": format!("${}", nested.path),
                    "preserveNullAndEmptyArrays": true,
                }
            });
            if let Some(select) = &nested.select {
                inner.push(doc! {
                    "$project": projection_to_document(&Projection::Include(select.clone())),
                });
            }
        }

        if let Some(select) = &expansion.select {
            inner.push(doc! {
                "$project": projection_to_document(&Projection::Include(select.clone())),
            });
        }

        Ok(vec![
            doc! {
                "$lookup": {
                    "from": target,
                    "let": { "ref_id": format!("${}", expansion.path) },
                    "pipeline": inner,
                    "as": expansion.path.clone(),
                }
            },
            doc! {
                "$unwind": {
                    "path": format!("${}", expansion.path),
                    "preserveNullAndEmptyArrays": true,
                }
            },
        ])
    }

    /// Run a find as an aggregation pipeline (required for expansions)
    async fn find_with_pipeline(
        &self,
        filter: Document,
        spec: &FindSpec,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let mut pipeline: Vec<Document> = vec![doc! { "$match": filter }];

        if !spec.sort.is_empty() {
            pipeline.push(doc! { "$sort": sort_to_document(&spec.sort) });
        }
        if spec.skip > 0 {
            pipeline.push(doc! { "$skip": spec.skip as i64 });
        }
        if let Some(limit) = spec.limit {
            pipeline.push(doc! { "$limit": limit as i64 });
        }
        for expansion in &spec.expansions {
            pipeline.extend(self.expansion_stages(expansion)?);
        }
        if let Some(projection) = &spec.projection {
            pipeline.push(doc! { "$project": projection_to_document(projection) });
        }

        let cursor = self
            .collection()
            .aggregate(pipeline)
            .await
            .map_err(|e| map_mongo_error("Failed to run expansion pipeline", e))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_mongo_error("Failed to collect pipeline results", e))?;

        Ok(documents.into_iter().map(document_to_json).collect())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        filter: &JsonObject,
        spec: &FindSpec,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let filter = filter_to_document(filter)?;

        if !spec.expansions.is_empty() {
            return self.find_with_pipeline(filter, spec).await;
        }

        let mut find = self.collection().find(filter);
        if !spec.sort.is_empty() {
            find = find.sort(sort_to_document(&spec.sort));
        }
        if spec.skip > 0 {
            find = find.skip(spec.skip);
        }
        if let Some(limit) = spec.limit {
            find = find.limit(limit as i64);
        }
        if let Some(projection) = &spec.projection {
            find = find.projection(projection_to_document(projection));
        }

        let cursor = find
            .await
            .map_err(|e| map_mongo_error("Failed to find documents", e))?;

        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_mongo_error("Failed to collect documents", e))?;

        Ok(documents.into_iter().map(document_to_json).collect())
    }

    async fn find_one(
        &self,
        filter: &JsonObject,
        projection: Option<&Projection>,
        expansions: &[Expansion],
    ) -> Result<Option<serde_json::Value>, StoreError> {
        if !expansions.is_empty() {
            let spec = FindSpec {
                skip: 0,
                limit: Some(1),
                sort: Vec::new(),
                projection: projection.cloned(),
                expansions: expansions.to_vec(),
            };
            let filter = filter_to_document(filter)?;
            return Ok(self.find_with_pipeline(filter, &spec).await?.into_iter().next());
        }

        let mut find_one = self.collection().find_one(filter_to_document(filter)?);
        if let Some(projection) = projection {
            find_one = find_one.projection(projection_to_document(projection));
        }

        let document = find_one
            .await
            .map_err(|e| map_mongo_error("Failed to find document", e))?;

        Ok(document.map(document_to_json))
    }

    async fn count(&self, filter: &JsonObject) -> Result<u64, StoreError> {
        self.collection()
            .count_documents(filter_to_document(filter)?)
            .await
            .map_err(|e| map_mongo_error("Failed to count documents", e))
    }

    async fn insert_one(&self, document: JsonObject) -> Result<serde_json::Value, StoreError> {
        let document = json_to_document(&document)?;

        let result = self
            .collection()
            .insert_one(document)
            .await
            .map_err(|e| map_mongo_error("Failed to insert document", e))?;

        // Read back the stored version
        let stored = self
            .collection()
            .find_one(doc! { "_id": result.inserted_id })
            .await
            .map_err(|e| map_mongo_error("Failed to read back created document", e))?
            .ok_or_else(|| StoreError::Backend {
                message: "Document not found after insert".to_string(),
            })?;

        Ok(document_to_json(stored))
    }

    async fn update_one(
        &self,
        filter: &JsonObject,
        changes: JsonObject,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let update = doc! { "$set": json_to_document(&changes)? };

        let updated = self
            .collection()
            .find_one_and_update(filter_to_document(filter)?, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_mongo_error("Failed to update document", e))?;

        Ok(updated.map(document_to_json))
    }

    async fn delete_many(&self, filter: &JsonObject) -> Result<u64, StoreError> {
        let result = self
            .collection()
            .delete_many(filter_to_document(filter)?)
            .await
            .map_err(|e| map_mongo_error("Failed to delete documents", e))?;

        Ok(result.deleted_count)
    }

    async fn exists(&self, filter: &JsonObject) -> Result<bool, StoreError> {
        let document = self
            .collection()
            .find_one(filter_to_document(filter)?)
            .projection(doc! { "_id": 1 })
            .await
            .map_err(|e| map_mongo_error("Failed to check existence", e))?;

        Ok(document.is_some())
    }
}
