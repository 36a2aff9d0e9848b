//! Store capability trait consumed by the CRUD engine
//!
//! The engine is agnostic to the underlying document store. Anything that
//! can filter, sort, paginate, project, count, and expand relations can back
//! a [`ModelBinding`](crate::core::schema::ModelBinding). Backends live in
//! [`crate::storage`].
//!
//! Documents cross this boundary as `serde_json` values; backends convert
//! to and from their native representation (e.g. BSON).

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::core::populate::Expansion;
use crate::core::query::SortKey;
use crate::core::schema::Projection;

/// A JSON object: the interchange form of a document or filter
pub type JsonObject = serde_json::Map<String, Value>;

/// Failure reported by a storage backend.
///
/// Carries just enough signal for the error classifier: a duplicate-key
/// violation, a value the store rejected (cast/validation), or anything
/// else the backend could not do.
#[derive(Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write
    DuplicateKey { message: String },

    /// The store rejected a value (type cast, unknown relation path, …)
    InvalidValue { message: String },

    /// Any other backend failure
    Backend { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateKey { message } => {
                write!(f, "Duplicate key: {}", message)
            }
            StoreError::InvalidValue { message } => {
                write!(f, "Invalid value: {}", message)
            }
            StoreError::Backend { message } => {
                write!(f, "Storage backend error: {}", message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Fully-resolved read specification for a paged find
#[derive(Debug, Clone, Default)]
pub struct FindSpec {
    /// Documents to skip before the page starts
    pub skip: u64,

    /// Page size; `None` disables pagination
    pub limit: Option<u64>,

    /// Sort keys, applied in order
    pub sort: Vec<SortKey>,

    /// Effective projection, if any
    pub projection: Option<Projection>,

    /// Relation expansions to perform on each returned document
    pub expansions: Vec<Expansion>,
}

/// Capability trait for a single collection of documents.
///
/// All operations are async and single-shot; the engine performs no retries
/// and expects none from the backend. Filters are equality mappings whose
/// values the backend may coerce to native types.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find documents matching `filter`, honoring the full read spec
    async fn find(&self, filter: &JsonObject, spec: &FindSpec) -> Result<Vec<Value>, StoreError>;

    /// Find a single document, with optional projection and expansions
    async fn find_one(
        &self,
        filter: &JsonObject,
        projection: Option<&Projection>,
        expansions: &[Expansion],
    ) -> Result<Option<Value>, StoreError>;

    /// Count documents matching `filter`, ignoring pagination
    async fn count(&self, filter: &JsonObject) -> Result<u64, StoreError>;

    /// Insert one document and return the stored version
    async fn insert_one(&self, document: JsonObject) -> Result<Value, StoreError>;

    /// Atomically update the first document matching `filter` and return
    /// the post-update document, or `None` if nothing matched
    async fn update_one(
        &self,
        filter: &JsonObject,
        changes: JsonObject,
    ) -> Result<Option<Value>, StoreError>;

    /// Delete every document matching `filter`, returning the removed count
    async fn delete_many(&self, filter: &JsonObject) -> Result<u64, StoreError>;

    /// Whether at least one document matches `filter`
    async fn exists(&self, filter: &JsonObject) -> Result<bool, StoreError>;
}
