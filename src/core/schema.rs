//! Typed schema descriptors and model bindings
//!
//! Callers describe a collection as an explicit field-descriptor table
//! (name, primitive kind, constraints) consumed by [`Schema::builder`].
//! Storage backends bind a [`Schema`] to a live collection handle, producing
//! the [`ModelBinding`] every CRUD operation consumes.
//!
//! Relation fields are declared with [`FieldKind::Reference`]; the target
//! collection name is what population resolution hands to the backend.
//!
//! Only field *presence* is enforced by the engine (missing required fields
//! on insert). Kinds and formats are declarative metadata for backends
//! (unique-index bootstrap, value coercion), not a validation layer.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::core::store::{DocumentStore, JsonObject};

/// Primitive kind of a schema field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Uuid,
    /// Foreign reference to a document in another collection.
    ///
    /// The field holds the referenced document's id; population replaces it
    /// with the document itself.
    Reference {
        collection: String,
    },
}

/// Optional format constraint on a string field
#[derive(Debug, Clone)]
pub enum FieldFormat {
    Email,
    Url,
    Custom(Regex),
}

impl FieldFormat {
    /// Check a JSON value against this format.
    ///
    /// Non-string values never match a format.
    pub fn matches(&self, value: &Value) -> bool {
        let Some(text) = value.as_str() else {
            return false;
        };

        match self {
            FieldFormat::Email => {
                static EMAIL: OnceLock<Regex> = OnceLock::new();
                EMAIL
                    .get_or_init(|| {
                        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
                    })
                    .is_match(text)
            }
            FieldFormat::Url => {
                static URL: OnceLock<Regex> = OnceLock::new();
                URL.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap())
                    .is_match(text)
            }
            FieldFormat::Custom(regex) => regex.is_match(text),
        }
    }
}

/// One entry of the field-descriptor table
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub format: Option<FieldFormat>,
}

impl FieldDescriptor {
    /// Optional, non-unique field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            format: None,
        }
    }

    /// Mark the field as required on insert
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as unique.
    ///
    /// Backends translate this into their authoritative uniqueness guard
    /// (a unique index); the engine's pre-insert check is best-effort only.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Attach a format constraint
    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Field-descriptor table for one collection
#[derive(Debug, Clone)]
pub struct Schema {
    collection: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Start building a schema for the given collection name
    pub fn builder(collection: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            collection: collection.into(),
            fields: Vec::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Target collection of a relation field, if `path` is one
    pub fn relation_target(&self, path: &str) -> Option<&str> {
        match self.field(path).map(|f| &f.kind) {
            Some(FieldKind::Reference { collection }) => Some(collection),
            _ => None,
        }
    }

    /// Names of fields declared unique
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.unique).map(|f| f.name.as_str())
    }

    /// Required fields absent (or null) in `document`.
    ///
    /// This is the only validation the engine performs before an insert.
    pub fn missing_required(&self, document: &JsonObject) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| matches!(document.get(&f.name), None | Some(Value::Null)))
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Builder for [`Schema`]
#[derive(Debug)]
pub struct SchemaBuilder {
    collection: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    /// Add a field descriptor
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Shorthand for a reference field
    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldKind::Reference {
                collection: target.into(),
            },
        ))
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            collection: self.collection,
            fields: self.fields,
        })
    }
}

/// Name-keyed registry of schemas.
///
/// Backends consult it when a nested expansion crosses into another
/// collection (e.g. `category` → `parent`).
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its collection name
    pub fn register(&mut self, schema: Arc<Schema>) {
        self.schemas.insert(schema.collection().to_string(), schema);
    }

    pub fn get(&self, collection: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(collection)
    }
}

/// Field projection: which fields a returned document exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only the listed fields (plus the document id)
    Include(Vec<String>),
    /// Keep everything except the listed fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Combine a request-level allow-list with the binding's default.
    ///
    /// An explicit request-level `fields` list wins outright; otherwise the
    /// binding default applies; otherwise no projection.
    pub fn effective(
        requested: Option<&Vec<String>>,
        default: Option<&Projection>,
    ) -> Option<Projection> {
        match requested {
            Some(fields) => Some(Projection::Include(fields.clone())),
            None => default.cloned(),
        }
    }

    /// Apply the projection to a document in place.
    ///
    /// Include keeps the `id` field alongside the listed ones, mirroring
    /// the document-store convention of always returning the primary key.
    pub fn apply(&self, document: &mut JsonObject) {
        match self {
            Projection::Include(fields) => {
                document.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
            }
            Projection::Exclude(fields) => {
                document.retain(|key, _| !fields.iter().any(|f| f == key));
            }
        }
    }
}

/// Caller-owned pairing of a store handle with its schema and default
/// projection policy.
///
/// The engine only consumes bindings; constructing one is the backend's
/// `bind` helper's job.
#[derive(Clone)]
pub struct ModelBinding {
    pub store: Arc<dyn DocumentStore>,
    pub schema: Arc<Schema>,
    /// Projection applied when the request supplies no `fields` allow-list
    /// (e.g. exclude secrets by default)
    pub default_projection: Option<Projection>,
}

impl ModelBinding {
    pub fn new(store: Arc<dyn DocumentStore>, schema: Arc<Schema>) -> Self {
        Self {
            store,
            schema,
            default_projection: None,
        }
    }

    /// Set the default projection policy
    pub fn with_default_projection(mut self, projection: Projection) -> Self {
        self.default_projection = Some(projection);
        self
    }
}
