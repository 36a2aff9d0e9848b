//! Core module: the generic query-resolution engine

pub mod context;
pub mod engine;
pub mod error;
pub mod populate;
pub mod query;
pub mod response;
pub mod schema;
pub mod store;

pub use context::{Environment, ErrorMode, OperationContext};
pub use engine::CrudService;
pub use error::CrudError;
pub use populate::{Expansion, PopulateDirective, PopulateNode};
pub use query::{QueryDirective, SortKey, SortOrder};
pub use response::{OperationSuccess, ResponseEnvelope, SuccessKind};
pub use schema::{
    FieldDescriptor, FieldFormat, FieldKind, ModelBinding, Projection, Schema, SchemaRegistry,
};
pub use store::{DocumentStore, FindSpec, JsonObject, StoreError};
