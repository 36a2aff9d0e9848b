//! # crudkit
//!
//! A generic CRUD convenience layer between an HTTP framework and a
//! document-database client.
//!
//! ## Features
//!
//! - **Query resolution**: raw query strings become typed directives for
//!   pagination, sort, field allow-lists, and residual equality filters
//! - **Population**: declarative relation expansion (single or multi-path,
//!   with nested selection) translated to the store's native joins
//! - **Five CRUD operations**: create (with duplicate pre-check), get-one,
//!   get-many (with total count), update, delete
//! - **Normalized envelopes**: one fixed success/failure response shape,
//!   with environment-gated diagnostics
//! - **Typed error taxonomy**: NotFound / Duplicate / Validation / Unknown,
//!   each with its HTTP status
//! - **Pluggable storage**: in-memory backend for development and tests,
//!   MongoDB behind the `mongodb_backend` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crudkit::prelude::*;
//!
//! let backend = InMemoryBackend::new();
//! let posts = CrudService::new(
//!     backend
//!         .bind(
//!             Schema::builder("posts")
//!                 .field(FieldDescriptor::new("title", FieldKind::String).required())
//!                 .field(FieldDescriptor::new("likes", FieldKind::Integer))
//!                 .reference("author", "users")
//!                 .build(),
//!         )
//!         .with_default_projection(Projection::Exclude(vec!["draft_notes".into()])),
//! );
//!
//! // GET /posts?page=2&limit=5&sort=-likes&author=42
//! let ctx = OperationContext::new(Environment::Development);
//! let directive = QueryDirective::parse(query_pairs);
//! let response = posts
//!     .dispatch_get_many(&ctx, JsonObject::new(), &directive, None)
//!     .await;
//! ```

pub mod config;
pub mod core;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        context::{Environment, ErrorMode, OperationContext},
        engine::CrudService,
        error::CrudError,
        populate::{PopulateDirective, PopulateNode},
        query::{QueryDirective, SortKey, SortOrder},
        response::{
            OperationSuccess, ResponseEnvelope, SuccessKind, respond, respond_with_error,
        },
        schema::{
            FieldDescriptor, FieldFormat, FieldKind, ModelBinding, Projection, Schema,
            SchemaRegistry,
        },
        store::{DocumentStore, FindSpec, JsonObject, StoreError},
    };

    // === Config ===
    pub use crate::config::AppConfig;

    // === Storage ===
    pub use crate::storage::InMemoryBackend;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoBackend;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        response::IntoResponse,
        routing::{delete, get, post, put},
    };
}
