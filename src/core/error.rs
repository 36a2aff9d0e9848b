//! Typed error taxonomy for CRUD operations
//!
//! Every failure an operation can produce maps to exactly one [`CrudError`]
//! kind. Store-layer failures go through [`CrudError::classify`], which is
//! total: anything without a recognizable signal lands on `Unknown`.
//!
//! # Taxonomy
//!
//! - [`CrudError::NotFound`] — zero matches for a targeted lookup/update/delete
//! - [`CrudError::Duplicate`] — pre-insert existence check matched, or the
//!   store's unique constraint rejected the write
//! - [`CrudError::Validation`] — store-level cast/validation rejection, or a
//!   missing required field
//! - [`CrudError::Unknown`] — unclassified underlying failure
//!
//! # Example
//!
//! ```rust,ignore
//! match service.get_one(&ctx, filter, None).await {
//!     Ok(success) => { /* ... */ }
//!     Err(CrudError::NotFound { resource }) => {
//!         println!("no {} matched", resource);
//!     }
//!     Err(e) => eprintln!("operation failed: {}", e),
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

use crate::core::context::Environment;
use crate::core::store::StoreError;

/// Classified failure of a CRUD operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    /// No document matched a targeted lookup, update, or delete
    NotFound { resource: String },

    /// The entity already exists
    ///
    /// `detail` carries the store's duplicate-key message when the unique
    /// index (rather than the pre-insert check) caught the conflict.
    Duplicate {
        resource: String,
        detail: Option<String>,
    },

    /// The store or schema rejected the supplied values
    Validation { message: String },

    /// Anything the classifier could not recognize
    Unknown { message: String },
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudError::NotFound { resource } => {
                write!(f, "No matching {} found", resource)
            }
            CrudError::Duplicate { resource, .. } => {
                write!(f, "{} already exists", resource)
            }
            CrudError::Validation { message } => {
                write!(f, "Validation failure: {}", message)
            }
            CrudError::Unknown { message } => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for CrudError {}

impl CrudError {
    /// Map a store-layer failure into the taxonomy.
    ///
    /// Classification is total: duplicate-key signal → `Duplicate`,
    /// invalid-value signal → `Validation`, everything else → `Unknown`.
    /// `resource` is the collection the failing operation targeted.
    pub fn classify(resource: &str, err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { message } => CrudError::Duplicate {
                resource: resource.to_string(),
                detail: Some(message),
            },
            StoreError::InvalidValue { message } => CrudError::Validation { message },
            StoreError::Backend { message } => CrudError::Unknown { message },
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::NotFound { .. } => StatusCode::NOT_FOUND,
            CrudError::Duplicate { .. } => StatusCode::CONFLICT,
            CrudError::Validation { .. } => StatusCode::BAD_REQUEST,
            CrudError::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::NotFound { .. } => "NOT_FOUND",
            CrudError::Duplicate { .. } => "DUPLICATE_ENTITY",
            CrudError::Validation { .. } => "VALIDATION_FAILURE",
            CrudError::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Diagnostic payload surfaced in development environments
    pub fn diagnostic(&self) -> serde_json::Value {
        let detail = match self {
            CrudError::Duplicate { detail, .. } => detail.clone(),
            _ => None,
        };
        serde_json::json!({
            "kind": self.error_code(),
            "error": format!("{:?}", self),
            "detail": detail,
        })
    }
}

/// Delegate-mode integration with axum's error chain.
///
/// A `CrudError` bubbling out of a handler renders the production-shaped
/// failure envelope (no diagnostic payload). Direct-write mode goes through
/// [`respond_with_error`](crate::core::response::respond_with_error)
/// instead, which honors the environment.
impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        crate::core::response::respond_with_error(&self, Environment::Production)
    }
}
