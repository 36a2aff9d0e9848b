//! Normalized response envelopes
//!
//! Every operation outcome, success or classified failure, is mapped to
//! one fixed envelope shape before it reaches the wire:
//!
//! ```json
//! // success
//! { "message": "...", "data": ..., "success": true, "doc_length": 12 }
//! // failure
//! { "message": "...", "error": "NOT_FOUND", "success": false, "stack": {...} }
//! ```
//!
//! `doc_length` and `stack` are structurally absent when unset: omitted
//! from the JSON entirely, never serialized as null. `stack` exists only in
//! the development environment, so production responses leak no diagnostic
//! structure.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::context::{Environment, ErrorMode, OperationContext};
use crate::core::error::CrudError;

/// What kind of operation succeeded; decides the success status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessKind {
    /// A document was inserted → 201
    Created,
    /// A read completed → 200
    Fetched,
    /// A document was updated → 200
    Updated,
    /// Documents were removed → 200
    Deleted,
}

impl SuccessKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SuccessKind::Created => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }
}

/// Successful operation outcome, before normalization
#[derive(Debug, Clone)]
pub struct OperationSuccess {
    pub kind: SuccessKind,
    pub message: String,
    pub data: Value,
    /// Total matching-document count (`get_many` only)
    pub doc_count: Option<u64>,
}

impl OperationSuccess {
    pub fn new(kind: SuccessKind, message: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            message: message.into(),
            data,
            doc_count: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.doc_count = Some(count);
        self
    }
}

/// The fixed wire envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub message: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Diagnostic payload; present only when environment = development
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Value>,
}

impl ResponseEnvelope {
    /// Envelope for a successful outcome
    pub fn success(outcome: &OperationSuccess) -> Self {
        Self {
            message: outcome.message.clone(),
            success: true,
            data: Some(outcome.data.clone()),
            doc_length: outcome.doc_count,
            error: None,
            stack: None,
        }
    }

    /// Envelope for a classified failure.
    ///
    /// The `stack` field is attached only in development; in production it
    /// is absent from the struct, and therefore from the JSON.
    pub fn failure(err: &CrudError, environment: Environment) -> Self {
        Self {
            message: err.to_string(),
            success: false,
            data: None,
            doc_length: None,
            error: Some(err.error_code().to_string()),
            stack: environment.is_development().then(|| err.diagnostic()),
        }
    }
}

/// Write a successful outcome to the response sink
pub fn respond_success(outcome: &OperationSuccess) -> Response {
    let envelope = ResponseEnvelope::success(outcome);
    (outcome.kind.status_code(), Json(envelope)).into_response()
}

/// Global error-normalization entry point.
///
/// Pure function of (error, environment): callable from any request context,
/// no retained state. Writes the classified status and failure envelope.
pub fn respond_with_error(err: &CrudError, environment: Environment) -> Response {
    let envelope = ResponseEnvelope::failure(err, environment);
    (err.status_code(), Json(envelope)).into_response()
}

/// Normalize an operation outcome according to the context.
///
/// Success always becomes a written envelope. Failure either becomes a
/// written envelope (`ErrorMode::Respond`) or is returned to the caller's
/// own error chain (`ErrorMode::Delegate`).
pub fn respond(
    outcome: Result<OperationSuccess, CrudError>,
    ctx: &OperationContext,
) -> Result<Response, CrudError> {
    match outcome {
        Ok(success) => Ok(respond_success(&success)),
        Err(err) => match ctx.error_mode {
            ErrorMode::Respond => Ok(respond_with_error(&err, ctx.environment)),
            ErrorMode::Delegate => Err(err),
        },
    }
}
