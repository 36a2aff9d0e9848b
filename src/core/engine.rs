//! The five CRUD operations
//!
//! [`CrudService`] composes the query directive, population resolution,
//! projection policy, and the store capability trait into single-shot
//! operations. Every operation takes the caller's [`OperationContext`] and
//! returns either an [`OperationSuccess`] for the normalizer or a classified
//! [`CrudError`]. Nothing is retried and no failure is recovered silently.
//!
//! The `dispatch_*` variants run the operation and normalization in one
//! call, honoring the context's error propagation mode. That is the shape a
//! route handler usually wants:
//!
//! ```rust,ignore
//! async fn list_posts(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
//!     let directive = QueryDirective::parse(parse_pairs(&query));
//!     state
//!         .posts
//!         .dispatch_get_many(&state.ctx, JsonObject::new(), &directive, None)
//!         .await
//!         .unwrap_or_else(IntoResponse::into_response)
//! }
//! ```

use axum::response::Response;
use serde_json::Value;

use crate::core::context::OperationContext;
use crate::core::error::CrudError;
use crate::core::populate::{self, PopulateDirective};
use crate::core::query::QueryDirective;
use crate::core::response::{self, OperationSuccess, SuccessKind};
use crate::core::schema::{ModelBinding, Projection};
use crate::core::store::{FindSpec, JsonObject};

/// CRUD operations over one model binding
#[derive(Clone)]
pub struct CrudService {
    binding: ModelBinding,
}

impl CrudService {
    pub fn new(binding: ModelBinding) -> Self {
        Self { binding }
    }

    /// The bound collection name, used in messages and classification
    fn resource(&self) -> &str {
        self.binding.schema.collection()
    }

    fn classify(&self, err: crate::core::store::StoreError) -> CrudError {
        CrudError::classify(self.resource(), err)
    }

    /// Insert a document.
    ///
    /// When `check` is supplied, an existence lookup over those fields runs
    /// first; a match fails the operation with `Duplicate` before any write.
    /// The check is best-effort; the store's unique index remains the
    /// authoritative guard against the check/insert race.
    ///
    /// Required-field presence is the only validation applied to `data`.
    pub async fn create(
        &self,
        _ctx: &OperationContext,
        data: JsonObject,
        check: Option<JsonObject>,
    ) -> Result<OperationSuccess, CrudError> {
        tracing::debug!(collection = self.resource(), "create");

        if let Some(check) = check
            && !check.is_empty()
        {
            let exists = self
                .binding
                .store
                .exists(&check)
                .await
                .map_err(|e| self.classify(e))?;
            if exists {
                return Err(CrudError::Duplicate {
                    resource: self.resource().to_string(),
                    detail: None,
                });
            }
        }

        let missing = self.binding.schema.missing_required(&data);
        if !missing.is_empty() {
            return Err(CrudError::Validation {
                message: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        let created = self
            .binding
            .store
            .insert_one(data)
            .await
            .map_err(|e| self.classify(e))?;

        Ok(OperationSuccess::new(
            SuccessKind::Created,
            format!("{} created", self.resource()),
            created,
        ))
    }

    /// Fetch a single document by filter.
    ///
    /// Applies the binding's default projection and any population
    /// directive. Zero matches is `NotFound`.
    pub async fn get_one(
        &self,
        _ctx: &OperationContext,
        filter: JsonObject,
        populate: Option<&PopulateDirective>,
    ) -> Result<OperationSuccess, CrudError> {
        tracing::debug!(collection = self.resource(), "get_one");

        let projection = self.binding.default_projection.clone();
        let expansions = populate::resolve(populate);

        let document = self
            .binding
            .store
            .find_one(&filter, projection.as_ref(), &expansions)
            .await
            .map_err(|e| self.classify(e))?
            .ok_or_else(|| CrudError::NotFound {
                resource: self.resource().to_string(),
            })?;

        Ok(OperationSuccess::new(
            SuccessKind::Fetched,
            format!("{} fetched", self.resource()),
            document,
        ))
    }

    /// Fetch a page of documents.
    ///
    /// The request's residual filter merges under the caller-fixed `filter`;
    /// on key collision the caller's constraint wins. The total count runs
    /// as a separate query over the same merged filter, ignoring pagination.
    /// An empty page is a success with `doc_length` = total, never an error.
    pub async fn get_many(
        &self,
        _ctx: &OperationContext,
        filter: JsonObject,
        query: &QueryDirective,
        populate: Option<&PopulateDirective>,
    ) -> Result<OperationSuccess, CrudError> {
        tracing::debug!(
            collection = self.resource(),
            page = query.page,
            limit = query.limit,
            "get_many"
        );

        let mut merged = JsonObject::new();
        for (key, value) in &query.filter {
            merged.insert(key.clone(), Value::String(value.clone()));
        }
        for (key, value) in filter {
            merged.insert(key, value);
        }

        let spec = FindSpec {
            skip: query.skip(),
            limit: Some(query.limit),
            sort: query.sort.clone(),
            projection: Projection::effective(
                query.fields.as_ref(),
                self.binding.default_projection.as_ref(),
            ),
            expansions: populate::resolve(populate),
        };

        let documents = self
            .binding
            .store
            .find(&merged, &spec)
            .await
            .map_err(|e| self.classify(e))?;

        let total = self
            .binding
            .store
            .count(&merged)
            .await
            .map_err(|e| self.classify(e))?;

        Ok(OperationSuccess::new(
            SuccessKind::Fetched,
            format!("{} fetched", self.resource()),
            Value::Array(documents),
        )
        .with_count(total))
    }

    /// Atomically update the first matching document and return the
    /// post-update version. Zero matches is `NotFound`; nothing is written.
    pub async fn update(
        &self,
        _ctx: &OperationContext,
        filter: JsonObject,
        data: JsonObject,
    ) -> Result<OperationSuccess, CrudError> {
        tracing::debug!(collection = self.resource(), "update");

        let updated = self
            .binding
            .store
            .update_one(&filter, data)
            .await
            .map_err(|e| self.classify(e))?
            .ok_or_else(|| CrudError::NotFound {
                resource: self.resource().to_string(),
            })?;

        Ok(OperationSuccess::new(
            SuccessKind::Updated,
            format!("{} updated", self.resource()),
            updated,
        ))
    }

    /// Remove every matching document. Zero removals is `NotFound`.
    pub async fn delete(
        &self,
        _ctx: &OperationContext,
        filter: JsonObject,
    ) -> Result<OperationSuccess, CrudError> {
        tracing::debug!(collection = self.resource(), "delete");

        let removed = self
            .binding
            .store
            .delete_many(&filter)
            .await
            .map_err(|e| self.classify(e))?;

        if removed == 0 {
            return Err(CrudError::NotFound {
                resource: self.resource().to_string(),
            });
        }

        Ok(OperationSuccess::new(
            SuccessKind::Deleted,
            format!("{} deleted", self.resource()),
            serde_json::json!({ "deleted_count": removed }),
        ))
    }

    // -----------------------------------------------------------------------
    // Dispatch variants: operation + normalization in one call
    // -----------------------------------------------------------------------

    pub async fn dispatch_create(
        &self,
        ctx: &OperationContext,
        data: JsonObject,
        check: Option<JsonObject>,
    ) -> Result<Response, CrudError> {
        response::respond(self.create(ctx, data, check).await, ctx)
    }

    pub async fn dispatch_get_one(
        &self,
        ctx: &OperationContext,
        filter: JsonObject,
        populate: Option<&PopulateDirective>,
    ) -> Result<Response, CrudError> {
        response::respond(self.get_one(ctx, filter, populate).await, ctx)
    }

    pub async fn dispatch_get_many(
        &self,
        ctx: &OperationContext,
        filter: JsonObject,
        query: &QueryDirective,
        populate: Option<&PopulateDirective>,
    ) -> Result<Response, CrudError> {
        response::respond(self.get_many(ctx, filter, query, populate).await, ctx)
    }

    pub async fn dispatch_update(
        &self,
        ctx: &OperationContext,
        filter: JsonObject,
        data: JsonObject,
    ) -> Result<Response, CrudError> {
        response::respond(self.update(ctx, filter, data).await, ctx)
    }

    pub async fn dispatch_delete(
        &self,
        ctx: &OperationContext,
        filter: JsonObject,
    ) -> Result<Response, CrudError> {
        response::respond(self.delete(ctx, filter).await, ctx)
    }
}
