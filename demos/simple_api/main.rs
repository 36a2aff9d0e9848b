//! Simple blog API demonstrating the CRUD engine on the in-memory backend
//!
//! Routes:
//! - `GET    /health`
//! - `POST   /users`          — duplicate-guarded by email
//! - `GET    /users/{id}`
//! - `POST   /posts`
//! - `GET    /posts`          — full query resolution:
//!   `GET /posts?page=2&limit=5&sort=-likes&fields=title,likes&author=<id>`
//! - `GET    /posts/{id}`     — author populated
//! - `PUT    /posts/{id}`
//! - `DELETE /posts/{id}`

use axum::extract::Query;
use axum::response::Response;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crudkit::prelude::*;

#[derive(Clone)]
struct AppState {
    users: CrudService,
    posts: CrudService,
    ctx: OperationContext,
}

fn body_object(body: Value) -> JsonObject {
    body.as_object().cloned().unwrap_or_default()
}

fn id_filter(id: &str) -> JsonObject {
    let mut filter = JsonObject::new();
    filter.insert("id".to_string(), Value::String(id.to_string()));
    filter
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "simple_api" }))
}

async fn create_user(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let data = body_object(body);

    // Guard against re-registration with the same email
    let mut check = JsonObject::new();
    if let Some(email) = data.get("email") {
        check.insert("email".to_string(), email.clone());
    }

    state
        .users
        .dispatch_create(&state.ctx, data, Some(check))
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state
        .users
        .dispatch_get_one(&state.ctx, id_filter(&id), None)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn create_post(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    state
        .posts
        .dispatch_create(&state.ctx, body_object(body), None)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn list_posts(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let directive = QueryDirective::parse(pairs);
    state
        .posts
        .dispatch_get_many(&state.ctx, JsonObject::new(), &directive, None)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let populate = PopulateDirective::from(
        PopulateNode::new("author").with_select(["name", "email"]),
    );
    state
        .posts
        .dispatch_get_one(&state.ctx, id_filter(&id), Some(&populate))
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state
        .posts
        .dispatch_update(&state.ctx, id_filter(&id), body_object(body))
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state
        .posts
        .dispatch_delete(&state.ctx, id_filter(&id))
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simple_api=debug,crudkit=debug,tower_http=debug".into()),
        )
        .init();

    let backend = InMemoryBackend::new();

    let users = CrudService::new(
        backend
            .bind(
                Schema::builder("users")
                    .field(FieldDescriptor::new("name", FieldKind::String).required())
                    .field(
                        FieldDescriptor::new("email", FieldKind::String)
                            .required()
                            .unique()
                            .with_format(FieldFormat::Email),
                    )
                    .field(FieldDescriptor::new("password", FieldKind::String))
                    .build(),
            )
            .with_default_projection(Projection::Exclude(vec!["password".to_string()])),
    );

    let posts = CrudService::new(backend.bind(
        Schema::builder("posts")
            .field(FieldDescriptor::new("title", FieldKind::String).required())
            .field(FieldDescriptor::new("body", FieldKind::String))
            .field(FieldDescriptor::new("likes", FieldKind::Integer))
            .reference("author", "users")
            .build(),
    ));

    let state = AppState {
        users,
        posts,
        ctx: OperationContext::new(Environment::Development),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/posts", post(create_post).get(list_posts))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
