//! End-to-end tests for the CRUD engine on the in-memory backend
//!
//! These tests exercise the full resolution path: query directive → merged
//! filter → store query → outcome, including the duplicate pre-check, the
//! zero-match failures, population, and the pagination/count contract.

use serde_json::{Value, json};

use crudkit::prelude::*;

fn obj(value: Value) -> JsonObject {
    value.as_object().expect("object literal").clone()
}

fn ctx() -> OperationContext {
    OperationContext::new(Environment::Development)
}

/// users + posts + self-referential categories, shared in-memory data
struct Fixture {
    users: CrudService,
    posts: CrudService,
    categories: CrudService,
}

fn fixture() -> Fixture {
    let backend = InMemoryBackend::new();

    let users = CrudService::new(
        backend
            .bind(
                Schema::builder("users")
                    .field(FieldDescriptor::new("name", FieldKind::String).required())
                    .field(
                        FieldDescriptor::new("email", FieldKind::String)
                            .required()
                            .unique(),
                    )
                    .field(FieldDescriptor::new("password", FieldKind::String))
                    .build(),
            )
            .with_default_projection(Projection::Exclude(vec!["password".to_string()])),
    );

    let categories = CrudService::new(backend.bind(
        Schema::builder("categories")
            .field(FieldDescriptor::new("name", FieldKind::String).required())
            .reference("parent", "categories")
            .build(),
    ));

    let posts = CrudService::new(backend.bind(
        Schema::builder("posts")
            .field(FieldDescriptor::new("title", FieldKind::String).required())
            .field(FieldDescriptor::new("likes", FieldKind::Integer))
            .reference("author", "users")
            .reference("category", "categories")
            .build(),
    ));

    Fixture {
        users,
        posts,
        categories,
    }
}

// =============================================================================
// create
// =============================================================================

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_created_document() {
        let fx = fixture();
        let outcome = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect("create should succeed");
        assert_eq!(outcome.kind, SuccessKind::Created);
        assert_eq!(outcome.data["name"], "ada");
        assert!(outcome.data["id"].is_string());
    }

    #[tokio::test]
    async fn test_create_with_matching_check_is_duplicate_and_writes_nothing() {
        let fx = fixture();
        fx.users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect("first create should succeed");

        let err = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "imposter", "email": "ada@example.com" })),
                Some(obj(json!({ "email": "ada@example.com" }))),
            )
            .await
            .expect_err("duplicate check should fail");
        assert!(matches!(err, CrudError::Duplicate { .. }));

        // No second write happened
        let outcome = fx
            .users
            .get_many(&ctx(), JsonObject::new(), &QueryDirective::parse(Vec::<(String, String)>::new()), None)
            .await
            .expect("listing should succeed");
        assert_eq!(outcome.doc_count, Some(1));
    }

    #[tokio::test]
    async fn test_create_with_non_matching_check_succeeds() {
        let fx = fixture();
        let outcome = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                Some(obj(json!({ "email": "ada@example.com" }))),
            )
            .await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_create_missing_required_field_is_validation_failure() {
        let fx = fixture();
        let err = fx
            .users
            .create(&ctx(), obj(json!({ "name": "ada" })), None)
            .await
            .expect_err("missing email should fail");
        assert!(matches!(err, CrudError::Validation { .. }));
        assert!(err.to_string().contains("email"));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_without_check() {
        let fx = fixture();
        fx.users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect("first create should succeed");

        // No pre-check supplied; the store's unique constraint still guards
        let err = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "twin", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect_err("unique email should reject");
        assert!(matches!(err, CrudError::Duplicate { .. }));
    }
}

// =============================================================================
// get_one
// =============================================================================

mod get_one_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_one_not_found() {
        let fx = fixture();
        let err = fx
            .users
            .get_one(&ctx(), obj(json!({ "name": "ghost" })), None)
            .await
            .expect_err("no match should fail");
        assert_eq!(
            err,
            CrudError::NotFound {
                resource: "users".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_get_one_applies_default_projection() {
        let fx = fixture();
        fx.users
            .create(
                &ctx(),
                obj(json!({
                    "name": "ada",
                    "email": "ada@example.com",
                    "password": "hunter2"
                })),
                None,
            )
            .await
            .expect("create should succeed");

        let outcome = fx
            .users
            .get_one(&ctx(), obj(json!({ "name": "ada" })), None)
            .await
            .expect("lookup should succeed");
        assert_eq!(outcome.data["email"], "ada@example.com");
        assert!(outcome.data.get("password").is_none());
    }

    #[tokio::test]
    async fn test_get_one_populates_relation() {
        let fx = fixture();
        let author = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect("create author");
        fx.posts
            .create(
                &ctx(),
                obj(json!({ "title": "intro", "author": author.data["id"] })),
                None,
            )
            .await
            .expect("create post");

        let populate = PopulateDirective::from(PopulateNode::new("author").with_select(["name"]));
        let outcome = fx
            .posts
            .get_one(&ctx(), obj(json!({ "title": "intro" })), Some(&populate))
            .await
            .expect("lookup should succeed");
        assert_eq!(outcome.data["author"]["name"], "ada");
        assert!(outcome.data["author"].get("email").is_none());
    }
}

// =============================================================================
// get_many
// =============================================================================

mod get_many_tests {
    use super::*;

    async fn seed_posts(fx: &Fixture) {
        // 12 posts by author "42" with likes 1..=12, 3 posts by author "99"
        for likes in 1..=12 {
            fx.posts
                .create(
                    &ctx(),
                    obj(json!({
                        "title": format!("post-{likes}"),
                        "likes": likes,
                        "author": "42"
                    })),
                    None,
                )
                .await
                .expect("seed post");
        }
        for likes in [100, 200, 300] {
            fx.posts
                .create(
                    &ctx(),
                    obj(json!({
                        "title": format!("other-{likes}"),
                        "likes": likes,
                        "author": "99"
                    })),
                    None,
                )
                .await
                .expect("seed other post");
        }
    }

    #[tokio::test]
    async fn test_empty_result_is_success_with_zero_count() {
        let fx = fixture();
        let query = QueryDirective::parse(Vec::<(String, String)>::new());
        let outcome = fx
            .posts
            .get_many(&ctx(), JsonObject::new(), &query, None)
            .await
            .expect("empty listing is not an error");
        assert_eq!(outcome.data, json!([]));
        assert_eq!(outcome.doc_count, Some(0));
    }

    #[tokio::test]
    async fn test_full_query_resolution_scenario() {
        let fx = fixture();
        seed_posts(&fx).await;

        // GET /posts?page=2&limit=5&sort=-likes&fields=title,likes&author=42
        let query = QueryDirective::parse(vec![
            ("page".to_string(), "2".to_string()),
            ("limit".to_string(), "5".to_string()),
            ("sort".to_string(), "-likes".to_string()),
            ("fields".to_string(), "title,likes".to_string()),
            ("author".to_string(), "42".to_string()),
        ]);

        let outcome = fx
            .posts
            .get_many(&ctx(), JsonObject::new(), &query, None)
            .await
            .expect("listing should succeed");

        // Total matching count ignores pagination
        assert_eq!(outcome.doc_count, Some(12));

        // Documents 6–10 of the descending-likes ordering: likes 7,6,5,4,3
        let documents = outcome.data.as_array().expect("array of documents");
        let likes: Vec<i64> = documents
            .iter()
            .map(|d| d["likes"].as_i64().expect("likes"))
            .collect();
        assert_eq!(likes, vec![7, 6, 5, 4, 3]);

        // Only the allow-listed fields (plus id) survive
        for document in documents {
            let keys: Vec<&str> = document
                .as_object()
                .expect("object")
                .keys()
                .map(String::as_str)
                .collect();
            for key in keys {
                assert!(
                    ["id", "title", "likes"].contains(&key),
                    "unexpected field {key}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_caller_fixed_filter_wins_over_residual() {
        let fx = fixture();
        seed_posts(&fx).await;

        // Request tries to read author 99's posts; the caller pins author 42
        let query = QueryDirective::parse(vec![
            ("author".to_string(), "99".to_string()),
            ("limit".to_string(), "50".to_string()),
        ]);
        let outcome = fx
            .posts
            .get_many(&ctx(), obj(json!({ "author": "42" })), &query, None)
            .await
            .expect("listing should succeed");
        assert_eq!(outcome.doc_count, Some(12));
        for document in outcome.data.as_array().expect("array") {
            assert_eq!(document["author"], "42");
        }
    }

    #[tokio::test]
    async fn test_residual_filter_applies_when_not_pinned() {
        let fx = fixture();
        seed_posts(&fx).await;

        let query = QueryDirective::parse(vec![("author".to_string(), "99".to_string())]);
        let outcome = fx
            .posts
            .get_many(&ctx(), JsonObject::new(), &query, None)
            .await
            .expect("listing should succeed");
        assert_eq!(outcome.doc_count, Some(3));
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty_success() {
        let fx = fixture();
        seed_posts(&fx).await;

        let query = QueryDirective::parse(vec![
            ("page".to_string(), "100".to_string()),
            ("author".to_string(), "42".to_string()),
        ]);
        let outcome = fx
            .posts
            .get_many(&ctx(), JsonObject::new(), &query, None)
            .await
            .expect("listing should succeed");
        assert_eq!(outcome.data, json!([]));
        assert_eq!(outcome.doc_count, Some(12));
    }
}

// =============================================================================
// population
// =============================================================================

mod population_tests {
    use super::*;

    #[tokio::test]
    async fn test_two_node_sequence_with_nested_and_third_level_ignored() {
        let fx = fixture();

        let root = fx
            .categories
            .create(&ctx(), obj(json!({ "name": "root" })), None)
            .await
            .expect("create root");
        let parent = fx
            .categories
            .create(
                &ctx(),
                obj(json!({ "name": "parent", "parent": root.data["id"] })),
                None,
            )
            .await
            .expect("create parent");
        let leaf = fx
            .categories
            .create(
                &ctx(),
                obj(json!({ "name": "leaf", "parent": parent.data["id"] })),
                None,
            )
            .await
            .expect("create leaf");
        let author = fx
            .users
            .create(
                &ctx(),
                obj(json!({ "name": "ada", "email": "ada@example.com" })),
                None,
            )
            .await
            .expect("create author");
        fx.posts
            .create(
                &ctx(),
                obj(json!({
                    "title": "intro",
                    "author": author.data["id"],
                    "category": leaf.data["id"]
                })),
                None,
            )
            .await
            .expect("create post");

        // [{path: author}, {path: category, populate: {path: parent,
        //   populate: {path: parent}}}]; the innermost level must not resolve
        let populate: PopulateDirective = serde_json::from_value(json!([
            { "path": "author" },
            { "path": "category", "populate": { "path": "parent", "populate": { "path": "parent" } } }
        ]))
        .expect("directive should deserialize");

        let outcome = fx
            .posts
            .get_one(&ctx(), obj(json!({ "title": "intro" })), Some(&populate))
            .await
            .expect("lookup should succeed");

        assert_eq!(outcome.data["author"]["name"], "ada");
        assert_eq!(outcome.data["category"]["name"], "leaf");
        assert_eq!(outcome.data["category"]["parent"]["name"], "parent");
        // Third level stays a raw reference id
        assert!(outcome.data["category"]["parent"]["parent"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_relation_path_is_validation_failure() {
        let fx = fixture();
        fx.posts
            .create(
                &ctx(),
                obj(json!({ "title": "intro", "ghost": "x" })),
                None,
            )
            .await
            .expect("create post");

        let populate = PopulateDirective::from(PopulateNode::new("ghost"));
        let err = fx
            .posts
            .get_one(&ctx(), obj(json!({ "title": "intro" })), Some(&populate))
            .await
            .expect_err("unknown relation should fail");
        assert!(matches!(err, CrudError::Validation { .. }));
    }
}

// =============================================================================
// update / delete
// =============================================================================

mod update_delete_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_returns_post_update_document() {
        let fx = fixture();
        fx.posts
            .create(&ctx(), obj(json!({ "title": "old", "likes": 1 })), None)
            .await
            .expect("create post");

        let outcome = fx
            .posts
            .update(
                &ctx(),
                obj(json!({ "title": "old" })),
                obj(json!({ "title": "new" })),
            )
            .await
            .expect("update should succeed");
        assert_eq!(outcome.kind, SuccessKind::Updated);
        assert_eq!(outcome.data["title"], "new");
        assert_eq!(outcome.data["likes"], 1);
    }

    #[tokio::test]
    async fn test_update_zero_matches_is_not_found_and_mutates_nothing() {
        let fx = fixture();
        fx.posts
            .create(&ctx(), obj(json!({ "title": "keep", "likes": 1 })), None)
            .await
            .expect("create post");

        let err = fx
            .posts
            .update(
                &ctx(),
                obj(json!({ "title": "ghost" })),
                obj(json!({ "likes": 99 })),
            )
            .await
            .expect_err("no match should fail");
        assert!(matches!(err, CrudError::NotFound { .. }));

        let unchanged = fx
            .posts
            .get_one(&ctx(), obj(json!({ "title": "keep" })), None)
            .await
            .expect("post still there");
        assert_eq!(unchanged.data["likes"], 1);
    }

    #[tokio::test]
    async fn test_delete_returns_removed_count() {
        let fx = fixture();
        for title in ["a", "a", "b"] {
            fx.posts
                .create(&ctx(), obj(json!({ "title": title })), None)
                .await
                .expect("create post");
        }

        let outcome = fx
            .posts
            .delete(&ctx(), obj(json!({ "title": "a" })))
            .await
            .expect("delete should succeed");
        assert_eq!(outcome.kind, SuccessKind::Deleted);
        assert_eq!(outcome.data["deleted_count"], 2);
    }

    #[tokio::test]
    async fn test_delete_zero_matches_is_not_found() {
        let fx = fixture();
        let err = fx
            .posts
            .delete(&ctx(), obj(json!({ "title": "ghost" })))
            .await
            .expect_err("no match should fail");
        assert!(matches!(err, CrudError::NotFound { .. }));
    }
}
