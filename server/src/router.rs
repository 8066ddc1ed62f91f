// Router configuration

use std::time::Duration;

use axum::{
    Router,
    http::{
        Method, StatusCode,
        header::{CONTENT_TYPE, HeaderName},
    },
    middleware,
    routing::get,
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer, ExposeHeaders},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    handlers::{
        collaborator_handlers::*,
        doc_handlers::*,
        headers::{HEADER_DOC_ID, HEADER_DOC_ROLE, HEADER_USER_ID},
        health_handlers::*,
    },
    observability,
    request_cache::request_cache_middleware,
    state::AppState,
};

/// Requests still running after `timeout` are answered with 408.
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            CONTENT_TYPE,
            HeaderName::from_static(HEADER_USER_ID),
            observability::REQUEST_ID_HEADER.clone(),
        ]))
        .expose_headers(ExposeHeaders::list([
            HeaderName::from_static(HEADER_DOC_ID),
            HeaderName::from_static(HEADER_DOC_ROLE),
            observability::REQUEST_ID_HEADER.clone(),
        ]))
        .allow_credentials(true);

    let router = Router::new()
        // Health & Info
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        // Documents
        .route(
            "/documents",
            get(list_documents_handler).post(create_document_handler),
        )
        .route(
            "/documents/{id}",
            get(get_document_handler)
                .patch(update_document_handler)
                .delete(delete_document_handler),
        )
        // Collaborators
        .route(
            "/documents/{id}/collaborators",
            get(list_collaborators_handler)
                .post(add_collaborator_handler)
                .delete(remove_collaborator_handler),
        );

    router
        .layer(middleware::from_fn(request_cache_middleware))
        .layer(request_timeout_layer(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_context_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::DOC_NOT_FOUND_OR_DENIED,
        testing::{setup_memory_state, setup_state},
    };
    use axum::{
        body::{Body, to_bytes},
        http::Request,
        response::Response,
    };
    use serde_json::{Value as JsonValue, json};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(setup_memory_state(), Duration::from_secs(5))
    }

    fn request(method: Method, uri: &str, user: Option<&str>, body: Option<JsonValue>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(HEADER_USER_ID, user);
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_of(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_doc(app: &Router, owner: &str, title: &str) -> String {
        let response = send(
            app,
            request(
                Method::POST,
                "/documents",
                Some(owner),
                Some(json!({ "title": title })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_of(response).await;
        assert_eq!(body["owner_id"], owner);
        assert_eq!(body["title"], title);
        body["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let slow = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(request_timeout_layer(Duration::from_millis(20)));

        let response = send(&slow, request(Method::GET, "/slow", None, None)).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let response = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = app();
        let response = send(&app, request(Method::GET, "/documents", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            request(Method::GET, "/documents/anything", Some("   "), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let app = app();
        let response = send(
            &app,
            request(
                Method::POST,
                "/documents",
                Some("alice"),
                Some(json!({ "title": "  " })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method(Method::POST)
            .uri("/documents")
            .header(HEADER_USER_ID, "alice")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&app, malformed).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["type"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn owner_reads_document_with_access_headers() {
        let app = app();
        let doc_id = create_doc(&app, "alice", "Roadmap").await;

        let response = send(
            &app,
            request(Method::GET, &format!("/documents/{doc_id}"), Some("alice"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_DOC_ID], doc_id.as_str());
        assert_eq!(response.headers()[HEADER_DOC_ROLE], "OWNER");

        let body = json_of(response).await;
        assert_eq!(body["id"], doc_id.as_str());
        assert_eq!(body["role"], "owner");
        assert!(body.get("content").is_some());
    }

    #[tokio::test]
    async fn denial_is_indistinguishable_from_absence() {
        let app = app();
        let doc_id = create_doc(&app, "alice", "Secret").await;

        let denied = send(
            &app,
            request(Method::GET, &format!("/documents/{doc_id}"), Some("mallory"), None),
        )
        .await;
        let missing = send(
            &app,
            request(Method::GET, "/documents/no-such-doc", Some("mallory"), None),
        )
        .await;

        assert_eq!(denied.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(!denied.headers().contains_key(HEADER_DOC_ROLE));

        let denied = json_of(denied).await;
        let missing = json_of(missing).await;
        assert_eq!(denied["message"], DOC_NOT_FOUND_OR_DENIED);
        assert_eq!(denied["message"], missing["message"]);
        assert_eq!(denied["name"], missing["name"]);
    }

    #[tokio::test]
    async fn collaborator_lifecycle_over_http() {
        let app = app();
        let doc_id = create_doc(&app, "alice", "Plan").await;
        let doc_uri = format!("/documents/{doc_id}");
        let collaborators_uri = format!("/documents/{doc_id}/collaborators");

        let response = send(
            &app,
            request(
                Method::POST,
                &collaborators_uri,
                Some("alice"),
                Some(json!({ "user_id": "bob", "role": "viewer" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &app,
            request(
                Method::POST,
                &collaborators_uri,
                Some("alice"),
                Some(json!({ "user_id": "bob", "role": "editor" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            request(
                Method::POST,
                &collaborators_uri,
                Some("alice"),
                Some(json!({ "user_id": "carol", "role": "owner" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, request(Method::GET, &doc_uri, Some("bob"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_DOC_ROLE], "VIEWER");

        let response = send(
            &app,
            request(
                Method::PATCH,
                &doc_uri,
                Some("bob"),
                Some(json!({ "title": "Hijacked" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request(Method::GET, "/documents", Some("bob"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = json_of(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["id"], doc_id.as_str());
        assert!(listed[0].get("content").is_none());

        let response = send(
            &app,
            request(Method::GET, &collaborators_uri, Some("bob"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            request(Method::GET, &collaborators_uri, Some("alice"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let collaborators = json_of(response).await;
        let users: Vec<&str> = collaborators
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|entry| entry["user_id"].as_str())
            .collect();
        assert_eq!(users, vec!["alice", "bob"]);

        let response = send(
            &app,
            request(
                Method::DELETE,
                &collaborators_uri,
                Some("alice"),
                Some(json!({ "user_id": "bob" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, request(Method::GET, &doc_uri, Some("bob"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn editor_updates_and_owner_deletes() {
        let app = app();
        let doc_id = create_doc(&app, "alice", "Draft").await;
        let doc_uri = format!("/documents/{doc_id}");

        let response = send(
            &app,
            request(
                Method::POST,
                &format!("{doc_uri}/collaborators"),
                Some("alice"),
                Some(json!({ "user_id": "carol", "role": "Editor" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &app,
            request(
                Method::PATCH,
                &doc_uri,
                Some("carol"),
                Some(json!({ "title": "Final" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_DOC_ROLE], "EDITOR");

        let response = send(&app, request(Method::DELETE, &doc_uri, Some("carol"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request(Method::DELETE, &doc_uri, Some("alice"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, request(Method::GET, &doc_uri, Some("alice"), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sqlite_backend_serves_the_same_flow() {
        let (_temp_dir, database, state) = setup_state().await;
        let app = build_router(state, Duration::from_secs(5));
        let doc_id = create_doc(&app, "alice", "Persisted").await;

        let response = send(
            &app,
            request(
                Method::POST,
                &format!("/documents/{doc_id}/collaborators"),
                Some("alice"),
                Some(json!({ "user_id": "bob", "role": "editor" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &app,
            request(Method::GET, &format!("/documents/{doc_id}"), Some("bob"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_DOC_ROLE], "EDITOR");

        database.close().await;
    }
}
