//! HTTP surface of the document service.
//!
//! # Endpoints
//!
//! - `POST /operations`: run one operation or a batch of them
//! - `GET /operations`: list the available operations
//! - `GET /`: welcome message
//! - `GET /health`: health check
//!
//! Every route sits behind the shared-secret gate.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docroute_core::{CollectionRouter, DocumentService, DocumentStore};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::operations::{
    execute, OperationFailure, OperationInfo, OperationRequest, OperationResponse, CATALOG,
};
use super::secret::{require_secret, SecretGate};
use super::status::status_for_failures;
use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
    pub secret: Arc<SecretGate>,
}

impl AppState {
    pub fn new(service: DocumentService, secret: SecretGate) -> Self {
        Self {
            service: Arc::new(service),
            secret: Arc::new(secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let secret = state.secret.clone();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/operations", get(describe_operations).post(run_operations))
        .with_state(state)
        .layer(middleware::from_fn_with_state(secret, require_secret))
        .layer(TraceLayer::new_for_http())
}

/// Bind to the configured address and serve until the process stops.
pub async fn serve(
    config: &Config,
    store: Arc<dyn DocumentStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = DocumentService::with_router(
        store,
        CollectionRouter::with_capacity(config.router_capacity.value),
    );
    let state = AppState::new(service, SecretGate::from_config(config));

    if state.secret.is_enabled() {
        tracing::info!("API secret required on every request");
    } else {
        tracing::warn!("No API secret configured - all requests are accepted");
    }

    let app = router(state);

    let addr = config.socket_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct Welcome {
    message: &'static str,
}

async fn root() -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to docroute! POST operations to /operations, GET /operations lists them.",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct Catalog {
    operations: &'static [OperationInfo],
}

async fn describe_operations() -> Json<Catalog> {
    Json(Catalog {
        operations: CATALOG,
    })
}

async fn run_operations(State(state): State<AppState>, body: Bytes) -> Response {
    let response = match OperationRequest::parse(&body) {
        Ok(request) => execute(&state.service, request).await,
        Err(e) => {
            tracing::debug!("unparseable operation request: {}", e);
            OperationResponse::rejected(OperationFailure::bad_request(format!(
                "Invalid operation request: {}",
                e
            )))
        }
    };

    let base = StatusCode::OK;
    let status = status_for_failures(&response.errors, base);
    encode_response(&response, status, base)
}

/// JSON response with `status`. A body that cannot be encoded degrades to an
/// empty response with `base`.
fn encode_response<T: Serialize>(body: &T, status: StatusCode, base: StatusCode) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            tracing::error!("failed to encode operation response: {}", e);
            base.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use docroute_core::{MemoryStore, NewDocument};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestContext {
        app: Router,
        service: Arc<DocumentService>,
    }

    impl TestContext {
        fn new(secret: Option<&str>) -> Self {
            let service = DocumentService::new(Arc::new(MemoryStore::new()));
            let state = AppState::new(service, SecretGate::fixed(secret.map(String::from)));
            let service = state.service.clone();
            Self {
                app: router(state),
                service,
            }
        }

        async fn post(&self, body: Value) -> (StatusCode, Value) {
            self.post_raw(body.to_string()).await
        }

        async fn post_raw(&self, body: String) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/operations")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            send(self.app.clone(), request).await
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    #[tokio::test]
    async fn test_encode_failure_keeps_base_status_and_empty_body() {
        let response = encode_response(&Unencodable, StatusCode::CONFLICT, StatusCode::OK);
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_encode_success_uses_translated_status() {
        let response = encode_response(&json!({"data": null}), StatusCode::CONFLICT, StatusCode::OK);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let ctx = TestContext::new(None);

        let (status, body) = send(ctx.app.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let (status, body) = send(ctx.app.clone(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("/operations"));
    }

    #[tokio::test]
    async fn test_describe_operations() {
        let ctx = TestContext::new(None);
        let (status, body) = send(ctx.app.clone(), get("/operations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["operations"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let ctx = TestContext::new(None);

        let (status, body) = ctx
            .post(json!({"op": "createDocument", "identifier": "inv-1", "type": "Invoice", "data": "{\"total\": 3}", "id": "forged"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["createDocument"]["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert_ne!(id, "forged");
        assert!(body.get("errors").is_none());

        let (status, body) = ctx
            .post(json!({"op": "getDocument", "identifier": "inv-1", "type": "Invoice"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["getDocument"],
            json!({"id": id, "identifier": "inv-1", "type": "Invoice", "data": "{\"total\": 3}"})
        );
    }

    #[tokio::test]
    async fn test_existing_identifier_is_conflict() {
        let ctx = TestContext::new(None);
        ctx.service
            .create_document(NewDocument::new("a", "Note", "x"))
            .await
            .unwrap();

        let (status, body) = ctx
            .post(json!({"op": "createDocument", "identifier": "a", "type": "Note", "data": "y"}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["data"]["createDocument"].is_null());
        assert_eq!(body["errors"][0]["code"], "CONFLICT");
        assert_eq!(body["errors"][0]["path"], json!(["createDocument"]));

        let (status, _) = ctx
            .post(json!({"op": "createDocuments", "items": [
                {"identifier": "b", "type": "Note", "data": "1"},
                {"identifier": "a", "type": "Note", "data": "2"}
            ]}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let notes = ctx.service.list_documents(Some("Note")).await.unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_identifiers_are_bad_request() {
        let ctx = TestContext::new(None);
        let (status, body) = ctx
            .post(json!({"op": "createDocuments", "items": [
                {"identifier": "a", "type": "Note", "data": "1"},
                {"identifier": "a", "type": "Note", "data": "2"}
            ]}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");
        assert!(ctx.service.list_documents(Some("Note")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_body_has_null_data() {
        let ctx = TestContext::new(None);
        let (status, body) = ctx.post_raw("{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["data"].is_null());
        assert_eq!(body["errors"][0]["code"], "BAD_REQUEST");

        let (status, _) = ctx.post(json!({"op": "getDocument"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_request_reports_every_result() {
        let ctx = TestContext::new(None);
        let (status, body) = ctx
            .post(json!({"operations": [
                {"op": "createDocuments", "items": [
                    {"identifier": "a", "type": "Note", "data": "1"},
                    {"identifier": "b", "type": "Note", "data": "2"}
                ]},
                {"op": "getDocuments", "type": "Note", "identifiers": ["b", "zzz", "a"]},
                {"op": "updateDocument", "identifier": "a", "type": "Note", "newData": "changed"},
                {"op": "deleteDocument", "identifier": "b", "type": "Note"},
                {"op": "listDocuments", "type": "Note"}
            ]}))
            .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["createDocuments"].as_array().unwrap().len(), 2);
        let order: Vec<&str> = data["getDocuments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["identifier"].as_str().unwrap())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(data["updateDocument"]["data"], "changed");
        assert_eq!(data["deleteDocument"], true);
        assert_eq!(data["listDocuments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_secret_required_when_configured() {
        let ctx = TestContext::new(Some("s3cret"));

        let (status, body) = send(ctx.app.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"detail": "Invalid or missing API secret"}));

        let wrong = Request::builder()
            .uri("/health")
            .header("x-api-secret", "nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(ctx.app.clone(), wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = Request::builder()
            .uri("/health")
            .header("X-Api-Secret", "s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(ctx.app.clone(), right).await;
        assert_eq!(status, StatusCode::OK);
    }
}
