//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod analysis;
mod auth;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware_stack = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(request_deadline(settings.server.request_timeout()))
        .propagate_x_request_id();

    // Bearer token required
    let protected = Router::new()
        .route("/analyze", post(analysis::analyze))
        .route("/results/{session_id}", get(analysis::get_result))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route("/token", post(auth::issue_token))
        .merge(protected)
        .layer(DefaultBodyLimit::max(settings.security.max_request_bytes))
        .layer(middleware_stack)
        .with_state(state)
}

/// Requests still running after `timeout` get an empty 408
fn request_deadline(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus exposition
async fn render_metrics(State(state): State<SharedState>) -> Result<String, AppError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| AppError::NotFound("Metrics are not enabled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::AnalysisReport;
    use crate::config::SecurityConfig;
    use crate::state::AppState;
    use crate::storage::{MemoryStorage, MetricsRecord, StorageBackend, StorageError};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const PASSWORD: &str = "correct horse";

    fn test_app() -> Router {
        build_app(Arc::new(MemoryStorage::new(64)), |_| {})
    }

    fn test_app_with_limit(max_request_bytes: usize) -> Router {
        build_app(Arc::new(MemoryStorage::new(64)), |settings| {
            settings.security.max_request_bytes = max_request_bytes;
        })
    }

    fn build_app(storage: Arc<dyn StorageBackend>, configure: impl FnOnce(&mut Settings)) -> Router {
        let mut settings = Settings {
            security: SecurityConfig {
                jwt_secret: "router-test-secret".to_string(),
                api_user: "analyzer".to_string(),
                api_password_hash: Some(bcrypt::hash(PASSWORD, 4).unwrap()),
                ..SecurityConfig::default()
            },
            ..Settings::default()
        };
        configure(&mut settings);

        let state = Arc::new(AppState::new(settings.clone(), storage, None));
        create_router(state, &settings)
    }

    /// Every call fails immediately
    struct BrokenStorage;

    #[async_trait]
    impl StorageBackend for BrokenStorage {
        async fn store_result(&self, _: &str, _: &AnalysisReport) -> Result<(), StorageError> {
            Err(broken())
        }

        async fn retrieve_result(&self, _: &str) -> Result<Option<AnalysisReport>, StorageError> {
            Err(broken())
        }

        async fn store_metrics(&self, _: &MetricsRecord) -> Result<(), StorageError> {
            Err(broken())
        }
    }

    fn broken() -> StorageError {
        StorageError::Serialization(serde_json::from_str::<Value>("{").unwrap_err())
    }

    /// Every call hangs forever
    struct StalledStorage;

    #[async_trait]
    impl StorageBackend for StalledStorage {
        async fn store_result(&self, _: &str, _: &AnalysisReport) -> Result<(), StorageError> {
            std::future::pending().await
        }

        async fn retrieve_result(&self, _: &str) -> Result<Option<AnalysisReport>, StorageError> {
            std::future::pending().await
        }

        async fn store_metrics(&self, _: &MetricsRecord) -> Result<(), StorageError> {
            std::future::pending().await
        }
    }

    fn one_second_requests(settings: &mut Settings) {
        settings.server.request_timeout_secs = 1;
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/token",
                None,
                json!({"username": "analyzer", "password": PASSWORD}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    fn analyze_body() -> Value {
        json!({
            "old_schema": {"tables": [{"name": "users", "columns": [
                {"name": "id", "type": "INTEGER"},
                {"name": "email", "type": "TEXT", "nullable": false}
            ]}]},
            "new_schema": {"tables": [{"name": "users", "columns": [
                {"name": "id", "type": "INTEGER"},
                {"name": "email_hash", "type": "TEXT"}
            ]}]},
            "queries": ["SELECT users.email FROM users"],
            "session_id": "session-1"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_analyze_requires_token() {
        let response = test_app()
            .oneshot(json_request("POST", "/analyze", None, analyze_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected() {
        let response = test_app()
            .oneshot(json_request("POST", "/analyze", Some("garbage"), analyze_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let response = test_app()
            .oneshot(json_request(
                "POST",
                "/token",
                None,
                json!({"username": "analyzer", "password": "nope"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_username_fails_validation() {
        let response = test_app()
            .oneshot(json_request(
                "POST",
                "/token",
                None,
                json!({"username": "", "password": PASSWORD}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_then_fetch_result() {
        let app = test_app();
        let token = login(&app).await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/analyze", Some(&token), analyze_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["session_id"], "session-1");
        assert_eq!(body["result"]["impact"]["severity"], "high");
        assert_eq!(body["result"]["changes"][0]["type"], "column_removed");
        assert_eq!(
            body["result"]["query_validation"][0]["errors"][0],
            "Referenced column not found: users.email"
        );

        let response = app
            .oneshot(get_request("/results/session-1", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = body_json(response).await;
        assert_eq!(stored["changes"], body["result"]["changes"]);
    }

    #[tokio::test]
    async fn test_generated_session_id() {
        let app = test_app();
        let token = login(&app).await;

        let mut request = analyze_body();
        request.as_object_mut().unwrap().remove("session_id");

        let response = app
            .oneshot(json_request("POST", "/analyze", Some(&token), request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let session_id = body["session_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(session_id).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_schema_is_unprocessable() {
        let app = test_app();
        let token = login(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/analyze",
                Some(&token),
                json!({
                    "old_schema": {"tables": []},
                    "new_schema": {"tables": [{"name": "users"}]}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "SCHEMA_SHAPE_ERROR");
        assert_eq!(body["error"], "tables[0]");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = test_app();
        let token = login(&app).await;

        let response = app
            .oneshot(get_request("/results/missing", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_rejected() {
        let app = test_app();
        let token = login(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(analyze_body().to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let app = test_app_with_limit(256);
        let token = login(&app).await;

        let padding: Vec<String> = (0..100).map(|i| format!("SELECT {} FROM users", i)).collect();
        let mut request = analyze_body();
        request["queries"] = json!(padding);

        let response = app
            .oneshot(json_request("POST", "/analyze", Some(&token), request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_metrics_disabled_without_recorder() {
        let response = test_app().oneshot(get_request("/metrics", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failing_storage_still_returns_report() {
        let app = build_app(Arc::new(BrokenStorage), |_| {});
        let token = login(&app).await;

        let response = app
            .oneshot(json_request("POST", "/analyze", Some(&token), analyze_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["session_id"], "session-1");
        assert_eq!(body["result"]["impact"]["severity"], "high");
    }

    #[tokio::test]
    async fn test_stalled_storage_still_returns_report() {
        let app = build_app(Arc::new(StalledStorage), one_second_requests);
        let token = login(&app).await;

        let response = app
            .oneshot(json_request("POST", "/analyze", Some(&token), analyze_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["changes"][0]["type"], "column_removed");
    }

    #[tokio::test]
    async fn test_stalled_lookup_is_unavailable() {
        let app = build_app(Arc::new(StalledStorage), one_second_requests);
        let token = login(&app).await;

        let response = app
            .oneshot(get_request("/results/session-1", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn test_request_deadline_answers_408() {
        let slow = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(request_deadline(Duration::from_millis(50)));

        let response = slow.oneshot(get_request("/slow", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
