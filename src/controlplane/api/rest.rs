//! REST API Handlers
//!
//! Thin HTTP layer over the component manager. Each handler parses the
//! path, hands the body to the manager and answers with the manager's
//! status code.

use crate::controlplane::manager::{ComponentManager, CreateComponentRequest, Section};
use crate::crd::ComponentKind;
use crate::error::Error;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Default request body limit
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

// =============================================================================
// Error Responses
// =============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Render an error with the status its classification calls for
pub fn error_response(e: &Error) -> Response {
    let status = e.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        debug!("Request rejected: {}", e);
    }

    let details = match e {
        Error::Kube(inner) => Some(format!("{:?}", inner)),
        _ => None,
    };

    (
        status,
        Json(ApiErrorResponse {
            error: e.code().into(),
            message: e.to_string(),
            details,
        }),
    )
        .into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

fn malformed_body(rejection: JsonRejection) -> Response {
    error_response(&Error::InvalidRequest(format!(
        "malformed request body: {}",
        rejection.body_text()
    )))
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    manager: Arc<ComponentManager>,
    max_body_size: usize,
}

impl RestRouter {
    pub fn new(manager: Arc<ComponentManager>) -> Self {
        Self {
            manager,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            manager: self.manager,
        };

        Router::new()
            .route("/api/v1/:kind/:namespace", post(create_component))
            .route(
                "/api/v1/:kind/:namespace/:name",
                get(get_component).delete(delete_component),
            )
            .route(
                "/api/v1/:kind/:namespace/:name/:section",
                get(get_component_section)
                    .put(update_component_section)
                    .patch(patch_component_section),
            )
            .route("/health", get(health_check))
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(TraceLayer::new_for_http())
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<ComponentManager>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_component(
    State(state): State<AppState>,
    Path((kind, namespace)): Path<(String, String)>,
    payload: Result<Json<CreateComponentRequest>, JsonRejection>,
) -> Response {
    let kind: ComponentKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(&e),
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };

    info!(kind = %kind, namespace = %namespace, name = %request.name, "Create requested");

    match state.manager.create_component(kind, &namespace, request).await {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_component(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Response {
    read_section(state, &kind, &namespace, &name, "all").await
}

async fn get_component_section(
    State(state): State<AppState>,
    Path((kind, namespace, name, section)): Path<(String, String, String, String)>,
) -> Response {
    read_section(state, &kind, &namespace, &name, &section).await
}

async fn read_section(
    state: AppState,
    kind: &str,
    namespace: &str,
    name: &str,
    section: &str,
) -> Response {
    let (kind, section) = match parse_target(kind, section) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(&e),
    };

    match state
        .manager
        .get_component_section(kind, namespace, name, section)
        .await
    {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn update_component_section(
    State(state): State<AppState>,
    Path((kind, namespace, name, section)): Path<(String, String, String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (kind, section) = match parse_target(&kind, &section) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(&e),
    };
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };

    info!(kind = %kind, namespace = %namespace, name = %name, section = %section, "Update requested");

    match state
        .manager
        .update_component_section(kind, &namespace, &name, section, body)
        .await
    {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn patch_component_section(
    State(state): State<AppState>,
    Path((kind, namespace, name, section)): Path<(String, String, String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (kind, section) = match parse_target(&kind, &section) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(&e),
    };
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };

    info!(kind = %kind, namespace = %namespace, name = %name, section = %section, "Patch requested");

    match state
        .manager
        .patch_component_section(kind, &namespace, &name, section, body)
        .await
    {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_component(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Response {
    let kind: ComponentKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(&e),
    };

    info!(kind = %kind, namespace = %namespace, name = %name, "Delete requested");

    match state.manager.delete_component(kind, &namespace, &name).await {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "healthy"})))
}

fn parse_target(kind: &str, section: &str) -> Result<(ComponentKind, Section), Error> {
    Ok((kind.parse()?, section.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployerConfig;
    use crate::controlplane::backends::MemoryStore;
    use crate::controlplane::metrics::DeployerMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn router() -> Router {
        let mut config =
            DeployerConfig::from_yaml_str(include_str!("../../../config/deployer.yaml")).unwrap();
        config.convergence.poll_interval_ms = 5;
        config.convergence.create_timeout_secs = 1;
        config.convergence.update_timeout_secs = 1;

        let store = Arc::new(MemoryStore::simulated());
        let manager = ComponentManager::new(
            Arc::new(config),
            store.clone(),
            store,
            Arc::new(DeployerMetrics::new().unwrap()),
        );
        RestRouter::new(Arc::new(manager)).build()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_component_lifecycle_over_http() {
        let app = router();

        let (status, body) = send(&app, "POST", "/api/v1/peer/org1", Some(json!({"name": "peer0"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "peer0");
        assert_eq!(body["outcome"], "Deployed");

        let (status, body) = send(&app, "GET", "/api/v1/peer/org1/peer0/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "2.2.1-3");

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/v1/peer/org1/peer0/actions",
            Some(json!({"enroll": {"ecert": true, "tlscert": false}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pendingActions"]["enroll"]["ecert"], true);

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/v1/peer/org1/peer0/actions",
            Some(json!({"reenroll": {"ecertNewKey": true}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "conflicting_actions");

        let (status, _) = send(&app, "DELETE", "/api/v1/peer/org1/peer0", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/api/v1/peer/org1/peer0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_rejects_bad_paths_and_bodies() {
        let app = router();

        let (status, body) = send(&app, "POST", "/api/v1/console/org1", Some(json!({"name": "c"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (status, body) = send(&app, "POST", "/api/v1/ca/org1", Some(json!({"name": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("malformed request body"));

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/ca/org1",
            Some(json!({"name": "ca1", "version": "0.0.1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_version");

        let (status, _) = send(&app, "POST", "/api/v1/ca/org1", Some(json!({"name": "ca1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, "POST", "/api/v1/ca/org1", Some(json!({"name": "ca1"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already_exists");

        let (status, body) = send(&app, "PUT", "/api/v1/ca/org1/ca1/storage", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unsupported_section");
    }

    #[tokio::test]
    async fn test_health() {
        let app = router();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
