use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use cmgr_core::deps::DependencySnapshot;
use cmgr_core::profile::{CleanRequest, CleanTarget, ProfileConfig, ProfileStatus};
use cmgr_runtime::orchestrator::ProfileOrchestrator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ProfileOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ProfileOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<ProfileOrchestrator> {
        &self.orchestrator
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: status.into(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KubeconfigResponse {
    pub kubeconfig: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the API router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dependencies", get(check_dependencies))
        .route("/dependencies/update", post(update_dependencies))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/kubeconfig", get(kubeconfig))
        .route("/clean", post(clean))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a JSON body. An empty body is treated as `{}`.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    required_json(body)
}

fn required_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_dependencies(
    State(state): State<AppState>,
) -> Result<Json<DependencySnapshot>, ApiError> {
    Ok(Json(state.orchestrator.check_dependencies().await?))
}

async fn update_dependencies(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.orchestrator.update_dependencies().await?;
    Ok(StatusResponse::new("dependencies updated"))
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<ProfileStatus>, ApiError> {
    Ok(Json(state.orchestrator.status(&query.profile).await?))
}

async fn start(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusResponse>, ApiError> {
    let config: ProfileConfig = optional_json(&body)?;
    state.orchestrator.start(config).await?;
    Ok(StatusResponse::new("started"))
}

async fn stop(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.orchestrator.stop(&query.profile).await?;
    Ok(StatusResponse::new("stopped"))
}

async fn kubeconfig(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<KubeconfigResponse>, ApiError> {
    let kubeconfig = state.orchestrator.kubeconfig(&query.profile).await?;
    Ok(Json(KubeconfigResponse { kubeconfig }))
}

/// An explicit body is required: `{"profile": ""}` cleans every profile.
async fn clean(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusResponse>, ApiError> {
    let request: CleanRequest = required_json(&body)?;
    let target = request.target();
    let message = match &target {
        CleanTarget::All => "all profiles cleaned".to_string(),
        CleanTarget::Profile(p) => format!("profile {} cleaned", p),
    };
    state.orchestrator.clean(target).await?;
    Ok(StatusResponse::new(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use cmgr_core::layout::StateLayout;
    use cmgr_core::lock::ProfileLocks;
    use cmgr_runtime::testing::{FakeDependencies, FakeStateStore, FakeVmManager};
    use tower::ServiceExt;

    use crate::error::ErrorResponse;

    fn test_state(vm: FakeVmManager, profiles: &[&str]) -> AppState {
        let layout = StateLayout::new(Path::new("/Users/dev"));
        let store = FakeStateStore::new();
        for p in profiles {
            store.add_dir(layout.profile_dir(p));
        }
        let orch = ProfileOrchestrator::new(
            Arc::new(vm),
            Arc::new(FakeDependencies::installed()),
            Arc::new(store),
            layout,
            Arc::new(ProfileLocks::new()),
        );
        AppState::new(Arc::new(orch))
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: &str) -> Response {
        router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "GET", "/health", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = json(response).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_running() {
        let state = test_state(
            FakeVmManager::new().with_probe(true, "running\nCPU: 4\nMemory: 8\nDisk: 60\n"),
            &["p1"],
        );
        let response = send(&state, "GET", "/status?profile=p1", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["cpus"], 4);
        assert_eq!(body["memory"], 8);
        assert_eq!(body["disk_size"], 60);
        assert_eq!(body["kubernetes"], false);
        assert_eq!(body["profile"], "p1");
    }

    #[tokio::test]
    async fn test_status_not_found() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "GET", "/status", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.kind, "profile_not_found");
        assert_eq!(body.error, "profile 'default' does not exist");
    }

    #[tokio::test]
    async fn test_status_invalid_profile() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "GET", "/status?profile=..", "").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.kind, "invalid_profile");
    }

    #[tokio::test]
    async fn test_start() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "POST", "/start", r#"{"profile":"dev","cpus":2}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: StatusResponse = json(response).await;
        assert_eq!(body.status, "started");
    }

    #[tokio::test]
    async fn test_start_empty_body_uses_defaults() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "POST", "/start", "").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_malformed_body() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "POST", "/start", "{not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.kind, "bad_request");
    }

    #[tokio::test]
    async fn test_start_busy() {
        let state = test_state(FakeVmManager::new(), &[]);
        let _held = state.orchestrator().locks().try_lock("dev").unwrap();
        let response = send(&state, "POST", "/start", r#"{"profile":"dev"}"#).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.kind, "profile_busy");
    }

    #[tokio::test]
    async fn test_start_failure_is_500() {
        let state = test_state(FakeVmManager::new().failing("start", "boom"), &[]);
        let response = send(&state, "POST", "/start", "{}").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = json(response).await;
        assert_eq!(body.kind, "vm_manager");
    }

    #[tokio::test]
    async fn test_start_requires_post() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "GET", "/start", "").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_stop() {
        let state = test_state(FakeVmManager::new(), &["dev"]);
        let response = send(&state, "POST", "/stop?profile=dev", "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, "POST", "/stop?profile=ghost", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_kubeconfig() {
        let state = test_state(
            FakeVmManager::new().with_credentials("dev", "apiVersion: v1\n"),
            &["dev"],
        );
        let response = send(&state, "GET", "/kubeconfig?profile=dev", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: KubeconfigResponse = json(response).await;
        assert_eq!(body.kubeconfig, "apiVersion: v1\n");
    }

    #[tokio::test]
    async fn test_clean_messages() {
        let state = test_state(FakeVmManager::new(), &["dev"]);
        let response = send(&state, "POST", "/clean", r#"{"profile":"dev"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: StatusResponse = json(response).await;
        assert_eq!(body.status, "profile dev cleaned");

        let response = send(&state, "POST", "/clean", r#"{"profile":""}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: StatusResponse = json(response).await;
        assert_eq!(body.status, "all profiles cleaned");
    }

    #[tokio::test]
    async fn test_clean_requires_body() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "POST", "/clean", "").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dependencies() {
        let state = test_state(FakeVmManager::new(), &[]);
        let response = send(&state, "GET", "/dependencies", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: DependencySnapshot = json(response).await;
        assert!(body.vm_ready());

        let response = send(&state, "POST", "/dependencies/update", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: StatusResponse = json(response).await;
        assert_eq!(body.status, "dependencies updated");
    }
}
