//! REST API handlers.
//!
//! Each handler delegates to the orchestrator and maps its error taxonomy
//! onto status codes: conflicts are 409, missing records 404, runtime
//! failures 502, everything else 500. The error body always names the
//! offending field so clients never have to re-derive it.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use haab_orchestrator::{DeleteError, DeployError};
use haab_state::ApplicationRecord;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Haab backend is running" }))
}

/// GET /system/check
pub async fn system_check(State(state): State<ApiState>) -> impl IntoResponse {
    match state.orchestrator.runtime_version().await {
        Ok(version) => ApiResponse::ok(serde_json::json!({
            "system": "Haab",
            "docker": version,
        }))
        .into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY).into_response(),
    }
}

/// Deploy request body.
#[derive(serde::Deserialize)]
pub struct DeployRequest {
    pub name: String,
    pub image: String,
    pub port: u16,
}

/// POST /api/v1/apps
pub async fn deploy_app(
    State(state): State<ApiState>,
    Json(req): Json<DeployRequest>,
) -> impl IntoResponse {
    match state.orchestrator.deploy(&req.name, &req.image, req.port).await {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => {
            let status = match &e {
                DeployError::PortConflict { .. } | DeployError::NameConflict { .. } => {
                    StatusCode::CONFLICT
                }
                DeployError::InvalidName { .. } => StatusCode::BAD_REQUEST,
                DeployError::ImagePullFailed { .. } | DeployError::RuntimeLaunchFailed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                DeployError::StoreWriteFailed { .. }
                | DeployError::OrphanedContainer { .. }
                | DeployError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(&e.to_string(), status).into_response()
        }
    }
}

/// GET /api/v1/apps
pub async fn list_apps(State(state): State<ApiState>) -> impl IntoResponse {
    match state.orchestrator.list() {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/apps/runtime
pub async fn list_runtime_apps(State(state): State<ApiState>) -> impl IntoResponse {
    match state.orchestrator.list_runtime_managed().await {
        Ok(containers) => ApiResponse::ok(containers).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY).into_response(),
    }
}

/// Delete response body.
#[derive(serde::Serialize)]
pub struct DeleteResponse {
    pub deleted: ApplicationRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// DELETE /api/v1/apps/{id}
pub async fn delete_app(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.orchestrator.delete(id).await {
        Ok(outcome) => ApiResponse::ok(DeleteResponse {
            deleted: outcome.record,
            warning: outcome.warning,
        })
        .into_response(),
        Err(DeleteError::NotFound(_)) => {
            error_response(&format!("no application with id {id}"), StatusCode::NOT_FOUND)
                .into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use haab_core::config::DockerConfig;
    use haab_orchestrator::Orchestrator;
    use haab_runtime::MockRuntime;
    use haab_state::RecordStore;

    fn test_state() -> (ApiState, Arc<MockRuntime>) {
        let store = RecordStore::open_in_memory().unwrap();
        let runtime = Arc::new(MockRuntime::new());
        let orchestrator = Orchestrator::new(store, runtime.clone(), &DockerConfig::default());
        (ApiState { orchestrator }, runtime)
    }

    fn deploy_req(name: &str, port: u16) -> DeployRequest {
        DeployRequest {
            name: name.to_string(),
            image: "nginx:alpine".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn deploy_returns_created() {
        let (state, _runtime) = test_state();
        let resp = deploy_app(State(state), Json(deploy_req("blog", 8081))).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn deploy_port_conflict_is_409() {
        let (state, _runtime) = test_state();
        deploy_app(State(state.clone()), Json(deploy_req("a", 8080)))
            .await
            .into_response();

        let resp = deploy_app(State(state), Json(deploy_req("b", 8080))).await;
        assert_eq!(resp.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deploy_invalid_name_is_400() {
        let (state, _runtime) = test_state();
        let resp = deploy_app(State(state), Json(deploy_req("Not Valid", 8080))).await;
        assert_eq!(resp.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deploy_pull_failure_is_502() {
        let (state, runtime) = test_state();
        runtime.fail_pulls("registry down").await;
        let resp = deploy_app(State(state), Json(deploy_req("blog", 8081))).await;
        assert_eq!(resp.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn list_empty_is_ok() {
        let (state, _runtime) = test_state();
        let resp = list_apps(State(state)).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_unknown_is_404() {
        let (state, _runtime) = test_state();
        let resp = delete_app(State(state), Path(42)).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_after_deploy_is_ok() {
        let (state, _runtime) = test_state();
        deploy_app(State(state.clone()), Json(deploy_req("blog", 8081)))
            .await
            .into_response();
        // The first record gets id 1.
        let resp = delete_app(State(state), Path(1)).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn system_check_reports_runtime_version() {
        let (state, _runtime) = test_state();
        let resp = system_check(State(state)).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }
}
