//! haab-api — REST + WebSocket surface over the orchestrator.
//!
//! Adapts the five orchestrator operations to HTTP; all domain decisions
//! stay in haab-orchestrator, this crate only translates errors to status
//! codes and relays the log stream over a WebSocket.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Service banner |
//! | GET | `/system/check` | Runtime daemon version |
//! | GET | `/api/v1/apps` | List application records |
//! | POST | `/api/v1/apps` | Deploy an application |
//! | GET | `/api/v1/apps/runtime` | List runtime-managed containers |
//! | DELETE | `/api/v1/apps/{id}` | Tear an application down |
//! | GET | `/api/v1/apps/{id}/logs` | WebSocket live log stream |

pub mod handlers;
pub mod ws;

use axum::Router;
use axum::routing::get;
use haab_orchestrator::Orchestrator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Orchestrator,
}

/// Build the complete API router.
pub fn build_router(orchestrator: Orchestrator) -> Router {
    let state = ApiState { orchestrator };

    let api_routes = Router::new()
        .route("/apps", get(handlers::list_apps).post(handlers::deploy_app))
        .route("/apps/runtime", get(handlers::list_runtime_apps))
        .route("/apps/{id}", axum::routing::delete(handlers::delete_app))
        .route("/apps/{id}/logs", get(ws::logs_handler));

    Router::new()
        .route("/", get(handlers::root))
        .route("/system/check", get(handlers::system_check))
        .nest("/api/v1", api_routes)
        .with_state(state)
}
