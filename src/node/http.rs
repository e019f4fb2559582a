//! Admin HTTP endpoint
//!
//! Read-only surface for operators and request routers: the node's cache
//! status and the generation it currently serves.

use crate::node::coordinator::CacheCoordinator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub hostname: String,
    pub status: String,
    pub code: i32,
    pub local_version: u64,
    pub started_at: String,
}

pub fn admin_router(coordinator: Arc<CacheCoordinator>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(coordinator)
        .layer(TraceLayer::new_for_http())
}

async fn status(State(coordinator): State<Arc<CacheCoordinator>>) -> Json<StatusBody> {
    let status = coordinator.status();
    Json(StatusBody {
        hostname: coordinator.hostname().to_string(),
        status: status.to_string(),
        code: status.code(),
        local_version: coordinator.local_version(),
        started_at: coordinator.started_at().to_rfc3339(),
    })
}

async fn healthz(State(coordinator): State<Arc<CacheCoordinator>>) -> StatusCode {
    if coordinator.is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
