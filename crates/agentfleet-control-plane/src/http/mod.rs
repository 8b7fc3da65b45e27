//! HTTP server for the control plane.
//!
//! Provides endpoints for:
//! - Tasks and blockers (`/v1/tasks`, `/v1/blockers`)
//! - Worker pools (`/v1/pools`, `/v1/workers`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer for dashboard access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Task routes
        .route("/v1/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/v1/tasks/ready", get(handlers::ready_tasks))
        .route("/v1/tasks/blocked", get(handlers::blocked_tasks))
        .route("/v1/tasks/:id", get(handlers::get_task))
        .route("/v1/tasks/:id/status", post(handlers::update_task_status))
        .route("/v1/tasks/:id/blockers", get(handlers::task_blockers))
        .route("/v1/tasks/:id/complexity", get(handlers::task_complexity))
        .route("/v1/tasks/:id/failed", post(handlers::task_failed))
        // Blocker routes
        .route("/v1/blockers/unresolvable", get(handlers::unresolvable_blockers))
        .route("/v1/blockers/scan", post(handlers::run_scan))
        // Pool routes
        .route("/v1/pools", get(handlers::list_pools).post(handlers::split_task))
        .route("/v1/pools/prune", post(handlers::prune_pools))
        .route("/v1/pools/:id", get(handlers::get_pool))
        .route("/v1/pools/:id/merge", post(handlers::merge_pool))
        .route("/v1/pools/:id/cleanup", post(handlers::cleanup_pool))
        .route("/v1/workers/:id", get(handlers::get_worker))
        .route("/v1/workers/:id/start", post(handlers::start_worker))
        .route("/v1/workers/:id/complete", post(handlers::complete_worker))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
