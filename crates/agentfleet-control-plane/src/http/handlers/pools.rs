//! Worker pool handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Duration;

use agentfleet_core::{PoolId, WorkerId, WorkerOutcome};

use crate::http::responses::{ApiError, CleanupParams, PruneRequest};
use crate::pools::{PoolFilter, SplitRequest};
use crate::state::AppState;

/// Split a task into a worker pool.
pub async fn split_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SplitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.pools.split_task(req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// List pools, newest first.
pub async fn list_pools(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PoolFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pools.list_pools(&filter).await?))
}

/// One pool with its workers.
pub async fn get_pool(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pools.get_pool(&PoolId::new(pool_id)).await?))
}

/// Evaluate the merge policy now.
pub async fn merge_pool(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pools.merge_results(&PoolId::new(pool_id)).await?))
}

/// Archive a pool.
pub async fn cleanup_pool(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    Query(params): Query<CleanupParams>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .pools
        .cleanup_pool(&PoolId::new(pool_id), params.force)
        .await?;
    Ok(Json(outcome))
}

/// Delete old archived pools.
pub async fn prune_pools(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PruneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.older_than_days < 0 {
        return Err(ApiError::bad_request("older_than_days must not be negative"));
    }
    let report = state
        .pools
        .prune_archived_pools(Duration::days(req.older_than_days), req.dry_run)
        .await?;
    Ok(Json(report))
}

/// One worker.
pub async fn get_worker(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pools.get_worker(&WorkerId::new(worker_id)).await?))
}

/// A worker picked up its dispatch.
pub async fn start_worker(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state
            .pools
            .report_worker_started(&WorkerId::new(worker_id))
            .await?,
    ))
}

/// A worker finished.
pub async fn complete_worker(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
    Json(outcome): Json<WorkerOutcome>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .pools
        .report_worker_complete(&WorkerId::new(worker_id), outcome)
        .await?;
    Ok(Json(receipt))
}
