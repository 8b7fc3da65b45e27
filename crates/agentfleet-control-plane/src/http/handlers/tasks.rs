//! Task and blocker handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use agentfleet_core::{analyze_complexity, Task, TaskId, TaskStatus};

use crate::http::responses::{ApiError, CreateTaskRequest, PropagationResponse, UpdateStatusRequest};
use crate::state::AppState;
use crate::store::TaskStore;

/// Register a task.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("title must not be empty"));
    }

    let mut task = Task::new(req.title)
        .with_description(req.description)
        .with_status(req.status);
    if let Some(identifier) = req.identifier {
        task = task.with_identifier(identifier.to_uppercase());
    }
    if let Some(agent) = req.agent_name {
        task = task.with_agent(agent);
    }
    task.blocked_by = req.blocked_by;

    state.store.insert_task(task.clone()).await?;
    info!(task_id = %task.id, task = %task.label(), blockers = task.blocked_by.len(), "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// List all tasks.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_tasks().await?))
}

/// One task by handle.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .store
        .get_task(&TaskId::new(task_id.clone()))
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Task not found: {task_id}")))?;
    Ok(Json(task))
}

/// Move a task on the board.
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .store
        .set_task_status(&TaskId::new(task_id), req.status)
        .await?;
    info!(task_id = %task.id, status = %task.status, "Task status changed");
    Ok(Json(task))
}

/// Resolution records for one task's blockers.
pub async fn task_blockers(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resolutions = state
        .blockers
        .resolver()
        .task_blockers(&TaskId::new(task_id))
        .await?;
    Ok(Json(resolutions))
}

/// Splitting analysis for one task.
pub async fn task_complexity(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .store
        .get_task(&TaskId::new(task_id.clone()))
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Task not found: {task_id}")))?;
    Ok(Json(analyze_complexity(&task)))
}

/// Tasks currently in a blocked episode.
pub async fn blocked_tasks(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blockers.blocked_tasks().await?))
}

/// Dependency edges that point at nothing.
pub async fn unresolvable_blockers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blockers.resolver().unresolvable_blockers().await?))
}

/// Run a blocker scan pass now.
pub async fn run_scan(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blockers.scan().await?))
}

/// Report a failed task; its in-progress dependents become blocked.
pub async fn task_failed(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dependents_blocked = state
        .blockers
        .propagate_failure(&TaskId::new(task_id))
        .await?;
    Ok(Json(PropagationResponse { dependents_blocked }))
}

/// Tasks an agent could pick up: todo, not blocked.
pub async fn ready_tasks(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut ready = Vec::new();
    for task in state.store.list_tasks_by_status(TaskStatus::Todo).await? {
        if !state.blockers.resolver().is_blocked(&task).await? {
            ready.push(task);
        }
    }
    Ok(Json(ready))
}
