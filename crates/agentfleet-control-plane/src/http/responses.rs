//! HTTP request and response types.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use agentfleet_core::{CoreError, TaskStatus};

use crate::blockers::BlockerError;
use crate::pools::PoolError;
use crate::store::StoreError;

// ============================================================================
// Task types
// ============================================================================

/// Request body for creating a task.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

/// Request body for moving a task on the board.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

/// Response for a failure propagation.
#[derive(Debug, Serialize)]
pub struct PropagationResponse {
    pub dependents_blocked: usize,
}

// ============================================================================
// Pool types
// ============================================================================

/// Query parameters for the cleanup endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    #[serde(default)]
    pub force: bool,
}

/// Request body for the prune endpoint.
#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub older_than_days: i64,
    #[serde(default)]
    pub dry_run: bool,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers, rendered as a status code plus [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::Domain(CoreError::WorkerAlreadyFinished { .. })
            | StoreError::Domain(CoreError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
            StoreError::Domain(CoreError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            _ if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        let message = e.to_string();
        match e {
            PoolError::Store(e) => e.into(),
            PoolError::EmptySplit => Self::bad_request(message),
            PoolError::ParentAgentNotFound(_)
            | PoolError::PoolNotFound(_)
            | PoolError::WorkerNotFound(_) => Self::new(StatusCode::NOT_FOUND, message),
        }
    }
}

impl From<BlockerError> for ApiError {
    fn from(e: BlockerError) -> Self {
        match e {
            BlockerError::Store(e) => e.into(),
            BlockerError::TaskNotFound(id) => {
                Self::new(StatusCode::NOT_FOUND, format!("Task not found: {id}"))
            }
        }
    }
}
