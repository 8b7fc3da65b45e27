//! Core domain errors.

use thiserror::Error;

/// Core domain errors for agentfleet.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Worker pool not found.
    #[error("Worker pool not found: {0}")]
    PoolNotFound(String),

    /// Worker not found.
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    /// Agent not found.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// A worker reported more than once.
    #[error("Worker {worker} already finished with status {status}")]
    WorkerAlreadyFinished { worker: String, status: String },

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
