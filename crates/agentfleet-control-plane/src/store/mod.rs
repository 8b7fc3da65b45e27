//! Task store contract.
//!
//! The system of record lives outside this crate. These traits describe the
//! operations the engines need from it: indexed lookups, point reads, and
//! conditional updates that make each state transition a single atomic write.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use agentfleet_core::{
    AgentRecord, CoreError, Dispatch, EscalationTier, MergeDecision, PoolId, Task, TaskId,
    TaskStatus, Worker, WorkerId, WorkerOutcome, WorkerPool,
};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A domain rule rejected the write (not found, duplicate report, ...).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The backing store failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error is a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Domain(
                CoreError::TaskNotFound(_)
                    | CoreError::PoolNotFound(_)
                    | CoreError::WorkerNotFound(_)
                    | CoreError::AgentNotFound(_)
            )
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tasks and the agent directory.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> StoreResult<()>;

    async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>>;

    /// Case-insensitive lookup by identifier.
    async fn find_task_by_identifier(&self, identifier: &str) -> StoreResult<Option<Task>>;

    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;

    async fn list_tasks_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>>;

    async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<Task>;

    /// Start a blocked episode at tier 1. Returns false if the task was
    /// already blocked.
    async fn mark_task_blocked(&self, id: &TaskId, since: DateTime<Utc>) -> StoreResult<bool>;

    /// Raise the stored tier. Returns false unless it strictly increased.
    async fn raise_escalation_tier(&self, id: &TaskId, tier: EscalationTier) -> StoreResult<bool>;

    /// End the blocked episode. Returns false if the task was not blocked.
    async fn clear_task_blocked(&self, id: &TaskId) -> StoreResult<bool>;

    async fn insert_agent(&self, agent: AgentRecord) -> StoreResult<()>;

    /// Case-insensitive lookup by name.
    async fn find_agent(&self, name: &str) -> StoreResult<Option<AgentRecord>>;
}

/// Worker pools, workers and their dispatch records.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Insert a pool together with all of its workers and dispatches.
    async fn create_pool(
        &self,
        pool: WorkerPool,
        workers: Vec<Worker>,
        dispatches: Vec<Dispatch>,
    ) -> StoreResult<()>;

    async fn get_pool(&self, id: &PoolId) -> StoreResult<Option<WorkerPool>>;

    async fn list_pools(&self) -> StoreResult<Vec<WorkerPool>>;

    /// Move a pool `pending → running`.
    async fn start_pool(&self, id: &PoolId) -> StoreResult<WorkerPool>;

    async fn get_worker(&self, id: &WorkerId) -> StoreResult<Option<Worker>>;

    async fn list_workers(&self, pool_id: &PoolId) -> StoreResult<Vec<Worker>>;

    async fn list_dispatches(&self, pool_id: &PoolId) -> StoreResult<Vec<Dispatch>>;

    /// Move a worker `pending → running`.
    async fn start_worker(&self, id: &WorkerId) -> StoreResult<Worker>;

    /// Mark a worker terminal and bump the matching pool counter in one
    /// write. Rejects workers that already finished.
    async fn finish_worker(
        &self,
        id: &WorkerId,
        outcome: &WorkerOutcome,
    ) -> StoreResult<(Worker, WorkerPool)>;

    /// Flag a non-terminal pool as timed out and force-fail its unfinished
    /// workers. Returns `None` without writing if the pool is terminal.
    async fn expire_pool(&self, id: &PoolId, error: &str) -> StoreResult<Option<usize>>;

    /// Evaluate the pool's merge strategy over its workers and write the
    /// terminal status and snapshot in the same step, so no report or
    /// timeout can land between the read and the write. Returns `None`
    /// without writing if the pool was already terminal.
    async fn finalize_pool(&self, id: &PoolId) -> StoreResult<Option<(WorkerPool, MergeDecision)>>;

    /// Soft-delete a pool and its workers. Returns the number of workers archived.
    async fn archive_pool(&self, id: &PoolId) -> StoreResult<usize>;

    /// Hard-delete a pool, its workers and dispatches. Returns the number of
    /// workers deleted.
    async fn delete_pool(&self, id: &PoolId) -> StoreResult<usize>;
}
