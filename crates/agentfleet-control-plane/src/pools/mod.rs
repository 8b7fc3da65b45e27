//! Parallel worker pools.
//!
//! A split request becomes one pool with N workers, each with a dispatch
//! record for the execution layer. Completion reports move the pool
//! counters; the merge policy settles the pool once; cleanup archives it
//! after a grace period and retention eventually deletes it.

mod manager;
mod merge;
mod retention;

pub use manager::PoolManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agentfleet_core::{
    DispatchId, MergeStrategy, MergedResult, PoolId, PoolProgress, PoolStatus, SubtaskSpec, Worker,
    WorkerId, WorkerPool,
};

use crate::store::StoreError;

/// Pool orchestration errors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Split request has no subtasks")]
    EmptySplit,

    #[error("Parent agent not found: {0}")]
    ParentAgentNotFound(String),

    #[error("Worker pool not found: {0}")]
    PoolNotFound(PoolId),

    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request to split one task across parallel workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRequest {
    /// Agent that owns the split.
    pub parent_agent: String,

    /// Identifier of the task being split, e.g. `agt-249`.
    #[serde(default)]
    pub origin_task: Option<String>,

    pub subtasks: Vec<SubtaskSpec>,

    #[serde(default)]
    pub merge_strategy: MergeStrategy,

    /// Overall budget; the pool is force-failed once it elapses.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Handles created by a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub pool_id: PoolId,
    pub worker_ids: Vec<WorkerId>,
    pub dispatch_ids: Vec<DispatchId>,
}

/// Result of a completion report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReceipt {
    pub worker: Worker,
    pub progress: PoolProgress,
    /// A merge was scheduled by this report.
    pub merge_scheduled: bool,
}

/// Result of evaluating the merge policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub pool_id: PoolId,
    pub status: PoolStatus,
    pub success: bool,
    pub merged: MergedResult,
    /// The pool was already terminal; `merged` is the stored snapshot.
    pub already_merged: bool,
}

/// Result of a cleanup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Pool and workers were archived.
    Archived { workers_archived: usize },
    /// The pool is still running and cleanup was not forced.
    NotReady,
    /// The pool no longer exists.
    Gone,
}

/// One pool eligible for pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneCandidate {
    pub pool_id: PoolId,
    pub origin_identifier: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub age_days: i64,
}

/// Result of a retention prune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub candidates: Vec<PruneCandidate>,
    pub pools_deleted: usize,
    pub workers_deleted: usize,
}

/// Filter for pool listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolFilter {
    #[serde(default)]
    pub parent_agent: Option<String>,
    #[serde(default)]
    pub status: Option<PoolStatus>,
    #[serde(default)]
    pub include_archived: bool,
}

/// A pool with its workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDetail {
    pub pool: WorkerPool,
    pub workers: Vec<Worker>,
}

/// Maximum pools returned by one listing.
pub const LIST_LIMIT: usize = 50;
