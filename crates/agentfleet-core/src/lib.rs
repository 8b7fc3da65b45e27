//! agentfleet Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! Blocker records, escalation tiers, pools, workers and the merge policy
//! evaluation all live here so they can be reasoned about without a store.

pub mod blocker;
pub mod complexity;
pub mod error;
pub mod escalation;
pub mod ids;
pub mod merge;
pub mod pool;
pub mod status;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use blocker::{BlockerResolution, UnresolvableBlocker};
pub use complexity::{analyze_complexity, ComplexityAnalysis};
pub use error::CoreError;
pub use escalation::EscalationTier;
pub use ids::{DispatchId, PoolId, TaskId, WorkerId};
pub use merge::{merge_workers, MergeDecision, MergedResult, WorkerErrorEntry, WorkerResultEntry};
pub use pool::{MergeStrategy, PoolProgress, WorkerPool};
pub use status::{DispatchStatus, PoolStatus, TaskStatus, WorkerStatus};
pub use task::Task;
pub use worker::{AgentRecord, Dispatch, SubtaskSpec, Worker, WorkerMetrics, WorkerOutcome};
