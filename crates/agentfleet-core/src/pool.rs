//! Worker pool records.

use crate::{CoreError, MergedResult, PoolId, PoolStatus, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule for deciding a pool's outcome from its workers' outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Every worker must succeed.
    #[default]
    AllSuccess,
    /// The first success settles the pool.
    FirstSuccess,
    /// Collect everything; partial failure is tolerated.
    BestEffort,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllSuccess => "all_success",
            Self::FirstSuccess => "first_success",
            Self::BestEffort => "best_effort",
        }
    }

    /// Pool status for the given worker tallies, and whether the pool counts
    /// as a success.
    pub fn decide(&self, completed: usize, failed: usize, unfinished: usize) -> (PoolStatus, bool) {
        match self {
            Self::AllSuccess => {
                let success = failed == 0 && unfinished == 0;
                (if success { PoolStatus::Completed } else { PoolStatus::Failed }, success)
            }
            Self::FirstSuccess => {
                let success = completed > 0;
                (if success { PoolStatus::Completed } else { PoolStatus::Failed }, success)
            }
            Self::BestEffort => {
                if completed == 0 {
                    (PoolStatus::Failed, false)
                } else if failed == 0 {
                    (PoolStatus::Completed, true)
                } else {
                    (PoolStatus::Partial, true)
                }
            }
        }
    }

    /// Whether a single success should trigger an early merge.
    pub fn merges_on_first_success(&self) -> bool {
        matches!(self, Self::FirstSuccess)
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_success" => Ok(Self::AllSuccess),
            "first_success" => Ok(Self::FirstSuccess),
            "best_effort" => Ok(Self::BestEffort),
            other => Err(CoreError::InvalidInput(format!(
                "unknown merge strategy: {other}"
            ))),
        }
    }
}

/// Pool-level progress after a worker report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolProgress {
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
    pub is_complete: bool,
}

/// The set of workers spawned from one split request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPool {
    /// Unique pool identifier.
    pub id: PoolId,

    /// Agent that requested the split (lower-cased).
    pub parent_agent: String,

    /// Store handle of the originating task, when it exists.
    pub origin_task: Option<TaskId>,

    /// Identifier of the originating task as given by the caller.
    pub origin_identifier: Option<String>,

    pub status: PoolStatus,
    pub merge_strategy: MergeStrategy,

    /// Overall time budget in milliseconds.
    pub timeout_ms: Option<u64>,

    pub total_workers: u32,
    pub completed_workers: u32,
    pub failed_workers: u32,

    /// Snapshot written once by the merge.
    pub merged_result: Option<MergedResult>,

    /// The timeout guard fired before the pool finished.
    pub timed_out: bool,

    /// Pool-level error, e.g. the timeout reason.
    pub error: Option<String>,

    /// Soft-deleted.
    pub archived: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl WorkerPool {
    /// Create a pending pool expecting `total_workers` workers.
    pub fn new(parent_agent: impl Into<String>, merge_strategy: MergeStrategy, total_workers: u32) -> Self {
        let now = Utc::now();
        Self {
            id: PoolId::generate(),
            parent_agent: parent_agent.into(),
            origin_task: None,
            origin_identifier: None,
            status: PoolStatus::Pending,
            merge_strategy,
            timeout_ms: None,
            total_workers,
            completed_workers: 0,
            failed_workers: 0,
            merged_result: None,
            timed_out: false,
            error: None,
            archived: false,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Workers that reached a terminal state.
    pub fn finished_workers(&self) -> u32 {
        self.completed_workers + self.failed_workers
    }

    pub fn progress(&self) -> PoolProgress {
        PoolProgress {
            completed: self.completed_workers,
            failed: self.failed_workers,
            total: self.total_workers,
            is_complete: self.finished_workers() == self.total_workers,
        }
    }

    /// Count one finished worker.
    pub fn record_outcome(&mut self, success: bool) -> Result<PoolProgress, CoreError> {
        if self.finished_workers() >= self.total_workers {
            return Err(CoreError::InvalidStateTransition {
                from: format!("{}/{} finished", self.finished_workers(), self.total_workers),
                to: "one more finished worker".to_string(),
            });
        }
        if success {
            self.completed_workers += 1;
        } else {
            self.failed_workers += 1;
        }
        self.updated_at = Utc::now();
        Ok(self.progress())
    }

    /// Move `pending → running`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.status != PoolStatus::Pending {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: PoolStatus::Running.to_string(),
            });
        }
        let now = Utc::now();
        self.status = PoolStatus::Running;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Write the terminal status and snapshot. Returns false, changing
    /// nothing, if the pool is already terminal.
    pub fn finalize(&mut self, status: PoolStatus, merged: MergedResult) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = status;
        self.merged_result = Some(merged);
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Reference time for retention: completion, falling back to creation.
    pub fn retention_anchor(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table() {
        use PoolStatus::*;

        assert_eq!(MergeStrategy::AllSuccess.decide(3, 0, 0), (Completed, true));
        assert_eq!(MergeStrategy::AllSuccess.decide(2, 1, 0), (Failed, false));
        assert_eq!(MergeStrategy::AllSuccess.decide(2, 0, 1), (Failed, false));

        assert_eq!(MergeStrategy::FirstSuccess.decide(1, 0, 2), (Completed, true));
        assert_eq!(MergeStrategy::FirstSuccess.decide(0, 3, 0), (Failed, false));

        assert_eq!(MergeStrategy::BestEffort.decide(2, 0, 0), (Completed, true));
        assert_eq!(MergeStrategy::BestEffort.decide(1, 1, 0), (Partial, true));
        assert_eq!(MergeStrategy::BestEffort.decide(0, 2, 0), (Failed, false));
    }

    #[test]
    fn test_counters_cannot_exceed_total() {
        let mut pool = WorkerPool::new("sam", MergeStrategy::AllSuccess, 2);
        pool.record_outcome(true).unwrap();
        let progress = pool.record_outcome(false).unwrap();
        assert!(progress.is_complete);
        assert!(pool.record_outcome(true).is_err());
        assert_eq!(pool.finished_workers(), 2);
    }

    #[test]
    fn test_finalize_only_once() {
        let mut pool = WorkerPool::new("sam", MergeStrategy::BestEffort, 1);
        pool.start().unwrap();
        assert!(pool.finalize(PoolStatus::Completed, MergedResult::default()));
        assert!(!pool.finalize(PoolStatus::Failed, MergedResult::default()));
        assert_eq!(pool.status, PoolStatus::Completed);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("best_effort".parse::<MergeStrategy>().unwrap(), MergeStrategy::BestEffort);
        assert!("most_success".parse::<MergeStrategy>().is_err());
    }
}
