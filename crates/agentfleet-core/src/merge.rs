//! Merge policy evaluation over a pool's workers.

use crate::{MergeStrategy, PoolStatus, Worker, WorkerId, WorkerMetrics, WorkerStatus};
use serde::{Deserialize, Serialize};

/// A successful worker's contribution to the merged result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResultEntry {
    pub worker_id: WorkerId,
    pub name: String,
    pub result: Option<String>,
    pub metrics: Option<WorkerMetrics>,
}

/// A failed worker's reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerErrorEntry {
    pub worker_id: WorkerId,
    pub name: String,
    pub error: Option<String>,
}

/// Immutable snapshot of a pool's outcome, written once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    pub total_workers: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub timed_out: bool,
    pub results: Vec<WorkerResultEntry>,
    pub errors: Vec<WorkerErrorEntry>,
}

/// Status and snapshot produced by one merge evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDecision {
    pub status: PoolStatus,
    pub success: bool,
    pub merged: MergedResult,
}

/// Evaluate `strategy` over `workers`.
pub fn merge_workers(strategy: MergeStrategy, workers: &[Worker], timed_out: bool) -> MergeDecision {
    let mut results = Vec::new();
    let mut errors = Vec::new();
    let mut pending = 0;

    for worker in workers {
        match worker.status {
            WorkerStatus::Completed => results.push(WorkerResultEntry {
                worker_id: worker.id.clone(),
                name: worker.name.clone(),
                result: worker.result.clone(),
                metrics: worker.metrics.clone(),
            }),
            WorkerStatus::Failed => errors.push(WorkerErrorEntry {
                worker_id: worker.id.clone(),
                name: worker.name.clone(),
                error: worker.error.clone(),
            }),
            WorkerStatus::Pending | WorkerStatus::Running => pending += 1,
        }
    }

    let (status, success) = strategy.decide(results.len(), errors.len(), pending);

    MergeDecision {
        status,
        success,
        merged: MergedResult {
            total_workers: workers.len(),
            completed: results.len(),
            failed: errors.len(),
            pending,
            timed_out,
            results,
            errors,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PoolId, SubtaskSpec, WorkerOutcome};

    fn workers(outcomes: &[Option<bool>]) -> Vec<Worker> {
        let pool_id = PoolId::generate();
        outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| {
                let mut w = Worker::from_spec(pool_id.clone(), &SubtaskSpec::new(format!("worker-{}", i + 1), "run"));
                match outcome {
                    Some(true) => w.finish(&WorkerOutcome::success(format!("ok {i}"))).unwrap(),
                    Some(false) => w.finish(&WorkerOutcome::failure(format!("err {i}"))).unwrap(),
                    None => {}
                }
                w
            })
            .collect()
    }

    #[test]
    fn test_all_success_with_one_failure() {
        let decision = merge_workers(
            MergeStrategy::AllSuccess,
            &workers(&[Some(true), Some(true), Some(false)]),
            false,
        );
        assert_eq!(decision.status, PoolStatus::Failed);
        assert!(!decision.success);
        assert_eq!(decision.merged.completed, 2);
        assert_eq!(decision.merged.failed, 1);
        assert_eq!(decision.merged.errors[0].error.as_deref(), Some("err 2"));
    }

    #[test]
    fn test_first_success_ignores_unfinished() {
        let decision = merge_workers(MergeStrategy::FirstSuccess, &workers(&[None, Some(true), None]), false);
        assert_eq!(decision.status, PoolStatus::Completed);
        assert_eq!(decision.merged.pending, 2);
        assert_eq!(decision.merged.results[0].name, "worker-2");
    }

    #[test]
    fn test_best_effort_partial() {
        let decision = merge_workers(MergeStrategy::BestEffort, &workers(&[Some(true), Some(false)]), true);
        assert_eq!(decision.status, PoolStatus::Partial);
        assert!(decision.success);
        assert!(decision.merged.timed_out);
        assert_eq!(decision.merged.results.len(), 1);
    }
}
