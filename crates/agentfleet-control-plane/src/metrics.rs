//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use agentfleet_core::{EscalationTier, PoolStatus, TaskStatus, WorkerStatus};

use crate::state::AppState;
use crate::store::{PoolStore, TaskStore};

const POOL_STATUSES: [PoolStatus; 5] = [
    PoolStatus::Pending,
    PoolStatus::Running,
    PoolStatus::Completed,
    PoolStatus::Failed,
    PoolStatus::Partial,
];

const WORKER_STATUSES: [WorkerStatus; 4] = [
    WorkerStatus::Pending,
    WorkerStatus::Running,
    WorkerStatus::Completed,
    WorkerStatus::Failed,
];

const TASK_STATUSES: [TaskStatus; 5] = [
    TaskStatus::Backlog,
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::Done,
];

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_pool_metrics(state, &mut output).await;
    collect_worker_metrics(state, &mut output).await;
    collect_task_metrics(state, &mut output).await;

    output
}

/// Collect live (non-archived) pools by status.
async fn collect_pool_metrics(state: &Arc<AppState>, output: &mut String) {
    let pools = state.store.list_pools().await.unwrap_or_default();

    let mut counts: HashMap<PoolStatus, u64> = HashMap::new();
    for pool in pools.iter().filter(|p| !p.archived) {
        *counts.entry(pool.status).or_default() += 1;
    }

    writeln!(output, "# HELP agentfleet_pools Number of live worker pools by status").ok();
    writeln!(output, "# TYPE agentfleet_pools gauge").ok();
    for status in POOL_STATUSES {
        let count = counts.get(&status).copied().unwrap_or(0);
        writeln!(output, "agentfleet_pools{{status=\"{status}\"}} {count}").ok();
    }

    let timed_out = pools.iter().filter(|p| p.timed_out).count();
    writeln!(output).ok();
    writeln!(output, "# HELP agentfleet_pools_timed_out_total Pools force-failed by the timeout guard").ok();
    writeln!(output, "# TYPE agentfleet_pools_timed_out_total gauge").ok();
    writeln!(output, "agentfleet_pools_timed_out_total {timed_out}").ok();
}

/// Collect live workers by status.
async fn collect_worker_metrics(state: &Arc<AppState>, output: &mut String) {
    let workers = state.store.all_workers().await;

    let mut counts: HashMap<WorkerStatus, u64> = HashMap::new();
    for worker in workers.iter().filter(|w| !w.archived) {
        *counts.entry(worker.status).or_default() += 1;
    }

    writeln!(output).ok();
    writeln!(output, "# HELP agentfleet_workers Number of live pool workers by status").ok();
    writeln!(output, "# TYPE agentfleet_workers gauge").ok();
    for status in WORKER_STATUSES {
        let count = counts.get(&status).copied().unwrap_or(0);
        writeln!(output, "agentfleet_workers{{status=\"{status}\"}} {count}").ok();
    }
}

/// Collect tasks by status and blocked tasks by escalation tier. Only
/// in-progress tasks count as blocked; the scan never revisits the rest.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let tasks = state.store.list_tasks().await.unwrap_or_default();

    let mut by_status: HashMap<TaskStatus, u64> = HashMap::new();
    let mut by_tier: HashMap<EscalationTier, u64> = HashMap::new();
    for task in &tasks {
        *by_status.entry(task.status).or_default() += 1;
        if task.status != TaskStatus::InProgress {
            continue;
        }
        if let Some(tier) = task.escalation_tier {
            *by_tier.entry(tier).or_default() += 1;
        }
    }

    writeln!(output).ok();
    writeln!(output, "# HELP agentfleet_tasks Number of tasks by status").ok();
    writeln!(output, "# TYPE agentfleet_tasks gauge").ok();
    for status in TASK_STATUSES {
        let count = by_status.get(&status).copied().unwrap_or(0);
        writeln!(output, "agentfleet_tasks{{status=\"{status}\"}} {count}").ok();
    }

    writeln!(output).ok();
    writeln!(output, "# HELP agentfleet_blocked_tasks Blocked tasks by escalation tier").ok();
    writeln!(output, "# TYPE agentfleet_blocked_tasks gauge").ok();
    for tier in EscalationTier::ALL {
        let count = by_tier.get(&tier).copied().unwrap_or(0);
        writeln!(output, "agentfleet_blocked_tasks{{tier=\"{}\"}} {count}", tier.level()).ok();
    }
}
