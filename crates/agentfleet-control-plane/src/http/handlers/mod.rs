//! HTTP request handlers.

mod health;
mod pools;
mod tasks;

pub use health::{health_check, metrics_handler};
pub use pools::{
    cleanup_pool, complete_worker, get_pool, get_worker, list_pools, merge_pool, prune_pools,
    split_task, start_worker,
};
pub use tasks::{
    blocked_tasks, create_task, get_task, list_tasks, ready_tasks, run_scan, task_blockers,
    task_complexity, task_failed, unresolvable_blockers, update_task_status,
};
