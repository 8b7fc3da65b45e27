//! Blocker resolution and escalation.
//!
//! - [`BlockerResolver`] answers "is this dependency done?" without side effects.
//! - [`Escalator`] turns an escalation tier into notifications.
//! - [`BlockerMonitor`] runs the periodic scan that keeps stored blocked-state
//!   in line with the dependency graph.

mod escalation;
mod monitor;
mod resolver;

pub use escalation::Escalator;
pub use monitor::{run_scan_loop, BlockedTaskView, BlockerMonitor, ScanReport};
pub use resolver::BlockerResolver;

use thiserror::Error;

use agentfleet_core::TaskId;

use crate::store::StoreError;

/// Blocker engine errors.
#[derive(Debug, Error)]
pub enum BlockerError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
