//! Blocker resolution records.

use crate::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Status string used for a reference that matches no task.
pub const NOT_FOUND_STATUS: &str = "not_found";

/// Resolution of one blocker reference, computed on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerResolution {
    /// The reference as written in the blocked task.
    pub reference: String,

    /// Handle of the task the reference resolved to.
    pub task_id: Option<TaskId>,

    /// Identifier for display: the task's identifier, its handle, or the raw reference.
    pub identifier: String,

    /// Title of the blocking task.
    pub title: String,

    /// Status of the blocking task, or `not_found`.
    pub status: String,

    /// Assignee of the blocking task.
    pub assignee: Option<String>,

    /// The blocking task is done.
    pub resolved: bool,

    /// The reference is dangling and will never resolve.
    pub unresolvable: bool,
}

impl BlockerResolution {
    /// Resolution for a reference that matched `task`.
    pub fn found(reference: impl Into<String>, task: &Task) -> Self {
        Self {
            reference: reference.into(),
            task_id: Some(task.id.clone()),
            identifier: task.display_identifier().to_string(),
            title: task.title.clone(),
            status: task.status.as_str().to_string(),
            assignee: task.agent_name.clone(),
            resolved: task.status == TaskStatus::Done,
            unresolvable: false,
        }
    }

    /// Resolution for a dangling reference.
    pub fn not_found(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            identifier: reference.clone(),
            reference,
            task_id: None,
            title: "Unknown task".to_string(),
            status: NOT_FOUND_STATUS.to_string(),
            assignee: None,
            resolved: false,
            unresolvable: true,
        }
    }
}

/// A dependency edge that points at nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvableBlocker {
    /// Task carrying the dangling reference.
    pub blocked_task_id: TaskId,
    pub blocked_task_title: String,
    pub blocked_task_identifier: Option<String>,

    /// The dangling reference.
    pub blocker_ref: String,

    /// Why the edge is dead.
    pub reason: String,
}

impl UnresolvableBlocker {
    pub fn new(task: &Task, blocker_ref: impl Into<String>) -> Self {
        Self {
            blocked_task_id: task.id.clone(),
            blocked_task_title: task.title.clone(),
            blocked_task_identifier: task.identifier.clone(),
            blocker_ref: blocker_ref.into(),
            reason: "Blocker task not found".to_string(),
        }
    }
}
