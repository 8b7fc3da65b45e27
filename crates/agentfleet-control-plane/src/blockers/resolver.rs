//! Blocker resolution.

use std::sync::Arc;

use agentfleet_core::{BlockerResolution, Task, TaskId, TaskStatus, UnresolvableBlocker};

use super::BlockerError;
use crate::store::{StoreResult, TaskStore};

/// Read-only view of the dependency graph.
#[derive(Clone)]
pub struct BlockerResolver {
    store: Arc<dyn TaskStore>,
}

impl BlockerResolver {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Resolve one blocker reference. The reference is tried as an
    /// identifier first, then as a raw handle.
    pub async fn resolve_blocker(&self, reference: &str) -> StoreResult<BlockerResolution> {
        if let Some(task) = self.store.find_task_by_identifier(reference).await? {
            return Ok(BlockerResolution::found(reference, &task));
        }
        if let Some(task) = self.store.get_task(&TaskId::new(reference)).await? {
            return Ok(BlockerResolution::found(reference, &task));
        }
        Ok(BlockerResolution::not_found(reference))
    }

    /// Resolve every blocker of `task`, in order.
    pub async fn resolve_all(&self, task: &Task) -> StoreResult<Vec<BlockerResolution>> {
        let mut resolutions = Vec::with_capacity(task.blocked_by.len());
        for reference in &task.blocked_by {
            resolutions.push(self.resolve_blocker(reference).await?);
        }
        Ok(resolutions)
    }

    /// A task is blocked when it has blockers and at least one is not done.
    /// Dangling references count as unresolved.
    pub async fn is_blocked(&self, task: &Task) -> StoreResult<bool> {
        for reference in &task.blocked_by {
            if !self.resolve_blocker(reference).await?.resolved {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolution records for one task's blockers.
    pub async fn task_blockers(&self, task_id: &TaskId) -> Result<Vec<BlockerResolution>, BlockerError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| BlockerError::TaskNotFound(task_id.clone()))?;
        Ok(self.resolve_all(&task).await?)
    }

    /// Every `(task, reference)` pair whose reference points at nothing.
    pub async fn unresolvable_blockers(&self) -> StoreResult<Vec<UnresolvableBlocker>> {
        let mut dead_ends = Vec::new();
        for task in self.store.list_tasks().await? {
            for reference in &task.blocked_by {
                if self.resolve_blocker(reference).await?.unresolvable {
                    dead_ends.push(UnresolvableBlocker::new(&task, reference.clone()));
                }
            }
        }
        Ok(dead_ends)
    }

    /// In-progress tasks that list at least one blocker.
    pub(crate) async fn tasks_with_blockers(&self) -> StoreResult<Vec<Task>> {
        Ok(self
            .store
            .list_tasks_by_status(TaskStatus::InProgress)
            .await?
            .into_iter()
            .filter(Task::has_blockers)
            .collect())
    }
}
