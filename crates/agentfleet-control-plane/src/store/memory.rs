//! In-process store backed by `RwLock`ed maps.
//!
//! Every conditional update runs under a single write lock, so a
//! check-then-write is atomic with respect to other callers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use agentfleet_core::{
    merge_workers, AgentRecord, CoreError, Dispatch, DispatchId, DispatchStatus, EscalationTier,
    MergeDecision, PoolId, Task, TaskId, TaskStatus, Worker, WorkerId, WorkerOutcome, WorkerPool,
    WorkerStatus,
};

use super::{PoolStore, StoreResult, TaskStore};

#[derive(Default)]
struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    by_identifier: HashMap<String, TaskId>,
}

impl TaskTable {
    fn get_mut(&mut self, id: &TaskId) -> StoreResult<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()).into())
    }
}

#[derive(Default)]
struct PoolTable {
    pools: HashMap<PoolId, WorkerPool>,
    workers: HashMap<WorkerId, Worker>,
    dispatches: HashMap<DispatchId, Dispatch>,
}

impl PoolTable {
    fn pool_mut(&mut self, id: &PoolId) -> StoreResult<&mut WorkerPool> {
        self.pools
            .get_mut(id)
            .ok_or_else(|| CoreError::PoolNotFound(id.to_string()).into())
    }

    /// Workers of one pool, oldest first.
    fn pool_workers(&self, pool_id: &PoolId) -> Vec<Worker> {
        let mut workers: Vec<Worker> = self
            .workers
            .values()
            .filter(|w| &w.pool_id == pool_id)
            .cloned()
            .collect();
        workers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        workers
    }

    fn set_dispatch_status(&mut self, dispatch_id: Option<&DispatchId>, status: DispatchStatus) {
        if let Some(dispatch) = dispatch_id.and_then(|id| self.dispatches.get_mut(id)) {
            dispatch.status = status;
        }
    }
}

/// In-memory implementation of [`TaskStore`] and [`PoolStore`].
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<TaskTable>,
    agents: RwLock<Vec<AgentRecord>>,
    pools: RwLock<PoolTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.tasks.len()
    }

    /// Get the number of pools, archived included.
    pub async fn pool_count(&self) -> usize {
        self.pools.read().await.pools.len()
    }

    /// All workers across all pools.
    pub async fn all_workers(&self) -> Vec<Worker> {
        self.pools.read().await.workers.values().cloned().collect()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> StoreResult<()> {
        let mut table = self.tasks.write().await;
        if let Some(previous) = table.tasks.get(&task.id) {
            if let Some(identifier) = previous.identifier.as_deref().map(str::to_uppercase) {
                table.by_identifier.remove(&identifier);
            }
        }
        if let Some(identifier) = &task.identifier {
            table.by_identifier.insert(identifier.to_uppercase(), task.id.clone());
        }
        table.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.tasks.get(id).cloned())
    }

    async fn find_task_by_identifier(&self, identifier: &str) -> StoreResult<Option<Task>> {
        let table = self.tasks.read().await;
        Ok(table
            .by_identifier
            .get(&identifier.to_uppercase())
            .and_then(|id| table.tasks.get(id))
            .cloned())
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let table = self.tasks.read().await;
        let mut tasks: Vec<Task> = table.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn list_tasks_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>> {
        let table = self.tasks.read().await;
        let mut tasks: Vec<Task> = table
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<Task> {
        let mut table = self.tasks.write().await;
        let task = table.get_mut(id)?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn mark_task_blocked(&self, id: &TaskId, since: DateTime<Utc>) -> StoreResult<bool> {
        let mut table = self.tasks.write().await;
        Ok(table.get_mut(id)?.mark_blocked(since))
    }

    async fn raise_escalation_tier(&self, id: &TaskId, tier: EscalationTier) -> StoreResult<bool> {
        let mut table = self.tasks.write().await;
        Ok(table.get_mut(id)?.raise_tier(tier))
    }

    async fn clear_task_blocked(&self, id: &TaskId) -> StoreResult<bool> {
        let mut table = self.tasks.write().await;
        Ok(table.get_mut(id)?.clear_blocked())
    }

    async fn insert_agent(&self, agent: AgentRecord) -> StoreResult<()> {
        let mut agents = self.agents.write().await;
        agents.retain(|a| !a.matches(&agent.name));
        agents.push(agent);
        Ok(())
    }

    async fn find_agent(&self, name: &str) -> StoreResult<Option<AgentRecord>> {
        Ok(self
            .agents
            .read()
            .await
            .iter()
            .find(|a| a.matches(name))
            .cloned())
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn create_pool(
        &self,
        pool: WorkerPool,
        workers: Vec<Worker>,
        dispatches: Vec<Dispatch>,
    ) -> StoreResult<()> {
        if workers.len() != pool.total_workers as usize {
            return Err(CoreError::InvalidInput(format!(
                "pool {} expects {} workers, got {}",
                pool.id,
                pool.total_workers,
                workers.len()
            ))
            .into());
        }
        if let Some(stray) = workers.iter().find(|w| w.pool_id != pool.id) {
            return Err(CoreError::InvalidInput(format!(
                "worker {} belongs to pool {}",
                stray.id, stray.pool_id
            ))
            .into());
        }

        let mut table = self.pools.write().await;
        for worker in workers {
            table.workers.insert(worker.id.clone(), worker);
        }
        for dispatch in dispatches {
            table.dispatches.insert(dispatch.id.clone(), dispatch);
        }
        table.pools.insert(pool.id.clone(), pool);
        Ok(())
    }

    async fn get_pool(&self, id: &PoolId) -> StoreResult<Option<WorkerPool>> {
        Ok(self.pools.read().await.pools.get(id).cloned())
    }

    async fn list_pools(&self) -> StoreResult<Vec<WorkerPool>> {
        let table = self.pools.read().await;
        let mut pools: Vec<WorkerPool> = table.pools.values().cloned().collect();
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pools)
    }

    async fn start_pool(&self, id: &PoolId) -> StoreResult<WorkerPool> {
        let mut table = self.pools.write().await;
        let pool = table.pool_mut(id)?;
        pool.start()?;
        Ok(pool.clone())
    }

    async fn get_worker(&self, id: &WorkerId) -> StoreResult<Option<Worker>> {
        Ok(self.pools.read().await.workers.get(id).cloned())
    }

    async fn list_workers(&self, pool_id: &PoolId) -> StoreResult<Vec<Worker>> {
        Ok(self.pools.read().await.pool_workers(pool_id))
    }

    async fn list_dispatches(&self, pool_id: &PoolId) -> StoreResult<Vec<Dispatch>> {
        let table = self.pools.read().await;
        Ok(table
            .dispatches
            .values()
            .filter(|d| {
                table
                    .workers
                    .get(&d.worker_id)
                    .is_some_and(|w| &w.pool_id == pool_id)
            })
            .cloned()
            .collect())
    }

    async fn start_worker(&self, id: &WorkerId) -> StoreResult<Worker> {
        let mut table = self.pools.write().await;
        let worker = table
            .workers
            .get_mut(id)
            .ok_or_else(|| CoreError::WorkerNotFound(id.to_string()))?;
        worker.start()?;
        let worker = worker.clone();
        table.set_dispatch_status(worker.dispatch_id.as_ref(), DispatchStatus::Running);
        Ok(worker)
    }

    async fn finish_worker(
        &self,
        id: &WorkerId,
        outcome: &WorkerOutcome,
    ) -> StoreResult<(Worker, WorkerPool)> {
        let mut table = self.pools.write().await;

        let worker = table
            .workers
            .get(id)
            .ok_or_else(|| CoreError::WorkerNotFound(id.to_string()))?;
        if worker.is_terminal() {
            return Err(CoreError::WorkerAlreadyFinished {
                worker: id.to_string(),
                status: worker.status.to_string(),
            }
            .into());
        }
        let pool_id = worker.pool_id.clone();

        // Validate both records before touching either
        let pool = table.pool_mut(&pool_id)?;
        if pool.finished_workers() >= pool.total_workers {
            return Err(CoreError::InvalidStateTransition {
                from: format!("pool {} fully reported", pool_id),
                to: format!("report for worker {}", id),
            }
            .into());
        }

        let worker = table
            .workers
            .get_mut(id)
            .ok_or_else(|| CoreError::WorkerNotFound(id.to_string()))?;
        worker.finish(outcome)?;
        let worker = worker.clone();

        let dispatch_status = if outcome.success {
            DispatchStatus::Completed
        } else {
            DispatchStatus::Failed
        };
        table.set_dispatch_status(worker.dispatch_id.as_ref(), dispatch_status);

        let pool = table.pool_mut(&pool_id)?;
        pool.record_outcome(outcome.success)?;
        Ok((worker, pool.clone()))
    }

    async fn expire_pool(&self, id: &PoolId, error: &str) -> StoreResult<Option<usize>> {
        let mut table = self.pools.write().await;
        let pool = table.pool_mut(id)?;
        if pool.is_terminal() {
            return Ok(None);
        }
        pool.timed_out = true;
        pool.error = Some(error.to_string());

        let now = Utc::now();
        let mut forced = Vec::new();
        for worker in table.workers.values_mut() {
            if &worker.pool_id != id || worker.is_terminal() {
                continue;
            }
            worker.status = WorkerStatus::Failed;
            worker.error = Some(error.to_string());
            worker.completed_at = Some(now);
            worker.updated_at = now;
            forced.push(worker.dispatch_id.clone());
        }
        for dispatch_id in &forced {
            table.set_dispatch_status(dispatch_id.as_ref(), DispatchStatus::Failed);
        }

        let pool = table.pool_mut(id)?;
        for _ in &forced {
            pool.record_outcome(false)?;
        }
        Ok(Some(forced.len()))
    }

    async fn finalize_pool(&self, id: &PoolId) -> StoreResult<Option<(WorkerPool, MergeDecision)>> {
        let mut table = self.pools.write().await;
        let workers = table.pool_workers(id);
        let pool = table.pool_mut(id)?;
        if pool.is_terminal() {
            return Ok(None);
        }

        let decision = merge_workers(pool.merge_strategy, &workers, pool.timed_out);
        if !pool.finalize(decision.status, decision.merged.clone()) {
            return Ok(None);
        }
        Ok(Some((pool.clone(), decision)))
    }

    async fn archive_pool(&self, id: &PoolId) -> StoreResult<usize> {
        let mut table = self.pools.write().await;
        let now = Utc::now();
        let pool = table.pool_mut(id)?;
        pool.archived = true;
        pool.updated_at = now;

        let mut archived = 0;
        for worker in table.workers.values_mut().filter(|w| &w.pool_id == id) {
            worker.archived = true;
            worker.updated_at = now;
            archived += 1;
        }
        Ok(archived)
    }

    async fn delete_pool(&self, id: &PoolId) -> StoreResult<usize> {
        let mut table = self.pools.write().await;
        if table.pools.remove(id).is_none() {
            return Err(CoreError::PoolNotFound(id.to_string()).into());
        }

        let doomed: Vec<WorkerId> = table
            .workers
            .values()
            .filter(|w| &w.pool_id == id)
            .map(|w| w.id.clone())
            .collect();
        for worker_id in &doomed {
            table.workers.remove(worker_id);
        }
        table.dispatches.retain(|_, d| !doomed.contains(&d.worker_id));
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use agentfleet_core::{MergeStrategy, PoolStatus, SubtaskSpec};
    use std::sync::Arc;

    async fn seeded_pool(store: &MemoryStore, size: usize) -> (PoolId, Vec<WorkerId>) {
        let pool = WorkerPool::new("sam", MergeStrategy::AllSuccess, size as u32);
        let pool_id = pool.id.clone();
        let workers: Vec<Worker> = (0..size)
            .map(|i| Worker::from_spec(pool_id.clone(), &SubtaskSpec::new(format!("worker-{i}"), "run")))
            .collect();
        let ids = workers.iter().map(|w| w.id.clone()).collect();
        store.create_pool(pool, workers, Vec::new()).await.unwrap();
        store.start_pool(&pool_id).await.unwrap();
        (pool_id, ids)
    }

    #[tokio::test]
    async fn test_identifier_index() {
        let store = MemoryStore::new();
        let task = Task::new("schema").with_identifier("AGT-1");
        let id = task.id.clone();
        store.insert_task(task).await.unwrap();

        let found = store.find_task_by_identifier("AGT-1").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        let found = store.find_task_by_identifier("agt-1").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_task_by_identifier("AGT-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blocked_state_writes_are_conditional() {
        let store = MemoryStore::new();
        let task = Task::new("t").with_status(TaskStatus::InProgress);
        let id = task.id.clone();
        store.insert_task(task).await.unwrap();

        assert!(store.mark_task_blocked(&id, Utc::now()).await.unwrap());
        assert!(!store.mark_task_blocked(&id, Utc::now()).await.unwrap());
        assert!(store.raise_escalation_tier(&id, EscalationTier::Tier2).await.unwrap());
        assert!(!store.raise_escalation_tier(&id, EscalationTier::Tier2).await.unwrap());
        assert!(store.clear_task_blocked(&id).await.unwrap());
        assert!(!store.clear_task_blocked(&id).await.unwrap());

        let missing = store.clear_task_blocked(&TaskId::new("nope")).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_reports_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let (pool_id, worker_ids) = seeded_pool(&store, 32).await;

        let handles: Vec<_> = worker_ids
            .into_iter()
            .enumerate()
            .map(|(i, worker_id)| {
                let store = store.clone();
                tokio::spawn(async move {
                    let outcome = if i % 4 == 0 {
                        WorkerOutcome::failure("boom")
                    } else {
                        WorkerOutcome::success("ok")
                    };
                    store.finish_worker(&worker_id, &outcome).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let pool = store.get_pool(&pool_id).await.unwrap().unwrap();
        assert_eq!(pool.completed_workers, 24);
        assert_eq!(pool.failed_workers, 8);
        assert!(pool.progress().is_complete);
    }

    #[tokio::test]
    async fn test_duplicate_report_is_rejected_without_counting() {
        let store = MemoryStore::new();
        let (pool_id, worker_ids) = seeded_pool(&store, 2).await;

        store
            .finish_worker(&worker_ids[0], &WorkerOutcome::success("ok"))
            .await
            .unwrap();
        let err = store
            .finish_worker(&worker_ids[0], &WorkerOutcome::success("ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::WorkerAlreadyFinished { .. })));

        let pool = store.get_pool(&pool_id).await.unwrap().unwrap();
        assert_eq!(pool.completed_workers, 1);
        assert_eq!(pool.failed_workers, 0);
    }

    #[tokio::test]
    async fn test_expire_pool_counts_forced_failures() {
        let store = MemoryStore::new();
        let (pool_id, worker_ids) = seeded_pool(&store, 3).await;
        store
            .finish_worker(&worker_ids[0], &WorkerOutcome::success("ok"))
            .await
            .unwrap();

        let forced = store.expire_pool(&pool_id, "Pool timed out").await.unwrap();
        assert_eq!(forced, Some(2));

        let pool = store.get_pool(&pool_id).await.unwrap().unwrap();
        assert!(pool.timed_out);
        assert_eq!(pool.completed_workers, 1);
        assert_eq!(pool.failed_workers, 2);

        let (pool, decision) = store.finalize_pool(&pool_id).await.unwrap().unwrap();
        assert_eq!(pool.status, PoolStatus::Failed);
        assert!(decision.merged.timed_out);
        assert!(store.finalize_pool(&pool_id).await.unwrap().is_none());
        assert_eq!(store.expire_pool(&pool_id, "again").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pool_removes_workers() {
        let store = MemoryStore::new();
        let (pool_id, worker_ids) = seeded_pool(&store, 2).await;

        assert_eq!(store.archive_pool(&pool_id).await.unwrap(), 2);
        assert!(store.get_worker(&worker_ids[0]).await.unwrap().unwrap().archived);

        assert_eq!(store.delete_pool(&pool_id).await.unwrap(), 2);
        assert!(store.get_pool(&pool_id).await.unwrap().is_none());
        assert!(store.get_worker(&worker_ids[1]).await.unwrap().is_none());
        assert!(store.delete_pool(&pool_id).await.is_err());
    }
}
