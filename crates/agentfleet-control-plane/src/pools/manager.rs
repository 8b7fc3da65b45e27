//! Pool creation, worker reports and read queries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use agentfleet_core::{Dispatch, PoolId, Worker, WorkerId, WorkerOutcome, WorkerPool};

use super::{PoolDetail, PoolError, PoolFilter, ReportReceipt, SplitOutcome, SplitRequest, LIST_LIMIT};
use crate::blockers::BlockerMonitor;
use crate::scheduler::{Callback, CallbackScheduler};
use crate::store::{PoolStore, TaskStore};

/// Orchestrates worker pools.
pub struct PoolManager {
    pub(super) tasks: Arc<dyn TaskStore>,
    pub(super) pools: Arc<dyn PoolStore>,
    pub(super) scheduler: Arc<dyn CallbackScheduler>,
    pub(super) cleanup_grace: Duration,
    pub(super) failure_hook: Option<Arc<BlockerMonitor>>,
}

impl PoolManager {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        pools: Arc<dyn PoolStore>,
        scheduler: Arc<dyn CallbackScheduler>,
        cleanup_grace: Duration,
    ) -> Self {
        Self {
            tasks,
            pools,
            scheduler,
            cleanup_grace,
            failure_hook: None,
        }
    }

    /// Propagate failed pools to the dependents of their originating task.
    pub fn with_failure_propagation(mut self, monitor: Arc<BlockerMonitor>) -> Self {
        self.failure_hook = Some(monitor);
        self
    }

    /// Create a pool from a split request and hand its workers to the
    /// execution layer.
    ///
    /// The pool, its workers and their dispatch records are written together,
    /// then the pool moves to `running`.
    pub async fn split_task(&self, request: SplitRequest) -> Result<SplitOutcome, PoolError> {
        if request.subtasks.is_empty() {
            return Err(PoolError::EmptySplit);
        }

        let parent = self
            .tasks
            .find_agent(&request.parent_agent)
            .await?
            .ok_or_else(|| PoolError::ParentAgentNotFound(request.parent_agent.clone()))?;
        let parent_name = parent.name.to_lowercase();

        let origin_identifier = request.origin_task.as_deref().map(str::to_uppercase);
        let origin_task = match &origin_identifier {
            Some(identifier) => self.tasks.find_task_by_identifier(identifier).await?,
            None => None,
        };

        let mut pool = WorkerPool::new(
            parent_name.clone(),
            request.merge_strategy,
            request.subtasks.len() as u32,
        );
        pool.origin_task = origin_task.map(|t| t.id);
        pool.origin_identifier = origin_identifier.clone();
        pool.timeout_ms = request.timeout_ms;
        let pool_id = pool.id.clone();

        let mut workers = Vec::with_capacity(request.subtasks.len());
        let mut dispatches = Vec::with_capacity(request.subtasks.len());
        for spec in &request.subtasks {
            let mut worker = Worker::from_spec(pool_id.clone(), spec);
            let dispatch = Dispatch::for_worker(parent_name.clone(), &worker, origin_identifier.as_deref());
            worker.dispatch_id = Some(dispatch.id.clone());
            workers.push(worker);
            dispatches.push(dispatch);
        }

        let outcome = SplitOutcome {
            pool_id: pool_id.clone(),
            worker_ids: workers.iter().map(|w| w.id.clone()).collect(),
            dispatch_ids: dispatches.iter().map(|d| d.id.clone()).collect(),
        };

        self.pools.create_pool(pool, workers, dispatches).await?;
        self.pools.start_pool(&pool_id).await?;

        if let Some(timeout_ms) = request.timeout_ms {
            self.scheduler
                .schedule(Duration::from_millis(timeout_ms), Callback::PoolTimeout(pool_id.clone()));
        }

        info!(
            pool_id = %pool_id,
            parent_agent = %parent_name,
            origin = ?origin_identifier,
            workers = outcome.worker_ids.len(),
            strategy = %request.merge_strategy,
            timeout_ms = ?request.timeout_ms,
            "Worker pool created"
        );

        Ok(outcome)
    }

    /// A worker picked up its dispatch.
    pub async fn report_worker_started(&self, worker_id: &WorkerId) -> Result<Worker, PoolError> {
        let worker = self.pools.start_worker(worker_id).await.map_err(|e| {
            if e.is_not_found() {
                PoolError::WorkerNotFound(worker_id.clone())
            } else {
                e.into()
            }
        })?;
        debug!(worker_id = %worker_id, pool_id = %worker.pool_id, "Worker started");
        Ok(worker)
    }

    /// Record a worker's terminal outcome.
    ///
    /// A worker reports once; a second report is rejected and changes
    /// nothing. Once every worker finished, or on the first success under
    /// `first_success`, a merge is scheduled.
    pub async fn report_worker_complete(
        &self,
        worker_id: &WorkerId,
        outcome: WorkerOutcome,
    ) -> Result<ReportReceipt, PoolError> {
        let (worker, pool) = self
            .pools
            .finish_worker(worker_id, &outcome)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PoolError::WorkerNotFound(worker_id.clone())
                } else {
                    e.into()
                }
            })?;

        let progress = pool.progress();
        info!(
            worker_id = %worker_id,
            pool_id = %pool.id,
            success = outcome.success,
            completed = progress.completed,
            failed = progress.failed,
            total = progress.total,
            "Worker finished"
        );

        let wants_merge = progress.is_complete
            || (outcome.success && pool.merge_strategy.merges_on_first_success());
        let merge_scheduled = wants_merge && !pool.is_terminal();
        if merge_scheduled {
            self.scheduler
                .schedule(Duration::ZERO, Callback::MergePool(pool.id.clone()));
        }

        Ok(ReportReceipt {
            worker,
            progress,
            merge_scheduled,
        })
    }

    /// Pools matching `filter`, newest first.
    pub async fn list_pools(&self, filter: &PoolFilter) -> Result<Vec<WorkerPool>, PoolError> {
        let parent = filter.parent_agent.as_deref().map(str::to_lowercase);
        Ok(self
            .pools
            .list_pools()
            .await?
            .into_iter()
            .filter(|p| filter.include_archived || !p.archived)
            .filter(|p| parent.as_deref().map_or(true, |name| p.parent_agent == name))
            .filter(|p| filter.status.map_or(true, |status| p.status == status))
            .take(LIST_LIMIT)
            .collect())
    }

    /// A pool with its workers.
    pub async fn get_pool(&self, pool_id: &PoolId) -> Result<PoolDetail, PoolError> {
        let pool = self.load_pool(pool_id).await?;
        let workers = self.pools.list_workers(pool_id).await?;
        Ok(PoolDetail { pool, workers })
    }

    pub async fn get_worker(&self, worker_id: &WorkerId) -> Result<Worker, PoolError> {
        self.pools
            .get_worker(worker_id)
            .await?
            .ok_or_else(|| PoolError::WorkerNotFound(worker_id.clone()))
    }

    pub(super) async fn load_pool(&self, pool_id: &PoolId) -> Result<WorkerPool, PoolError> {
        self.pools
            .get_pool(pool_id)
            .await?
            .ok_or_else(|| PoolError::PoolNotFound(pool_id.clone()))
    }

    pub(super) fn schedule_cleanup(&self, pool_id: &PoolId) {
        self.scheduler
            .schedule(self.cleanup_grace, Callback::CleanupPool(pool_id.clone()));
    }

    pub(super) async fn propagate_failure(&self, pool: &WorkerPool) {
        let (Some(monitor), Some(origin)) = (&self.failure_hook, &pool.origin_task) else {
            return;
        };
        if let Err(e) = monitor.propagate_failure(origin).await {
            warn!(pool_id = %pool.id, origin = %origin, error = %e, "Failed to propagate pool failure");
        }
    }
}
