//! Merge policy evaluation and the timeout guard.

use tracing::{info, warn};

use agentfleet_core::{worker::TIMEOUT_ERROR, PoolId, PoolStatus, WorkerPool};

use super::{MergeOutcome, PoolError, PoolManager};

impl PoolManager {
    /// Settle a pool with its merge strategy.
    ///
    /// Runs at most once per pool: a terminal pool returns its stored
    /// snapshot and changes nothing. When a concurrent merge wins the
    /// terminal write, the winner's snapshot is returned instead.
    pub async fn merge_results(&self, pool_id: &PoolId) -> Result<MergeOutcome, PoolError> {
        let pool = self.load_pool(pool_id).await?;
        if pool.is_terminal() {
            return Ok(settled(pool));
        }

        let Some((pool, decision)) = self.pools.finalize_pool(pool_id).await? else {
            return Ok(settled(self.load_pool(pool_id).await?));
        };

        info!(
            pool_id = %pool_id,
            status = %decision.status,
            strategy = %pool.merge_strategy,
            completed = decision.merged.completed,
            failed = decision.merged.failed,
            pending = decision.merged.pending,
            timed_out = pool.timed_out,
            "Worker pool merged"
        );

        self.schedule_cleanup(pool_id);
        if decision.status == PoolStatus::Failed {
            self.propagate_failure(&pool).await;
        }

        Ok(MergeOutcome {
            pool_id: pool_id.clone(),
            status: decision.status,
            success: decision.success,
            merged: decision.merged,
            already_merged: false,
        })
    }

    /// Force-fail a pool that ran out of time, then merge it.
    ///
    /// Returns `None` when the pool already settled. The merge strategy,
    /// not the timeout, decides the final status, so a `best_effort` pool
    /// with some finished work still ends `partial`.
    pub async fn handle_timeout(&self, pool_id: &PoolId) -> Result<Option<MergeOutcome>, PoolError> {
        let forced = match self.pools.expire_pool(pool_id, TIMEOUT_ERROR).await {
            Ok(Some(forced)) => forced,
            Ok(None) => return Ok(None),
            Err(e) if e.is_not_found() => return Err(PoolError::PoolNotFound(pool_id.clone())),
            Err(e) => return Err(e.into()),
        };

        warn!(pool_id = %pool_id, forced_workers = forced, "Worker pool timed out");
        self.merge_results(pool_id).await.map(Some)
    }
}

fn settled(pool: WorkerPool) -> MergeOutcome {
    MergeOutcome {
        success: matches!(pool.status, PoolStatus::Completed | PoolStatus::Partial),
        merged: pool.merged_result.unwrap_or_default(),
        pool_id: pool.id,
        status: pool.status,
        already_merged: true,
    }
}
