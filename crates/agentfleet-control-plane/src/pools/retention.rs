//! Archival and retention.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use agentfleet_core::PoolId;

use super::{CleanupOutcome, PoolError, PoolManager, PruneCandidate, PruneReport};

impl PoolManager {
    /// Archive a settled pool and its workers. Running pools are left alone
    /// unless `force` is set.
    pub async fn cleanup_pool(&self, pool_id: &PoolId, force: bool) -> Result<CleanupOutcome, PoolError> {
        let Some(pool) = self.pools.get_pool(pool_id).await? else {
            debug!(pool_id = %pool_id, "Cleanup skipped, pool already deleted");
            return Ok(CleanupOutcome::Gone);
        };

        if !force && !pool.is_terminal() {
            debug!(pool_id = %pool_id, status = %pool.status, "Cleanup skipped, pool not settled");
            return Ok(CleanupOutcome::NotReady);
        }

        let workers_archived = self.pools.archive_pool(pool_id).await?;
        info!(
            pool_id = %pool_id,
            workers_archived,
            forced = force,
            "Worker pool archived"
        );
        Ok(CleanupOutcome::Archived { workers_archived })
    }

    /// Hard-delete archived pools whose completion (or creation, if they
    /// never completed) is older than `older_than`.
    pub async fn prune_archived_pools(
        &self,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<PruneReport, PoolError> {
        self.prune_archived_pools_at(Utc::now(), older_than, dry_run).await
    }

    pub async fn prune_archived_pools_at(
        &self,
        now: DateTime<Utc>,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<PruneReport, PoolError> {
        let cutoff = now - older_than;
        let candidates: Vec<PruneCandidate> = self
            .pools
            .list_pools()
            .await?
            .into_iter()
            .filter(|p| p.archived && p.retention_anchor() < cutoff)
            .map(|p| PruneCandidate {
                age_days: (now - p.retention_anchor()).num_days(),
                pool_id: p.id,
                origin_identifier: p.origin_identifier,
                completed_at: p.completed_at,
            })
            .collect();

        if dry_run {
            info!(candidates = candidates.len(), "Prune dry run");
            return Ok(PruneReport {
                dry_run: true,
                candidates,
                pools_deleted: 0,
                workers_deleted: 0,
            });
        }

        let mut workers_deleted = 0;
        for candidate in &candidates {
            workers_deleted += self.pools.delete_pool(&candidate.pool_id).await?;
        }

        info!(
            pools_deleted = candidates.len(),
            workers_deleted,
            older_than_days = older_than.num_days(),
            "Archived worker pools pruned"
        );
        Ok(PruneReport {
            dry_run: false,
            pools_deleted: candidates.len(),
            candidates,
            workers_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::manager::tests::{fixture, split};
    use crate::scheduler::{dispatch_callback, Callback};
    use crate::store::PoolStore;
    use agentfleet_core::{MergeStrategy, WorkerOutcome};

    #[tokio::test]
    async fn test_cleanup_waits_for_terminal_pool() {
        let f = fixture().await;
        let outcome = f.manager.split_task(split(MergeStrategy::AllSuccess, 2)).await.unwrap();

        let early = f.manager.cleanup_pool(&outcome.pool_id, false).await.unwrap();
        assert_eq!(early, CleanupOutcome::NotReady);

        for id in &outcome.worker_ids {
            f.manager.report_worker_complete(id, WorkerOutcome::success("ok")).await.unwrap();
        }
        for (_, callback) in f.scheduler.take() {
            dispatch_callback(&f.manager, callback).await;
        }
        let cleanup = f.scheduler.take();
        assert_eq!(cleanup[0].1, Callback::CleanupPool(outcome.pool_id.clone()));
        dispatch_callback(&f.manager, cleanup[0].1.clone()).await;

        let detail = f.manager.get_pool(&outcome.pool_id).await.unwrap();
        assert!(detail.pool.archived);
        assert!(detail.workers.iter().all(|w| w.archived));
    }

    #[tokio::test]
    async fn test_forced_cleanup_of_running_pool() {
        let f = fixture().await;
        let outcome = f.manager.split_task(split(MergeStrategy::AllSuccess, 3)).await.unwrap();

        let forced = f.manager.cleanup_pool(&outcome.pool_id, true).await.unwrap();
        assert_eq!(forced, CleanupOutcome::Archived { workers_archived: 3 });

        let missing = f.manager.cleanup_pool(&PoolId::new("gone"), false).await.unwrap();
        assert_eq!(missing, CleanupOutcome::Gone);
    }

    #[tokio::test]
    async fn test_prune_dry_run_then_delete() {
        let f = fixture().await;
        let old = f.manager.split_task(split(MergeStrategy::AllSuccess, 2)).await.unwrap();
        let live = f.manager.split_task(split(MergeStrategy::AllSuccess, 1)).await.unwrap();
        f.manager.cleanup_pool(&old.pool_id, true).await.unwrap();

        let later = Utc::now() + Duration::days(10);

        let dry = f
            .manager
            .prune_archived_pools_at(later, Duration::days(7), true)
            .await
            .unwrap();
        assert!(dry.dry_run);
        assert_eq!(dry.candidates.len(), 1);
        assert_eq!(dry.candidates[0].pool_id, old.pool_id);
        assert!(dry.candidates[0].age_days >= 9);
        assert!(f.store.get_pool(&old.pool_id).await.unwrap().is_some());

        let too_young = f
            .manager
            .prune_archived_pools_at(later, Duration::days(30), false)
            .await
            .unwrap();
        assert_eq!(too_young.pools_deleted, 0);

        let report = f
            .manager
            .prune_archived_pools_at(later, Duration::days(7), false)
            .await
            .unwrap();
        assert_eq!(report.pools_deleted, 1);
        assert_eq!(report.workers_deleted, 2);
        assert!(f.store.get_pool(&old.pool_id).await.unwrap().is_none());
        assert!(f.store.get_pool(&live.pool_id).await.unwrap().is_some());
        assert!(f.store.get_worker(&old.worker_ids[0]).await.unwrap().is_none());
    }
}
