//! Periodic blocker scan and dependent propagation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use agentfleet_core::{BlockerResolution, EscalationTier, Task, TaskId, TaskStatus};

use super::{BlockerError, BlockerResolver, Escalator};
use crate::store::{StoreResult, TaskStore};

/// Counts from one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub newly_blocked: usize,
    pub escalated: usize,
    pub resolved: usize,
    pub failed: usize,
}

impl ScanReport {
    fn changed(&self) -> bool {
        self.newly_blocked > 0 || self.escalated > 0 || self.resolved > 0 || self.failed > 0
    }
}

/// A task currently in a blocked episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedTaskView {
    pub task_id: TaskId,
    pub identifier: Option<String>,
    pub title: String,
    pub agent_name: Option<String>,
    pub blocked_by: Vec<String>,
    pub blocked_since: DateTime<Utc>,
    pub escalation_tier: EscalationTier,
    pub blocked_minutes: i64,
}

/// What the evaluation phase decided for one task.
enum PlannedAction {
    MarkBlocked {
        task: Task,
        unresolved: Vec<BlockerResolution>,
    },
    Escalate {
        task: Task,
        tier: EscalationTier,
        unresolved: Vec<BlockerResolution>,
    },
    Clear {
        task: Task,
    },
}

impl PlannedAction {
    fn task_id(&self) -> &TaskId {
        match self {
            Self::MarkBlocked { task, .. } | Self::Escalate { task, .. } | Self::Clear { task } => {
                &task.id
            }
        }
    }
}

/// Keeps stored blocked-state in line with the dependency graph.
pub struct BlockerMonitor {
    store: Arc<dyn TaskStore>,
    resolver: BlockerResolver,
    escalator: Escalator,
}

impl BlockerMonitor {
    pub fn new(store: Arc<dyn TaskStore>, escalator: Escalator) -> Self {
        Self {
            resolver: BlockerResolver::new(store.clone()),
            store,
            escalator,
        }
    }

    pub fn resolver(&self) -> &BlockerResolver {
        &self.resolver
    }

    /// Run one scan pass at the current time.
    pub async fn scan(&self) -> StoreResult<ScanReport> {
        self.scan_at(Utc::now()).await
    }

    /// Run one scan pass as of `now`.
    ///
    /// Every task is evaluated before anything is written, so one pass sees
    /// a single snapshot of the graph. A failure on one task is counted and
    /// does not stop the others.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> StoreResult<ScanReport> {
        let tasks = self.resolver.tasks_with_blockers().await?;
        let mut report = ScanReport {
            scanned: tasks.len(),
            ..ScanReport::default()
        };

        let mut plan = Vec::new();
        for task in tasks {
            let task_id = task.id.clone();
            match self.evaluate(task, now).await {
                Ok(Some(action)) => plan.push(action),
                Ok(None) => {}
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Failed to evaluate blockers");
                    report.failed += 1;
                }
            }
        }

        for action in plan {
            let task_id = action.task_id().clone();
            if let Err(e) = self.apply(action, now, &mut report).await {
                warn!(task_id = %task_id, error = %e, "Failed to update blocked state");
                report.failed += 1;
            }
        }

        if report.changed() {
            info!(
                scanned = report.scanned,
                newly_blocked = report.newly_blocked,
                escalated = report.escalated,
                resolved = report.resolved,
                failed = report.failed,
                "Blocker scan finished"
            );
        } else {
            debug!(scanned = report.scanned, "Blocker scan finished, nothing changed");
        }
        Ok(report)
    }

    async fn evaluate(
        &self,
        task: Task,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PlannedAction>> {
        let resolutions = self.resolver.resolve_all(&task).await?;
        let unresolved: Vec<BlockerResolution> =
            resolutions.into_iter().filter(|b| !b.resolved).collect();

        if unresolved.is_empty() {
            return Ok(task.is_marked_blocked().then_some(PlannedAction::Clear { task }));
        }

        let Some(since) = task.blocked_since else {
            return Ok(Some(PlannedAction::MarkBlocked { task, unresolved }));
        };

        let current = task.escalation_tier.unwrap_or(EscalationTier::Tier1);
        let tier = EscalationTier::at(since, now);
        if tier > current {
            Ok(Some(PlannedAction::Escalate {
                task,
                tier,
                unresolved,
            }))
        } else {
            Ok(None)
        }
    }

    async fn apply(
        &self,
        action: PlannedAction,
        now: DateTime<Utc>,
        report: &mut ScanReport,
    ) -> StoreResult<()> {
        match action {
            PlannedAction::MarkBlocked { task, unresolved } => {
                if self.store.mark_task_blocked(&task.id, now).await? {
                    info!(task_id = %task.id, task = %task.label(), blockers = unresolved.len(), "Task blocked");
                    self.escalator
                        .escalate(&task, EscalationTier::Tier1, &unresolved)
                        .await;
                    report.newly_blocked += 1;
                }
            }
            PlannedAction::Escalate {
                task,
                tier,
                unresolved,
            } => {
                if self.store.raise_escalation_tier(&task.id, tier).await? {
                    info!(task_id = %task.id, task = %task.label(), tier = %tier, "Blocked task escalated");
                    self.escalator.escalate(&task, tier, &unresolved).await;
                    report.escalated += 1;
                }
            }
            PlannedAction::Clear { task } => {
                if self.store.clear_task_blocked(&task.id).await? {
                    info!(task_id = %task.id, task = %task.label(), "Task unblocked");
                    report.resolved += 1;
                }
            }
        }
        Ok(())
    }

    /// Mark in-progress dependents of a failed task as blocked and alert
    /// their owners. Dependents already in a blocked episode are left alone.
    /// Returns how many dependents were newly blocked.
    pub async fn propagate_failure(&self, failed_task: &TaskId) -> Result<usize, BlockerError> {
        let failed = self
            .store
            .get_task(failed_task)
            .await?
            .ok_or_else(|| BlockerError::TaskNotFound(failed_task.clone()))?;

        let now = Utc::now();
        let mut blocked = 0;
        for dependent in self.store.list_tasks_by_status(TaskStatus::InProgress).await? {
            let depends = dependent.blocked_by.iter().any(|r| failed.is_referenced_by(r));
            if !depends || dependent.is_marked_blocked() {
                continue;
            }
            if self.store.mark_task_blocked(&dependent.id, now).await? {
                self.escalator
                    .task_blocked(&dependent, failed.display_identifier().to_string())
                    .await;
                blocked += 1;
            }
        }

        if blocked > 0 {
            info!(failed_task = %failed.id, dependents = blocked, "Failure propagated to dependents");
        }
        Ok(blocked)
    }

    /// In-progress tasks currently in a blocked episode, longest blocked
    /// first. A task that left `in_progress` mid-episode is not listed.
    pub async fn blocked_tasks(&self) -> StoreResult<Vec<BlockedTaskView>> {
        let now = Utc::now();
        let mut views: Vec<BlockedTaskView> = self
            .store
            .list_tasks_by_status(TaskStatus::InProgress)
            .await?
            .into_iter()
            .filter_map(|task| {
                let since = task.blocked_since?;
                Some(BlockedTaskView {
                    escalation_tier: task.escalation_tier.unwrap_or(EscalationTier::Tier1),
                    blocked_minutes: (now - since).num_minutes().max(0),
                    blocked_since: since,
                    task_id: task.id,
                    identifier: task.identifier,
                    title: task.title,
                    agent_name: task.agent_name,
                    blocked_by: task.blocked_by,
                })
            })
            .collect();
        views.sort_by(|a, b| a.blocked_since.cmp(&b.blocked_since));
        Ok(views)
    }
}

/// Scan forever on a fixed period. A pass that overruns `budget` is
/// abandoned; missed ticks are skipped rather than bunched up.
pub async fn run_scan_loop(monitor: Arc<BlockerMonitor>, period: Duration, budget: Duration) {
    info!(
        period_secs = period.as_secs(),
        budget_secs = budget.as_secs(),
        "Starting blocker scan loop"
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match tokio::time::timeout(budget, monitor.scan()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Blocker scan failed"),
            Err(_) => warn!(budget_secs = budget.as_secs(), "Blocker scan exceeded its budget"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertKind;
    use crate::store::{MemoryStore, StoreError};
    use crate::testing::RecordingSink;
    use agentfleet_core::AgentRecord;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    /// Task store whose writes to one task always fail.
    struct BrokenTask {
        inner: Arc<MemoryStore>,
        broken: TaskId,
    }

    impl BrokenTask {
        fn check(&self, id: &TaskId) -> StoreResult<()> {
            if id == &self.broken {
                return Err(StoreError::Backend(format!("write to {id} failed")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskStore for BrokenTask {
        async fn insert_task(&self, task: Task) -> StoreResult<()> {
            self.inner.insert_task(task).await
        }

        async fn get_task(&self, id: &TaskId) -> StoreResult<Option<Task>> {
            self.inner.get_task(id).await
        }

        async fn find_task_by_identifier(&self, identifier: &str) -> StoreResult<Option<Task>> {
            self.inner.find_task_by_identifier(identifier).await
        }

        async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
            self.inner.list_tasks().await
        }

        async fn list_tasks_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>> {
            self.inner.list_tasks_by_status(status).await
        }

        async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<Task> {
            self.inner.set_task_status(id, status).await
        }

        async fn mark_task_blocked(&self, id: &TaskId, since: DateTime<Utc>) -> StoreResult<bool> {
            self.check(id)?;
            self.inner.mark_task_blocked(id, since).await
        }

        async fn raise_escalation_tier(&self, id: &TaskId, tier: EscalationTier) -> StoreResult<bool> {
            self.check(id)?;
            self.inner.raise_escalation_tier(id, tier).await
        }

        async fn clear_task_blocked(&self, id: &TaskId) -> StoreResult<bool> {
            self.check(id)?;
            self.inner.clear_task_blocked(id).await
        }

        async fn insert_agent(&self, agent: AgentRecord) -> StoreResult<()> {
            self.inner.insert_agent(agent).await
        }

        async fn find_agent(&self, name: &str) -> StoreResult<Option<AgentRecord>> {
            self.inner.find_agent(name).await
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        monitor: BlockerMonitor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let escalator = Escalator::new(sink.clone(), "system", "max");
        let monitor = BlockerMonitor::new(store.clone(), escalator);
        Fixture {
            store,
            sink,
            monitor,
        }
    }

    async fn insert(store: &MemoryStore, task: Task) -> TaskId {
        let id = task.id.clone();
        store.insert_task(task).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_blocked_then_cleared_when_blocker_done() {
        let f = fixture();
        let b = insert(&f.store, Task::new("B").with_identifier("AGT-2").with_status(TaskStatus::InProgress)).await;
        let a = insert(
            &f.store,
            Task::new("A")
                .with_identifier("AGT-1")
                .with_status(TaskStatus::InProgress)
                .with_agent("sam")
                .blocked_by("AGT-2"),
        )
        .await;

        let report = f.monitor.scan().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.newly_blocked, 1);

        let stored = f.store.get_task(&a).await.unwrap().unwrap();
        assert!(stored.blocked_since.is_some());
        assert_eq!(stored.escalation_tier, Some(EscalationTier::Tier1));
        assert_eq!(f.sink.messages().await.len(), 1);
        assert_eq!(f.sink.alerts().await[0].kind, AlertKind::TaskBlocked);

        f.store.set_task_status(&b, TaskStatus::Done).await.unwrap();
        let report = f.monitor.scan().await.unwrap();
        assert_eq!(report.resolved, 1);

        let stored = f.store.get_task(&a).await.unwrap().unwrap();
        assert!(stored.blocked_since.is_none());
        assert!(stored.escalation_tier.is_none());

        // A clean task produces no further writes
        let report = f.monitor.scan().await.unwrap();
        assert_eq!(report, ScanReport { scanned: 1, ..ScanReport::default() });
    }

    #[tokio::test]
    async fn test_each_tier_fires_once() {
        let f = fixture();
        insert(&f.store, Task::new("B").with_identifier("AGT-2").with_agent("leo")).await;
        let a = insert(
            &f.store,
            Task::new("A")
                .with_status(TaskStatus::InProgress)
                .with_agent("sam")
                .blocked_by("AGT-2"),
        )
        .await;

        let start = Utc::now();
        f.monitor.scan_at(start).await.unwrap();
        f.sink.clear().await;

        // Repeated scans inside the tier 1 window do nothing
        let report = f.monitor.scan_at(start + ChronoDuration::minutes(10)).await.unwrap();
        assert_eq!(report.escalated, 0);

        let report = f.monitor.scan_at(start + ChronoDuration::minutes(31)).await.unwrap();
        assert_eq!(report.escalated, 1);
        let messages = f.sink.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "leo");

        let report = f.monitor.scan_at(start + ChronoDuration::minutes(45)).await.unwrap();
        assert_eq!(report.escalated, 0);

        f.monitor.scan_at(start + ChronoDuration::minutes(61)).await.unwrap();
        let stored = f.store.get_task(&a).await.unwrap().unwrap();
        assert_eq!(stored.escalation_tier, Some(EscalationTier::Tier3));
        assert_eq!(f.sink.messages().await.last().unwrap().to, "max");
    }

    #[tokio::test]
    async fn test_skipped_tier_fires_only_new_tier() {
        let f = fixture();
        insert(&f.store, Task::new("B").with_identifier("AGT-2").with_agent("leo")).await;
        let a = insert(
            &f.store,
            Task::new("A").with_status(TaskStatus::InProgress).blocked_by("AGT-2"),
        )
        .await;

        let start = Utc::now();
        f.monitor.scan_at(start).await.unwrap();
        f.sink.clear().await;

        let report = f.monitor.scan_at(start + ChronoDuration::hours(5)).await.unwrap();
        assert_eq!(report.escalated, 1);
        assert!(f.sink.messages().await.is_empty());
        let alerts = f.sink.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Escalation);

        let stored = f.store.get_task(&a).await.unwrap().unwrap();
        assert_eq!(stored.escalation_tier, Some(EscalationTier::Tier4));
    }

    #[tokio::test]
    async fn test_reblock_restarts_at_tier1() {
        let f = fixture();
        let b = insert(&f.store, Task::new("B").with_identifier("AGT-2")).await;
        let a = insert(
            &f.store,
            Task::new("A").with_status(TaskStatus::InProgress).blocked_by("AGT-2"),
        )
        .await;

        let start = Utc::now();
        f.monitor.scan_at(start).await.unwrap();
        f.monitor.scan_at(start + ChronoDuration::minutes(90)).await.unwrap();
        assert_eq!(
            f.store.get_task(&a).await.unwrap().unwrap().escalation_tier,
            Some(EscalationTier::Tier3)
        );

        f.store.set_task_status(&b, TaskStatus::Done).await.unwrap();
        f.monitor.scan_at(start + ChronoDuration::minutes(95)).await.unwrap();
        f.store.set_task_status(&b, TaskStatus::InProgress).await.unwrap();

        let later = start + ChronoDuration::minutes(100);
        let report = f.monitor.scan_at(later).await.unwrap();
        assert_eq!(report.newly_blocked, 1);

        let stored = f.store.get_task(&a).await.unwrap().unwrap();
        assert_eq!(stored.blocked_since, Some(later));
        assert_eq!(stored.escalation_tier, Some(EscalationTier::Tier1));
    }

    #[tokio::test]
    async fn test_only_in_progress_tasks_are_scanned() {
        let f = fixture();
        insert(&f.store, Task::new("A").with_status(TaskStatus::Todo).blocked_by("AGT-404")).await;
        insert(&f.store, Task::new("C").with_status(TaskStatus::InProgress)).await;

        let report = f.monitor.scan().await.unwrap();
        assert_eq!(report.scanned, 0);
    }

    #[tokio::test]
    async fn test_propagate_failure_blocks_dependents_once() {
        let f = fixture();
        let failed = insert(
            &f.store,
            Task::new("schema").with_identifier("AGT-5").with_status(TaskStatus::InProgress),
        )
        .await;
        let by_identifier = insert(
            &f.store,
            Task::new("api").with_status(TaskStatus::InProgress).with_agent("sam").blocked_by("AGT-5"),
        )
        .await;
        insert(
            &f.store,
            Task::new("ui").with_status(TaskStatus::InProgress).blocked_by(failed.as_str()),
        )
        .await;
        insert(&f.store, Task::new("docs").with_status(TaskStatus::Todo).blocked_by("AGT-5")).await;

        assert_eq!(f.monitor.propagate_failure(&failed).await.unwrap(), 2);
        assert_eq!(f.sink.alerts().await.len(), 2);
        assert!(f.store.get_task(&by_identifier).await.unwrap().unwrap().is_marked_blocked());

        assert_eq!(f.monitor.propagate_failure(&failed).await.unwrap(), 0);

        let views = f.monitor.blocked_tasks().await.unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.escalation_tier == EscalationTier::Tier1));
    }

    #[tokio::test]
    async fn test_one_failing_task_does_not_stop_the_pass() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let broken = insert(
            &store,
            Task::new("A").with_status(TaskStatus::InProgress).blocked_by("AGT-404"),
        )
        .await;
        let b = insert(&store, Task::new("B").with_status(TaskStatus::InProgress).blocked_by("AGT-404")).await;
        let c = insert(&store, Task::new("C").with_status(TaskStatus::InProgress).blocked_by("AGT-404")).await;

        let monitor = BlockerMonitor::new(
            Arc::new(BrokenTask {
                inner: store.clone(),
                broken: broken.clone(),
            }),
            Escalator::new(sink.clone(), "system", "max"),
        );

        let report = monitor.scan().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.newly_blocked, 2);

        assert!(!store.get_task(&broken).await.unwrap().unwrap().is_marked_blocked());
        assert!(store.get_task(&b).await.unwrap().unwrap().is_marked_blocked());
        assert!(store.get_task(&c).await.unwrap().unwrap().is_marked_blocked());
        assert_eq!(sink.alerts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_undeliverable_notifications_still_record_tier() {
        let store = Arc::new(MemoryStore::new());
        let monitor = BlockerMonitor::new(
            store.clone(),
            Escalator::new(Arc::new(RecordingSink::failing()), "system", "max"),
        );
        insert(&store, Task::new("B").with_identifier("AGT-2").with_agent("leo")).await;
        let a = insert(
            &store,
            Task::new("A")
                .with_status(TaskStatus::InProgress)
                .with_agent("sam")
                .blocked_by("AGT-2"),
        )
        .await;

        let start = Utc::now();
        let report = monitor.scan_at(start).await.unwrap();
        assert_eq!((report.newly_blocked, report.failed), (1, 0));
        assert_eq!(
            store.get_task(&a).await.unwrap().unwrap().escalation_tier,
            Some(EscalationTier::Tier1)
        );

        let report = monitor.scan_at(start + ChronoDuration::minutes(31)).await.unwrap();
        assert_eq!((report.escalated, report.failed), (1, 0));
        assert_eq!(
            store.get_task(&a).await.unwrap().unwrap().escalation_tier,
            Some(EscalationTier::Tier2)
        );

        // The tier is not re-sent on the next pass
        let report = monitor.scan_at(start + ChronoDuration::minutes(32)).await.unwrap();
        assert_eq!(report.escalated, 0);
    }

    #[tokio::test]
    async fn test_blocked_view_skips_tasks_that_left_in_progress() {
        let f = fixture();
        let a = insert(
            &f.store,
            Task::new("A").with_status(TaskStatus::InProgress).blocked_by("AGT-404"),
        )
        .await;
        f.monitor.scan().await.unwrap();
        assert_eq!(f.monitor.blocked_tasks().await.unwrap().len(), 1);

        f.store.set_task_status(&a, TaskStatus::Review).await.unwrap();
        assert!(f.monitor.blocked_tasks().await.unwrap().is_empty());
    }
}
