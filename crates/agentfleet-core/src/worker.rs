//! Workers, their dispatch records, and the subtask specs they are built from.

use crate::{CoreError, DispatchId, DispatchStatus, PoolId, WorkerId, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default dispatch priority (0 = urgent, 3 = low).
pub const DEFAULT_PRIORITY: u8 = 2;

/// Error recorded on workers the timeout guard force-fails.
pub const TIMEOUT_ERROR: &str = "Pool timed out";

/// One subtask in a split request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    /// Worker name, e.g. `worker-1`.
    pub name: String,

    /// Command the execution layer should run.
    pub command: String,

    #[serde(default)]
    pub description: String,

    /// Optional command payload. A JSON envelope is generated when absent.
    #[serde(default)]
    pub payload: Option<String>,

    /// 0 = urgent, 1 = high, 2 = normal, 3 = low.
    #[serde(default)]
    pub priority: Option<u8>,
}

impl SubtaskSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: String::new(),
            payload: None,
            priority: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Performance metrics reported alongside a worker result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub files_changed: Option<Vec<String>>,
    #[serde(default)]
    pub lines_changed: Option<u64>,
}

/// Terminal outcome of one worker, as reported by the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metrics: Option<WorkerMetrics>,
}

impl WorkerOutcome {
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            metrics: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: WorkerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// One independently dispatched unit of a split task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub pool_id: PoolId,
    pub name: String,
    pub command: String,
    pub description: String,
    pub payload: Option<String>,
    pub priority: u8,
    pub status: WorkerStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<WorkerMetrics>,
    pub dispatch_id: Option<DispatchId>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    /// Create a pending worker for `spec` in `pool_id`.
    pub fn from_spec(pool_id: PoolId, spec: &SubtaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: WorkerId::generate(),
            pool_id,
            name: spec.name.clone(),
            command: spec.command.clone(),
            description: spec.description.clone(),
            payload: spec.payload.clone(),
            priority: spec.priority.unwrap_or(DEFAULT_PRIORITY),
            status: WorkerStatus::Pending,
            result: None,
            error: None,
            metrics: None,
            dispatch_id: None,
            archived: false,
            created_at: now,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move `pending → running`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        match self.status {
            WorkerStatus::Pending => {
                self.status = WorkerStatus::Running;
                self.updated_at = Utc::now();
                Ok(())
            }
            WorkerStatus::Running => Ok(()),
            other => Err(CoreError::WorkerAlreadyFinished {
                worker: self.id.to_string(),
                status: other.to_string(),
            }),
        }
    }

    /// Apply a terminal outcome. A worker finishes exactly once.
    pub fn finish(&mut self, outcome: &WorkerOutcome) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::WorkerAlreadyFinished {
                worker: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        let now = Utc::now();
        self.status = if outcome.success {
            WorkerStatus::Completed
        } else {
            WorkerStatus::Failed
        };
        self.result = outcome.result.clone();
        self.error = outcome.error.clone();
        self.metrics = outcome.metrics.clone();
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// Hand-off record for the execution layer, one per worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: DispatchId,
    pub agent_name: String,
    pub worker_id: WorkerId,
    pub command: String,
    pub payload: String,
    pub priority: u8,
    pub urgent: bool,
    pub status: DispatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Dispatch {
    /// Build the dispatch for `worker`. Without an explicit payload, the
    /// payload is a JSON envelope naming the worker, pool, origin and description.
    pub fn for_worker(agent_name: impl Into<String>, worker: &Worker, origin: Option<&str>) -> Self {
        let payload = worker.payload.clone().unwrap_or_else(|| {
            serde_json::json!({
                "worker_id": worker.id,
                "pool_id": worker.pool_id,
                "task_id": origin,
                "description": worker.description,
            })
            .to_string()
        });
        Self {
            id: DispatchId::generate(),
            agent_name: agent_name.into(),
            worker_id: worker.id.clone(),
            command: worker.command.clone(),
            payload,
            priority: worker.priority,
            urgent: worker.priority == 0,
            status: DispatchStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// A known agent in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Case-insensitive name match.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_finishes_once() {
        let spec = SubtaskSpec::new("worker-1", "test");
        let mut worker = Worker::from_spec(PoolId::generate(), &spec);
        assert_eq!(worker.priority, DEFAULT_PRIORITY);

        worker.finish(&WorkerOutcome::success("42 passed")).unwrap();
        assert_eq!(worker.status, WorkerStatus::Completed);
        assert!(worker.completed_at.is_some());

        let err = worker.finish(&WorkerOutcome::failure("again")).unwrap_err();
        assert!(matches!(err, CoreError::WorkerAlreadyFinished { .. }));
        assert_eq!(worker.result.as_deref(), Some("42 passed"));
    }

    #[test]
    fn test_start_rejected_after_finish() {
        let mut worker = Worker::from_spec(PoolId::generate(), &SubtaskSpec::new("w", "lint"));
        worker.start().unwrap();
        worker.start().unwrap();
        assert_eq!(worker.status, WorkerStatus::Running);
        worker.finish(&WorkerOutcome::failure("boom")).unwrap();
        assert!(worker.start().is_err());
    }

    #[test]
    fn test_dispatch_envelope_payload() {
        let spec = SubtaskSpec::new("worker-1", "test")
            .with_description("Run unit tests")
            .with_priority(0);
        let worker = Worker::from_spec(PoolId::new("pool-1"), &spec);
        let dispatch = Dispatch::for_worker("sam", &worker, Some("AGT-249"));

        assert!(dispatch.urgent);
        let payload: serde_json::Value = serde_json::from_str(&dispatch.payload).unwrap();
        assert_eq!(payload["pool_id"], "pool-1");
        assert_eq!(payload["task_id"], "AGT-249");
        assert_eq!(payload["description"], "Run unit tests");
    }

    #[test]
    fn test_agent_match_is_case_insensitive() {
        assert!(AgentRecord::new("Sam").matches("sam"));
        assert!(!AgentRecord::new("Sam").matches("leo"));
    }
}
