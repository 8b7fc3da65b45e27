//! Task records and their blocked-state bookkeeping.

use crate::{EscalationTier, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Task is a unit of work on the board, owned by the task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque store handle.
    pub id: TaskId,

    /// Human-readable identifier mirrored from the issue tracker (e.g. `AGT-72`).
    pub identifier: Option<String>,

    /// Short title.
    pub title: String,

    /// Free-form description.
    pub description: String,

    /// Current board status.
    pub status: TaskStatus,

    /// Ordered blocker references. Each entry is either an identifier
    /// or a raw task handle.
    pub blocked_by: Vec<String>,

    /// When the task entered its current blocked episode.
    pub blocked_since: Option<DateTime<Utc>>,

    /// Highest escalation tier fired during the current blocked episode.
    pub escalation_tier: Option<EscalationTier>,

    /// Agent the task is assigned to.
    pub agent_name: Option<String>,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new Task in the backlog.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            identifier: None,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Backlog,
            blocked_by: Vec::new(),
            blocked_since: None,
            escalation_tier: None,
            agent_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the human-readable identifier.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to assign the task to an agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent_name = Some(agent.into());
        self
    }

    /// Builder method to add a blocker reference.
    pub fn blocked_by(mut self, blocker: impl Into<String>) -> Self {
        self.blocked_by.push(blocker.into());
        self
    }

    /// Identifier if present, otherwise the raw handle.
    pub fn display_identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or(self.id.as_str())
    }

    /// Label used in notifications: identifier if present, otherwise the title.
    pub fn label(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.title)
    }

    /// Whether the task lists any blocker references.
    pub fn has_blockers(&self) -> bool {
        !self.blocked_by.is_empty()
    }

    /// Whether the task is in a blocked episode.
    pub fn is_marked_blocked(&self) -> bool {
        self.blocked_since.is_some()
    }

    /// Whether a blocker reference points at this task, by exact handle or
    /// by identifier in any case.
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        reference == self.id.as_str()
            || self
                .identifier
                .as_deref()
                .is_some_and(|identifier| identifier.eq_ignore_ascii_case(reference))
    }

    /// Start a blocked episode at tier 1. Returns false if already blocked.
    pub fn mark_blocked(&mut self, since: DateTime<Utc>) -> bool {
        if self.blocked_since.is_some() {
            return false;
        }
        self.blocked_since = Some(since);
        self.escalation_tier = Some(EscalationTier::Tier1);
        self.updated_at = Utc::now();
        true
    }

    /// Raise the escalation tier. Only a strict increase during a blocked
    /// episode is applied.
    pub fn raise_tier(&mut self, tier: EscalationTier) -> bool {
        if self.blocked_since.is_none() {
            return false;
        }
        match self.escalation_tier {
            Some(current) if current >= tier => false,
            _ => {
                self.escalation_tier = Some(tier);
                self.updated_at = Utc::now();
                true
            }
        }
    }

    /// End the blocked episode. Returns false if the task was not blocked.
    pub fn clear_blocked(&mut self) -> bool {
        if self.blocked_since.is_none() && self.escalation_tier.is_none() {
            return false;
        }
        self.blocked_since = None;
        self.escalation_tier = None;
        self.updated_at = Utc::now();
        true
    }
}
