//! Outbound notifications.
//!
//! The message channel itself is external. Engines talk to it through
//! [`NotificationSink`]; delivery failures are reported back as
//! [`NotifyError`] and the callers log and move on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use agentfleet_core::TaskId;

/// Notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Recipient not reachable: {0}")]
    Unreachable(String),

    #[error("Notification channel error: {0}")]
    Channel(String),
}

/// Message priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

/// A direct message to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub from: String,
    pub to: String,
    pub content: String,
    pub priority: Priority,
    pub related_task: Option<TaskId>,
}

/// Broadcast alert channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TaskBlocked,
    Escalation,
}

/// A broadcast alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub priority: Priority,
    /// Who is expected to act on it.
    pub recipient: String,
    pub task_id: TaskId,
    pub task_label: String,
    pub message: String,
    pub blocked_by: Vec<String>,
    pub agent_name: Option<String>,
}

/// Delivers messages and alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_direct_message(&self, message: DirectMessage) -> Result<(), NotifyError>;

    async fn broadcast_alert(&self, alert: Alert) -> Result<(), NotifyError>;
}

/// Sink that writes every notification to the log.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn send_direct_message(&self, message: DirectMessage) -> Result<(), NotifyError> {
        match message.priority {
            Priority::Urgent => warn!(
                from = %message.from,
                to = %message.to,
                task_id = ?message.related_task.as_ref().map(|id| id.as_str()),
                "{}",
                message.content
            ),
            Priority::Normal => info!(
                from = %message.from,
                to = %message.to,
                task_id = ?message.related_task.as_ref().map(|id| id.as_str()),
                "{}",
                message.content
            ),
        }
        Ok(())
    }

    async fn broadcast_alert(&self, alert: Alert) -> Result<(), NotifyError> {
        warn!(
            kind = ?alert.kind,
            recipient = %alert.recipient,
            task_id = %alert.task_id,
            task = %alert.task_label,
            blocked_by = ?alert.blocked_by,
            "{}",
            alert.message
        );
        Ok(())
    }
}
