//! Tier actions.

use std::sync::Arc;

use tracing::{debug, warn};

use agentfleet_core::{BlockerResolution, EscalationTier, Task};

use crate::notify::{Alert, AlertKind, DirectMessage, NotificationSink, NotifyError, Priority};

/// Sends the notifications for each escalation tier.
///
/// Delivery failures are logged and dropped: a lost message must never roll
/// back the tier that was already recorded.
#[derive(Clone)]
pub struct Escalator {
    sink: Arc<dyn NotificationSink>,
    sender: String,
    senior_responder: String,
}

impl Escalator {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        sender: impl Into<String>,
        senior_responder: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            sender: sender.into(),
            senior_responder: senior_responder.into().to_lowercase(),
        }
    }

    /// Fire the action for `tier`. `unresolved` holds the blockers that are
    /// still open.
    pub async fn escalate(&self, task: &Task, tier: EscalationTier, unresolved: &[BlockerResolution]) {
        let label = task.label();
        let blocker_list = blocker_list(unresolved);

        debug!(task_id = %task.id, tier = %tier, blockers = %blocker_list, "Firing escalation");

        match tier {
            EscalationTier::Tier1 => {
                if let Some(agent) = &task.agent_name {
                    self.direct(DirectMessage {
                        from: self.sender.clone(),
                        to: agent.to_lowercase(),
                        content: format!("[Blocker T1] Your task {label} is blocked by: {blocker_list}"),
                        priority: Priority::Normal,
                        related_task: Some(task.id.clone()),
                    })
                    .await;
                }
                self.task_blocked(task, blocker_list).await;
            }
            EscalationTier::Tier2 => {
                for blocker in unresolved {
                    let Some(assignee) = &blocker.assignee else {
                        continue;
                    };
                    self.direct(DirectMessage {
                        from: self.sender.clone(),
                        to: assignee.to_lowercase(),
                        content: format!(
                            "[Blocker T2] Your task {} is blocking {label}. Blocked for 30+ min.",
                            blocker.identifier
                        ),
                        priority: Priority::Urgent,
                        related_task: blocker.task_id.clone(),
                    })
                    .await;
                }
            }
            EscalationTier::Tier3 => {
                self.direct(DirectMessage {
                    from: self.sender.clone(),
                    to: self.senior_responder.clone(),
                    content: format!(
                        "[Blocker T3] Task {label} blocked 60+ min by: {blocker_list}. Agent: {}. Needs intervention.",
                        task.agent_name.as_deref().unwrap_or("unassigned")
                    ),
                    priority: Priority::Urgent,
                    related_task: Some(task.id.clone()),
                })
                .await;
            }
            EscalationTier::Tier4 => {
                self.alert(Alert {
                    kind: AlertKind::Escalation,
                    priority: Priority::Urgent,
                    recipient: self.senior_responder.clone(),
                    task_id: task.id.clone(),
                    task_label: label.to_string(),
                    message: format!(
                        "[Blocker T4 ESCALATION] Task {label} blocked 4+ hours by: {blocker_list}. Human attention required."
                    ),
                    blocked_by: unresolved.iter().map(|b| b.identifier.clone()).collect(),
                    agent_name: task.agent_name.clone(),
                })
                .await;
            }
        }
    }

    /// Raise the `task_blocked` alert for `task`.
    pub async fn task_blocked(&self, task: &Task, blocked_by: String) {
        let recipient = task
            .agent_name
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.senior_responder.clone());
        self.alert(Alert {
            kind: AlertKind::TaskBlocked,
            priority: Priority::Normal,
            recipient,
            task_id: task.id.clone(),
            task_label: task.label().to_string(),
            message: format!("Task {} is blocked by: {blocked_by}", task.label()),
            blocked_by: vec![blocked_by],
            agent_name: task.agent_name.clone(),
        })
        .await;
    }

    async fn direct(&self, message: DirectMessage) {
        let to = message.to.clone();
        if let Err(e) = self.sink.send_direct_message(message).await {
            log_failure("direct_message", &to, &e);
        }
    }

    async fn alert(&self, alert: Alert) {
        let recipient = alert.recipient.clone();
        if let Err(e) = self.sink.broadcast_alert(alert).await {
            log_failure("alert", &recipient, &e);
        }
    }
}

fn blocker_list(unresolved: &[BlockerResolution]) -> String {
    unresolved
        .iter()
        .map(|b| b.identifier.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_failure(channel: &str, recipient: &str, error: &NotifyError) {
    warn!(channel, recipient, error = %error, "Notification delivery failed");
}
