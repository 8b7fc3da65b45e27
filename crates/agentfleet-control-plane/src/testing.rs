//! Test doubles for the external seams.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::notify::{Alert, DirectMessage, NotificationSink, NotifyError};
use crate::scheduler::{Callback, CallbackScheduler};

/// Sink that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingSink {
    messages: AsyncMutex<Vec<DirectMessage>>,
    alerts: AsyncMutex<Vec<Alert>>,
    fail: bool,
}

impl RecordingSink {
    /// A sink whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn messages(&self) -> Vec<DirectMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
        self.alerts.lock().await.clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_direct_message(&self, message: DirectMessage) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Unreachable(message.to));
        }
        self.messages.lock().await.push(message);
        Ok(())
    }

    async fn broadcast_alert(&self, alert: Alert) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Channel("alerts offline".to_string()));
        }
        self.alerts.lock().await.push(alert);
        Ok(())
    }
}

/// Scheduler that only records; tests fire callbacks by hand.
#[derive(Default)]
pub struct ManualScheduler {
    scheduled: Mutex<Vec<(Duration, Callback)>>,
}

impl ManualScheduler {
    /// Drain everything scheduled so far.
    pub fn take(&self) -> Vec<(Duration, Callback)> {
        std::mem::take(&mut *self.scheduled.lock().unwrap())
    }
}

impl CallbackScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) {
        self.scheduled.lock().unwrap().push((delay, callback));
    }
}
