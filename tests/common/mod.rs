#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use machine_inventory::{FailureReason, NotificationSender, Notification};

/// Status codes returned by failing attempts, in order, repeating.
pub const FAILURE_STATUSES: [u16; 3] = [500, 502, 503];

/// Sender that records every attempt and fails the first `fail_first` of them.
/// Failed attempt `n` answers with `FAILURE_STATUSES[(n - 1) % 3]`.
pub struct RecordingSender {
    calls: Mutex<Vec<Notification>>,
    fail_first: u32,
    latency: Option<Duration>,
}

impl RecordingSender {
    pub fn succeeding() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn failing_first(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_first,
            latency: None,
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_first(u32::MAX)
    }

    /// Sender whose every attempt takes `latency` before succeeding.
    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_first: 0,
            latency: Some(latency),
        })
    }

    pub fn calls(&self) -> Vec<Notification> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> Result<(), FailureReason> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(notification.clone());
            calls.len() as u32
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if attempt <= self.fail_first {
            let status = FAILURE_STATUSES[(attempt as usize - 1) % FAILURE_STATUSES.len()];
            Err(FailureReason::Status(status))
        } else {
            Ok(())
        }
    }
}
