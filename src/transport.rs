//! Delivery of a single notification to the remote notify endpoint.
//!
//! A delivery is a bounded attempt sequence: one request per attempt,
//! a fixed backoff between attempts, and a cancellation token (plus an
//! optional deadline) that is honoured before every attempt, during every
//! request and during every wait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::counters::{metric_inc, metric_inc_owner};
use crate::error::{DeliveryOutcome, FailureReason};
use crate::types::Notification;

/// Path appended to the configured base URL.
pub const NOTIFY_PATH: &str = "/api/notify";

/// Round-trip limit for one attempt. Does not bound the whole sequence.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("machine-inventory/", env!("CARGO_PKG_VERSION"));

/// Attempt limit and backoff schedule.
///
/// The wait after failed attempt `n` is `base_delay * 2^(n-1) + n * jitter_unit`.
/// The jitter term is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_unit: Duration,
}

impl Default for RetryPolicy {
    /// Defaults:
    /// - max_attempts: 3
    /// - base_delay: 1 second
    /// - jitter_unit: 100 milliseconds
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter_unit: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .saturating_add(self.jitter_unit.saturating_mul(attempt))
    }
}

/// Performs exactly one delivery attempt.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), FailureReason>;
}

/// JSON-over-HTTP sender targeting `<base_url>/api/notify`.
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
}

impl HttpSender {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), NOTIFY_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationSender for HttpSender {
    async fn send(&self, notification: &Notification) -> Result<(), FailureReason> {
        let body = serde_json::to_vec(notification)
            .map_err(|err| FailureReason::Encode(err.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(FailureReason::Status(resp.status().as_u16())),
            Err(err) if err.is_timeout() => Err(FailureReason::Timeout),
            Err(err) => Err(FailureReason::Network(err.to_string())),
        }
    }
}

/// Retrying delivery of notifications through a [`NotificationSender`].
///
/// Holds no per-delivery state; one transport serves any number of
/// concurrent deliveries.
pub struct DeliveryTransport {
    sender: Arc<dyn NotificationSender>,
    policy: RetryPolicy,
}

impl DeliveryTransport {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self {
            sender,
            policy: RetryPolicy::default(),
        }
    }

    /// Transport over [`HttpSender`] with the default request timeout.
    pub fn http(base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpSender::new(base_url)?)))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver until success, exhaustion or cancellation of `cancel`.
    pub async fn deliver(
        &self,
        notification: Notification,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        self.run(notification, cancel, None).await
    }

    /// Like [`deliver`](Self::deliver), additionally giving up at `deadline`.
    pub async fn deliver_until(
        &self,
        notification: Notification,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> DeliveryOutcome {
        self.run(notification, cancel, Some(deadline)).await
    }

    async fn run(
        &self,
        mut notification: Notification,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> DeliveryOutcome {
        let max_attempts = self.policy.max_attempts.max(1);

        // Fixed once so every retry carries the same value.
        if notification.timestamp.is_none() {
            notification.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        let mut attempt = 0u32;
        loop {
            if is_stopped(cancel, deadline) {
                return cancelled(&notification, attempt);
            }

            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = stopped(cancel, deadline) => return cancelled(&notification, attempt),
                result = self.sender.send(&notification) => result,
            };

            let reason = match result {
                Ok(()) => {
                    info!(
                        owner = %notification.owner_code,
                        level = ?notification.level,
                        attempt,
                        "notification delivered"
                    );
                    metric_inc("inventory.notify.delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(reason) => reason,
            };

            if attempt >= max_attempts {
                error!(
                    owner = %notification.owner_code,
                    attempt,
                    error = %reason,
                    "notification failed after {} attempts",
                    attempt
                );
                metric_inc("inventory.notify.exhausted");
                metric_inc_owner("inventory.notify.exhausted.owner", &notification.owner_code);
                return DeliveryOutcome::Exhausted {
                    attempts: attempt,
                    last_failure: reason,
                };
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                owner = %notification.owner_code,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "notification attempt failed, retrying"
            );
            metric_inc("inventory.notify.retry");

            tokio::select! {
                biased;
                _ = stopped(cancel, deadline) => return cancelled(&notification, attempt),
                _ = sleep(delay) => {}
            }
        }
    }
}

fn cancelled(notification: &Notification, attempts: u32) -> DeliveryOutcome {
    info!(
        owner = %notification.owner_code,
        attempt = attempts,
        "notification cancelled"
    );
    metric_inc("inventory.notify.cancelled");
    DeliveryOutcome::Cancelled { attempts }
}

fn is_stopped(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|at| Instant::now() >= at)
}

/// Resolves once the token is cancelled or the deadline passes.
async fn stopped(cancel: &CancellationToken, deadline: Option<Instant>) {
    match deadline {
        Some(at) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep_until(at) => {}
            }
        }
        None => cancel.cancelled().await,
    }
}
