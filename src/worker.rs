use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::DispatcherStats;
use crate::error::DeliveryOutcome;
use crate::transport::DeliveryTransport;
use crate::types::Notification;

/// Shared, read-only context for all workers.
pub(crate) struct WorkerContext {
    pub transport: Arc<DeliveryTransport>,

    /// Parent of every per-delivery token.
    pub cancel: CancellationToken,

    /// Budget for one delivery, counted from when a worker picks it up.
    pub delivery_deadline: Option<Duration>,

    pub stats: Arc<StatsCounters>,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub enqueued: AtomicU64,
    pub rejected: AtomicU64,
    pub delivered: AtomicU64,
    pub cancelled: AtomicU64,
    pub exhausted: AtomicU64,
}

impl StatsCounters {
    fn record(&self, outcome: &DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered { .. } => &self.delivered,
            DeliveryOutcome::Cancelled { .. } => &self.cancelled,
            DeliveryOutcome::Exhausted { .. } => &self.exhausted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Main worker loop.
///
/// Each worker:
/// - Pulls notifications from the shared queue
/// - Runs one full delivery sequence per notification
/// - Exits once the queue is closed and drained
pub(crate) async fn worker_loop(
    rx: Arc<Mutex<mpsc::Receiver<Notification>>>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        let notification = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let Some(notification) = notification else { break };

        let outcome = process_notification(notification, &ctx).await;
        ctx.stats.record(&outcome);
    }
}

async fn process_notification(notification: Notification, ctx: &WorkerContext) -> DeliveryOutcome {
    let cancel = ctx.cancel.child_token();

    match ctx.delivery_deadline {
        Some(budget) => {
            ctx.transport
                .deliver_until(notification, &cancel, Instant::now() + budget)
                .await
        }
        None => ctx.transport.deliver(notification, &cancel).await,
    }
}
