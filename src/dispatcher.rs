use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::counters::metric_inc;
use crate::error::DispatchError;
use crate::transport::DeliveryTransport;
use crate::types::Notification;
use crate::worker::{worker_loop, StatsCounters, WorkerContext};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of delivery workers.
    pub worker_count: usize,
    /// Notifications that may wait for a worker before new ones are rejected.
    pub queue_size: usize,
    /// Upper bound on one delivery sequence, retries included.
    pub delivery_deadline: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_size: 256,
            delivery_deadline: None,
        }
    }
}

/// Point-in-time counters of dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub exhausted: u64,
}

impl DispatcherStats {
    /// Deliveries that reached a final outcome.
    pub fn completed(&self) -> u64 {
        self.delivered + self.cancelled + self.exhausted
    }
}

/// Detaches notification delivery from the caller.
///
/// Notifications go into a bounded queue drained by a fixed worker pool.
/// Handing one over never waits on delivery; a full queue rejects the
/// newest notification instead of growing.
pub struct Dispatcher {
    queue_tx: RwLock<Option<mpsc::Sender<Notification>>>,
    is_running: AtomicBool,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    stats: Arc<StatsCounters>,
}

impl Dispatcher {
    /// Start the worker pool. Must be called from within a tokio runtime.
    pub fn new(config: DispatcherConfig, transport: DeliveryTransport) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size.max(1));
        let shared_rx = Arc::new(Mutex::new(queue_rx));

        let cancel = CancellationToken::new();
        let stats = Arc::new(StatsCounters::default());

        let ctx = Arc::new(WorkerContext {
            transport: Arc::new(transport),
            cancel: cancel.clone(),
            delivery_deadline: config.delivery_deadline,
            stats: stats.clone(),
        });

        let worker_handles = (0..config.worker_count.max(1))
            .map(|_| tokio::spawn(worker_loop(shared_rx.clone(), ctx.clone())))
            .collect();

        Self {
            queue_tx: RwLock::new(Some(queue_tx)),
            is_running: AtomicBool::new(true),
            worker_handles: Mutex::new(worker_handles),
            cancel,
            stats,
        }
    }

    /// Queue a notification for delivery.
    ///
    /// Returns as soon as the notification is queued or rejected; the
    /// delivery outcome is never reported back.
    pub async fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        if !self.is_running.load(Ordering::SeqCst) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(DispatchError::Shutdown);
        }

        let guard = self.queue_tx.read().await;
        let Some(queue_tx) = guard.as_ref() else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(DispatchError::Shutdown);
        };

        match queue_tx.try_send(notification) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                metric_inc("inventory.dispatch.enqueued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                metric_inc("inventory.dispatch.backpressure");
                Err(DispatchError::Backpressure)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(DispatchError::Shutdown)
            }
        }
    }

    /// Queue a notification and forget about it. Rejections are only logged.
    pub async fn fire_and_forget(&self, notification: Notification) {
        let owner = notification.owner_code.clone();
        match self.dispatch(notification).await {
            Ok(()) => debug!(owner = %owner, "notification queued"),
            Err(err) => warn!(owner = %owner, error = %err, "notification dropped"),
        }
    }

    /// Stop accepting notifications, deliver what is queued, then join workers.
    pub async fn shutdown(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.queue_tx.write().await.take();

        let handles: Vec<_> = self.worker_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Like [`shutdown`](Self::shutdown), but cancels in-flight and queued
    /// deliveries instead of letting them run to completion.
    pub async fn shutdown_now(&self) {
        self.cancel.cancel();
        self.shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }
}
