//! Machine inventory core with threshold warnings.
//!
//! This crate tracks company-issued machines and the employee each one is
//! assigned to, and warns an external notification service whenever an
//! employee ends up holding too many machines.
//!
//! ## Guarantees
//! - Mutations never wait on, or fail because of, notification delivery
//! - Bounded queueing with explicit backpressure (newest is rejected)
//! - At most three attempts per notification, with fixed backoff
//! - Per-delivery cancellation and optional deadline
//!
//! ## Non-Guarantees
//! - Durability of records or of queued notifications
//! - Exactly-once delivery
//! - Deduplication of repeated warnings (see [`RepeatPolicy`])
//!
//! Record storage is a collaborator behind [`MachineStore`]; only an
//! in-memory implementation ships here.

mod config;
mod counters;
mod dispatcher;
mod error;
mod service;
mod storage;
mod transport;
mod trigger;
mod types;
mod worker;

pub use config::NotifierConfig;
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats};
pub use error::{
    ConfigError,
    DeliveryOutcome,
    DispatchError,
    FailureReason,
    InventoryError,
    StoreError,
    ValidationError,
};
pub use service::InventoryService;
pub use storage::{InMemoryStore, MachineStore};
pub use transport::{
    DeliveryTransport,
    HttpSender,
    NotificationSender,
    RetryPolicy,
    DEFAULT_REQUEST_TIMEOUT,
    NOTIFY_PATH,
};
pub use trigger::{limit_notification, RepeatPolicy, ThresholdTrigger, DEFAULT_THRESHOLD};
pub use types::{
    Level,
    Machine,
    MachineDraft,
    MachineId,
    MachineRecord,
    Notification,
    OwnerCode,
};
