use thiserror::Error;

use crate::types::MachineId;

/// Errors returned when handing a notification to the dispatcher fails
/// *before* delivery begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Dispatcher queue is full. The notification is dropped.
    #[error("dispatcher at capacity")]
    Backpressure,

    /// Dispatcher has been shut down.
    #[error("dispatcher is shut down")]
    Shutdown,
}

/// Final outcome of one delivery attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered with a 2xx status.
    Delivered { attempts: u32 },

    /// The cancellation token or the deadline fired first.
    Cancelled { attempts: u32 },

    /// Every allowed attempt failed.
    Exhausted {
        attempts: u32,
        last_failure: FailureReason,
    },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Cancelled { attempts }
            | DeliveryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Reasons why a single delivery attempt failed.
///
/// Every variant is retried the same way; 4xx and 5xx are not told apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}: request failed")]
    Status(u16),

    #[error("failed to encode notification: {0}")]
    Encode(String),
}

/// Business-rule violations in caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("MAC address must be 17 characters long (XX:XX:XX:XX:XX:XX)")]
    MacAddressLength,

    #[error("employee abbreviation must be exactly 3 characters")]
    OwnerCodeLength,

    #[error("employee abbreviation must be lowercase")]
    OwnerCodeCase,

    #[error("invalid machine ID")]
    InvalidId,
}

/// Failures reported by a [`MachineStore`](crate::MachineStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("machine {0} not found")]
    NotFound(MachineId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced synchronously to callers of the inventory service.
///
/// Delivery failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("machine {0} not found")]
    NotFound(MachineId),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => InventoryError::NotFound(id),
            other => InventoryError::Store(other),
        }
    }
}

/// Invalid or unparsable configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
