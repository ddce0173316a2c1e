use std::str::FromStr;

use crate::types::{Notification, OwnerCode};

/// Machine count at which an owner is warned about.
pub const DEFAULT_THRESHOLD: u64 = 3;

/// When an owner already at or above the threshold is warned again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Every mutation that leaves the owner at or above the threshold warns.
    #[default]
    EveryMutation,
    /// Only the mutation that moves the owner from below to at-or-above warns.
    OnCrossing,
}

impl FromStr for RepeatPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every" | "every_mutation" => Ok(RepeatPolicy::EveryMutation),
            "crossing" | "on_crossing" => Ok(RepeatPolicy::OnCrossing),
            other => Err(format!("expected `every` or `crossing`, got `{other}`")),
        }
    }
}

/// Decides whether a mutation warrants a warning notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdTrigger {
    pub threshold: u64,
    pub repeat: RepeatPolicy,
}

impl Default for ThresholdTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl ThresholdTrigger {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            repeat: RepeatPolicy::default(),
        }
    }

    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        self.repeat = repeat;
        self
    }

    /// Evaluate the creation of a machine for `owner`, who held
    /// `count_before` machines beforehand.
    pub fn on_created(&self, owner: &OwnerCode, count_before: u64) -> Option<Notification> {
        self.evaluate(owner, count_before, count_before.saturating_add(1))
    }

    /// Evaluate moving a machine from `previous` to `current`, where
    /// `count_after` is `current`'s count after the update.
    pub fn on_reassigned(
        &self,
        previous: Option<&OwnerCode>,
        current: Option<&OwnerCode>,
        count_after: u64,
    ) -> Option<Notification> {
        let current = current?;
        if previous == Some(current) {
            return None;
        }
        self.evaluate(current, count_after.saturating_sub(1), count_after)
    }

    fn evaluate(&self, owner: &OwnerCode, before: u64, after: u64) -> Option<Notification> {
        if after < self.threshold {
            return None;
        }
        if self.repeat == RepeatPolicy::OnCrossing && before >= self.threshold {
            return None;
        }
        Some(limit_notification(owner, after))
    }
}

/// Warning stating that `owner` now holds `count` machines.
pub fn limit_notification(owner: &OwnerCode, count: u64) -> Notification {
    Notification::warning(
        owner.clone(),
        format!("Employee {owner} has been assigned {count} computers"),
    )
}
