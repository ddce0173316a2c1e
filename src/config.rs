use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::DispatcherConfig;
use crate::error::ConfigError;
use crate::transport::{DeliveryTransport, HttpSender, DEFAULT_REQUEST_TIMEOUT};
use crate::trigger::{RepeatPolicy, ThresholdTrigger, DEFAULT_THRESHOLD};

/// Notification settings loaded from environment variables.
///
/// | Env Var                | Default                 |
/// |------------------------|-------------------------|
/// | `NOTIFICATION_URL`     | `http://localhost:9090` |
/// | `NOTIFY_TIMEOUT_SECS`  | `10`                    |
/// | `NOTIFY_WORKERS`       | `4`                     |
/// | `NOTIFY_QUEUE_SIZE`    | `256`                   |
/// | `NOTIFY_DEADLINE_SECS` | unset (no deadline)     |
/// | `NOTIFY_THRESHOLD`     | `3`                     |
/// | `NOTIFY_REPEAT`        | `every`                 |
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Base URL of the notification service; `/api/notify` is appended.
    pub notification_url: String,
    /// Round-trip limit of a single attempt.
    pub request_timeout: Duration,
    pub dispatcher: DispatcherConfig,
    pub trigger: ThresholdTrigger,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            notification_url: "http://localhost:9090".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dispatcher: DispatcherConfig::default(),
            trigger: ThresholdTrigger::default(),
        }
    }
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or empty keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = DispatcherConfig::default();

        let notification_url = get("NOTIFICATION_URL")
            .unwrap_or_else(|| "http://localhost:9090".to_string());

        let request_timeout = Duration::from_secs(parse_or(
            "NOTIFY_TIMEOUT_SECS",
            get("NOTIFY_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?);

        let worker_count = parse_or("NOTIFY_WORKERS", get("NOTIFY_WORKERS"), defaults.worker_count)?;
        let queue_size = parse_or("NOTIFY_QUEUE_SIZE", get("NOTIFY_QUEUE_SIZE"), defaults.queue_size)?;

        let delivery_deadline = match get("NOTIFY_DEADLINE_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("NOTIFY_DEADLINE_SECS", raw)?)),
            None => None,
        };

        let threshold = parse_or("NOTIFY_THRESHOLD", get("NOTIFY_THRESHOLD"), DEFAULT_THRESHOLD)?;
        if threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "NOTIFY_THRESHOLD",
                value: threshold.to_string(),
                reason: "threshold must be at least 1".to_string(),
            });
        }
        let repeat: RepeatPolicy = parse_or("NOTIFY_REPEAT", get("NOTIFY_REPEAT"), RepeatPolicy::default())?;

        Ok(Self {
            notification_url,
            request_timeout,
            dispatcher: DispatcherConfig {
                worker_count,
                queue_size,
                delivery_deadline,
            },
            trigger: ThresholdTrigger::new(threshold).with_repeat(repeat),
        })
    }

    /// HTTP transport pointed at the configured notification service.
    pub fn build_transport(&self) -> Result<DeliveryTransport, reqwest::Error> {
        let sender = HttpSender::with_timeout(&self.notification_url, self.request_timeout)?;
        Ok(DeliveryTransport::new(Arc::new(sender)))
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => parse_value(key, raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value: raw,
    })
}
