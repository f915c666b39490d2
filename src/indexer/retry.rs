use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::IndexerSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before asking again for a block the chain has not produced yet.
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_persist_attempts: usize,
    pub call_timeout: Duration,
    /// Bound on one commit attempt; an attempt that overruns counts as a retryable failure.
    pub persist_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&IndexerSettings::default())
    }
}

impl From<&IndexerSettings> for RetryPolicy {
    fn from(settings: &IndexerSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            max_persist_attempts: settings.max_persist_attempts,
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
            persist_timeout: Duration::from_millis(settings.persist_timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Delays of `initial, 2*initial, 4*initial, ...` capped at `max_backoff`.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.initial_backoff.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_backoff)
    }
}
