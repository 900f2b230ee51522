//! Exponential backoff for a single job's retries.

use std::time::Duration;

use crate::config::DispatchConfig;

/// Retry tuning shared by every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
            multiplier: config.backoff_multiplier,
            max_backoff: config.max_backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// Attempt counter and current delay, created per job and dropped when it resolves.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    delay: Duration,
    policy: RetryPolicy,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            attempt: 0,
            delay: policy.initial_delay,
            policy,
        }
    }

    /// Failed attempts so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn can_attempt(&self) -> bool {
        self.attempt < self.policy.max_retries
    }

    /// Record a transport or unexpected failure.
    ///
    /// Returns the wait before the next attempt and grows the delay,
    /// capped at `max_backoff`.
    pub fn on_failure(&mut self) -> Duration {
        self.attempt += 1;
        let wait = self.delay;
        self.delay = self
            .delay
            .checked_mul(self.policy.multiplier)
            .map_or(self.policy.max_backoff, |next| next.min(self.policy.max_backoff));
        wait
    }

    /// Record a model warm-up signal.
    ///
    /// Waits the remote's estimate (or the current delay when it gave none),
    /// capped at `max_backoff`. The exponential delay is left untouched.
    pub fn on_loading(&mut self, advertised: Option<Duration>) -> Duration {
        self.attempt += 1;
        advertised.unwrap_or(self.delay).min(self.policy.max_backoff)
    }
}
