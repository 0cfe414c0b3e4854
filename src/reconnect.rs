//! Reconnect scheduling for the streaming channel.

use std::fmt;
use std::time::Duration;

/// Default delay between a channel failure and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// Default cap for exponential backoff.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_millis(60_000);

/// Decides how long to wait before reconnect attempt `attempt`.
///
/// `attempt` counts consecutive failures since the last successful connect,
/// starting at 1. Returning `None` gives up.
pub trait ReconnectPolicy: Send + Sync + fmt::Debug + 'static {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay before every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        within_budget(attempt, self.max_attempts).then_some(self.delay)
    }
}

/// Doubling delay starting at `base`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), DEFAULT_MAX_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !within_budget(attempt, self.max_attempts) {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(30);
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(exponent)));
        Some(delay.min(self.max))
    }
}

/// Policy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStrategy {
    Fixed(FixedDelay),
    Exponential(ExponentialBackoff),
}

impl Default for ReconnectStrategy {
    fn default() -> Self {
        Self::Fixed(FixedDelay::default())
    }
}

impl ReconnectPolicy for ReconnectStrategy {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed(policy) => policy.next_delay(attempt),
            Self::Exponential(policy) => policy.next_delay(attempt),
        }
    }
}

fn within_budget(attempt: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.map_or(true, |max| attempt <= max)
}
