//! Backoff policy for upstream retries.

use std::{thread, time::Duration};

/// Exponential backoff with jitter.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fractional jitter applied symmetrically, e.g. 0.2 for ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1), jitter: 0.2 }
    }
}

impl RetryPolicy {
    /// The delay before retry `attempt` (0-indexed): `base·2^attempt`,
    /// jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64() * f64::from(1u32 << attempt.min(16));
        let spread = 1.0 + self.jitter * (fastrand::f64() * 2.0 - 1.0);
        Duration::from_secs_f64(base * spread)
    }
}

/// Injectable sleep, so tests can observe delays instead of waiting them
/// out.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
