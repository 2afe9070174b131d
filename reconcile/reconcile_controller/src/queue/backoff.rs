//! Per-key exponential backoff.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use reconcile_core::BackoffConfig;

/// Tracks consecutive failures per key and turns them into retry delays.
///
/// The n-th retry of a key waits `base * 2^n`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff<K> {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: Eq + Hash + Clone> ExponentialBackoff<K> {
    /// Create a backoff with the given bounds.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Create a backoff from configuration.
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }

    /// Delay before the next retry of `key`. Counts as one more failure.
    pub fn when(&self, key: &K) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);

        2u32.checked_pow(exp)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Clear the failure history of `key`.
    pub fn forget(&self, key: &K) {
        self.failures.lock().remove(key);
    }

    /// Number of retries handed out for `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}
