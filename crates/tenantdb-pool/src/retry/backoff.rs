//! Exponential backoff calculator for pool creation retries
//!
//! Implements capped exponential backoff with optional upward jitter,
//! preventing thundering herd problems when many tenants reconnect at once.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff strategy for pool creation retries.
///
/// Calculates delays that grow exponentially with each attempt,
/// up to a configurable maximum. Jitter, when enabled, stretches the
/// capped delay by a random factor in `[1.0, 1.25)`.
///
/// # Example
///
/// ```
/// use tenantdb_pool::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(100, 5_000);
///
/// assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
/// assert_eq!(backoff.calculate_delay(10), Duration::from_millis(5_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Delay in milliseconds before the second try
    initial_ms: u64,
    /// Cap for exponential growth in milliseconds
    max_ms: u64,
    /// Growth factor per attempt (default: 2.0)
    multiplier: f64,
    /// Whether to stretch delays randomly (default: false for predictable testing)
    jitter: bool,
}

impl BackoffStrategy {
    /// Create a new backoff strategy with the given initial and maximum delays.
    ///
    /// `max_ms` is raised to `initial_ms` when smaller.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Set the multiplier for exponential growth.
    ///
    /// Default is 2.0 (delay doubles each attempt). Values below 1.0 are
    /// raised to 1.0.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Enable jitter to add randomness to delays.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay for a given zero-based attempt number.
    ///
    /// Attempt 0 is the wait before the second try.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped_ms = self.capped_ms(attempt);

        let final_ms = if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(1.0..1.25);
            (capped_ms * factor).floor()
        } else {
            capped_ms.floor()
        };

        Duration::from_millis(final_ms as u64)
    }

    /// `min(initial * multiplier^attempt, max)` before jitter
    fn capped_ms(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        raw_ms.min(self.max_ms as f64)
    }

    /// Get the initial delay.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    /// Get the maximum delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Get the multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Check if jitter is enabled.
    pub fn has_jitter(&self) -> bool {
        self.jitter
    }
}

impl Default for BackoffStrategy {
    /// Default backoff: 100ms initial, 5 seconds max, 2x multiplier, no jitter
    fn default() -> Self {
        Self::new(100, 5_000)
    }
}
