//! Bounded retry with exponential delay for tile loads
//!
//! Base map tiles are retried a few times with a doubling delay before the
//! placeholder tile is shown. Marker images use [`RetryPolicy::none`].

use std::time::Duration;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on any single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(4);

/// Retry schedule.
///
/// # Example
///
/// ```
/// use hospital_map_cache::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for(0), Some(Duration::from_millis(250)));
/// assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
/// assert_eq!(policy.delay_for(3), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the cap on a single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay to wait after failed retry number `retry` (0-based), or `None`
    /// when no retries remain
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }

    /// Run `op` until it succeeds or the retries are exhausted.
    ///
    /// `op` receives the attempt number (0 for the first try). `sleep` is
    /// called with each delay so hosts can plug in their own timer.
    pub fn run<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => match self.delay_for(attempt) {
                    Some(delay) => {
                        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                        sleep(delay);
                        attempt += 1;
                    }
                    None => {
                        tracing::warn!(attempts = attempt + 1, error = %e, "giving up after retries");
                        return Err(e);
                    }
                },
            }
        }
    }
}
