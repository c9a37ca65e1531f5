//! Sliding-window rate limiting with violation escalation
//!
//! Each client keeps a window of recent action timestamps. A client whose
//! window is full is rejected and, on the first rejection, blocked for the
//! configured duration. Separately, repeated security violations keyed by
//! `(source, directive)` escalate the source into the same block set.
//!
//! All entry points have an `*_at` variant taking an explicit `Instant` so
//! the limiter can be driven deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Result of recording a security violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Violation counted; carries the current count for the key
    Counted(u32),

    /// Count reached the threshold and the source is now blocked
    Escalated,
}

/// What a periodic sweep cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Client windows with no timestamps left inside the window
    pub windows_removed: usize,

    /// Blocks whose duration had elapsed
    pub blocks_lifted: usize,

    /// Violation counters older than the block duration
    pub violations_cleared: usize,
}

#[derive(Debug, Clone, Copy)]
struct ViolationCounter {
    count: u32,
    last_seen: Instant,
}

struct LimiterState {
    /// client id -> timestamps within the window (oldest at front)
    windows: HashMap<String, VecDeque<Instant>>,

    /// client id -> instant the block is lifted
    blocked: HashMap<String, Instant>,

    /// "source:directive" -> counter
    violations: HashMap<String, ViolationCounter>,
}

/// Sliding-window rate limiter.
///
/// # Example
///
/// ```
/// use hospital_map_security::RateLimiter;
/// use std::time::{Duration, Instant};
///
/// let limiter = RateLimiter::new(2, Duration::from_secs(1), Duration::from_secs(5), 3);
/// let now = Instant::now();
///
/// assert!(limiter.check_at("client", now));
/// assert!(limiter.check_at("client", now));
/// assert!(!limiter.check_at("client", now));
/// ```
pub struct RateLimiter {
    max_requests: usize,
    time_window: Duration,
    blocked_duration: Duration,
    max_violations: u32,
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(
        max_requests: usize,
        time_window: Duration,
        blocked_duration: Duration,
        max_violations: u32,
    ) -> Self {
        Self {
            max_requests,
            time_window,
            blocked_duration,
            max_violations,
            state: Arc::new(Mutex::new(LimiterState {
                windows: HashMap::new(),
                blocked: HashMap::new(),
                violations: HashMap::new(),
            })),
        }
    }

    /// Check and record an action for `client_id` at the current time.
    pub fn check(&self, client_id: &str) -> bool {
        self.check_at(client_id, Instant::now())
    }

    /// Check and record an action for `client_id` at `now`.
    ///
    /// Returns `false` if the client is blocked or its window already holds
    /// `max_requests` entries. The first rejection starts a block.
    pub fn check_at(&self, client_id: &str, now: Instant) -> bool {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        if let Some(&until) = state.blocked.get(client_id) {
            if now < until {
                return false;
            }
            state.blocked.remove(client_id);
            tracing::debug!(client_id, "rate limit block lifted");
        }

        let window = state.windows.entry(client_id.to_string()).or_default();
        prune(window, now, self.time_window);

        if window.len() >= self.max_requests {
            state
                .blocked
                .insert(client_id.to_string(), now + self.blocked_duration);
            tracing::warn!(
                client_id,
                max_requests = self.max_requests,
                blocked_for_secs = self.blocked_duration.as_secs(),
                "rate limit exceeded, client blocked"
            );
            return false;
        }

        window.push_back(now);
        true
    }

    /// Whether `client_id` is currently blocked.
    pub fn is_blocked_at(&self, client_id: &str, now: Instant) -> bool {
        let state = self.state.lock().unwrap();
        state
            .blocked
            .get(client_id)
            .is_some_and(|&until| now < until)
    }

    /// Record a violation for `(source, directive)` at `now`.
    ///
    /// When the key reaches `max_violations` the whole source is blocked and
    /// the counter restarts.
    pub fn record_violation_at(
        &self,
        source: &str,
        directive: &str,
        now: Instant,
    ) -> ViolationOutcome {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let key = format!("{source}:{directive}");

        let counter = state.violations.entry(key.clone()).or_insert(ViolationCounter {
            count: 0,
            last_seen: now,
        });
        counter.count += 1;
        counter.last_seen = now;
        let count = counter.count;

        if count >= self.max_violations {
            state.violations.remove(&key);
            state
                .blocked
                .insert(source.to_string(), now + self.blocked_duration);
            tracing::warn!(source, directive, count, "repeated violations, source blocked");
            ViolationOutcome::Escalated
        } else {
            tracing::debug!(source, directive, count, "security violation recorded");
            ViolationOutcome::Counted(count)
        }
    }

    /// Number of timestamps currently recorded for `client_id`.
    pub fn window_len(&self, client_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.windows.get(client_id).map_or(0, VecDeque::len)
    }

    /// Number of tracked clients (windows).
    pub fn tracked_clients(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.windows.len()
    }

    /// Periodic garbage collection of expired state.
    pub fn sweep_at(&self, now: Instant) -> SweepStats {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let mut stats = SweepStats::default();

        let window = self.time_window;
        state.windows.retain(|_, timestamps| {
            prune(timestamps, now, window);
            let keep = !timestamps.is_empty();
            if !keep {
                stats.windows_removed += 1;
            }
            keep
        });

        state.blocked.retain(|_, until| {
            let keep = now < *until;
            if !keep {
                stats.blocks_lifted += 1;
            }
            keep
        });

        let retention = self.blocked_duration;
        state.violations.retain(|_, counter| {
            let keep = now.saturating_duration_since(counter.last_seen) < retention;
            if !keep {
                stats.violations_cleared += 1;
            }
            keep
        });

        stats
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, time_window: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= time_window {
            window.pop_front();
        } else {
            break;
        }
    }
}
