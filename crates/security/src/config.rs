//! Security gate configuration.

use std::time::Duration;

/// Default maximum length (in characters) of any sanitized input
pub const INPUT_MAX_LENGTH: usize = 1000;

/// Default number of requests allowed per client within [`TIME_WINDOW`]
pub const MAX_REQUESTS: usize = 100;

/// Default sliding window for rate limiting (60 seconds)
pub const TIME_WINDOW: Duration = Duration::from_secs(60);

/// Default block duration once a client exceeds its rate (5 minutes)
pub const BLOCKED_DURATION: Duration = Duration::from_secs(5 * 60);

/// Default number of violations per key before the source is blocked
pub const MAX_VIOLATIONS: u32 = 5;

/// Tunables for the security gate.
///
/// Every limit has a sensible default; the `with_*` builders exist mostly so
/// tests can run with tiny windows.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityConfig {
    /// Maximum input length in characters
    pub input_max_length: usize,

    /// Requests allowed per client within `time_window`
    pub max_requests: usize,

    /// Sliding window length
    pub time_window: Duration,

    /// How long a rate-limited or escalated client stays blocked
    pub blocked_duration: Duration,

    /// Violations per `(source, directive)` before escalation
    pub max_violations: u32,

    /// URL schemes accepted by `validate_url`
    pub allowed_protocols: Vec<String>,

    /// Hosts (and their subdomains) accepted by `validate_url`
    pub allowed_hosts: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            input_max_length: INPUT_MAX_LENGTH,
            max_requests: MAX_REQUESTS,
            time_window: TIME_WINDOW,
            blocked_duration: BLOCKED_DURATION,
            max_violations: MAX_VIOLATIONS,
            allowed_protocols: ["http", "https", "mailto", "tel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_hosts: [
                "openstreetmap.org",
                "tile.openstreetmap.org",
                "basemaps.cartocdn.com",
                "arcgisonline.com",
                "unpkg.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl SecurityConfig {
    /// Sets the maximum sanitized input length.
    pub fn with_input_max_length(mut self, max: usize) -> Self {
        self.input_max_length = max;
        self
    }

    /// Sets the rate limit: `max_requests` per `window`.
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.time_window = window;
        self
    }

    /// Sets the block duration.
    pub fn with_blocked_duration(mut self, duration: Duration) -> Self {
        self.blocked_duration = duration;
        self
    }

    /// Sets the violation escalation threshold.
    pub fn with_max_violations(mut self, max: u32) -> Self {
        self.max_violations = max;
        self
    }

    /// Adds a host to the URL allow-list.
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.push(host.into().to_ascii_lowercase());
        self
    }
}
