//! The security gate facade.

use crate::config::SecurityConfig;
use crate::rate_limit::{RateLimiter, SweepStats, ViolationOutcome};
use crate::sanitize;
use crate::validate;
use std::time::Instant;

/// Errors raised at the security boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("rate limit exceeded for {client_id}")]
    RateLimited { client_id: String },
    #[error("suspicious input from {source_id} ({directive})")]
    Violation {
        source_id: String,
        directive: String,
        escalated: bool,
    },
    #[error("URL rejected: {0}")]
    InvalidUrl(String),
}

/// Sanitization, validation and rate limiting behind one handle.
///
/// The gate is constructed explicitly and shared (`Arc<SecurityGate>`) with
/// the store and the intent controller, so tests can run isolated gates in
/// parallel.
pub struct SecurityGate {
    config: SecurityConfig,
    limiter: RateLimiter,
}

impl SecurityGate {
    /// Create a new gate from configuration
    pub fn new(config: SecurityConfig) -> Self {
        let limiter = RateLimiter::new(
            config.max_requests,
            config.time_window,
            config.blocked_duration,
            config.max_violations,
        );
        Self { config, limiter }
    }

    /// The active configuration
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Sanitize free text with the configured length limit.
    pub fn sanitize(&self, input: &str) -> String {
        sanitize::sanitize(input, self.config.input_max_length)
    }

    /// Sanitize free text and record a violation for `source` when the raw
    /// input looked like an injection attempt.
    ///
    /// The sanitized value is always returned; the error (if any) is only
    /// for reporting.
    pub fn sanitize_reporting(
        &self,
        source: &str,
        input: &str,
    ) -> (String, Option<SecurityError>) {
        let clean = self.sanitize(input);
        if !sanitize::is_suspicious(input) {
            return (clean, None);
        }

        let outcome = self
            .limiter
            .record_violation_at(source, "suspicious-input", Instant::now());
        let error = SecurityError::Violation {
            source_id: source.to_string(),
            directive: "suspicious-input".to_string(),
            escalated: outcome == ViolationOutcome::Escalated,
        };
        (clean, Some(error))
    }

    /// See [`validate::validate_coordinates`].
    pub fn validate_coordinates(&self, lat: f64, lon: f64) -> bool {
        validate::validate_coordinates(lat, lon)
    }

    /// Validate a URL against the configured allow-lists.
    pub fn validate_url(&self, url: &str) -> bool {
        validate::validate_url(url, &self.config.allowed_protocols, &self.config.allowed_hosts)
    }

    /// Like [`validate_url`](Self::validate_url) but as a `Result`.
    pub fn require_url(&self, url: &str) -> Result<(), SecurityError> {
        if self.validate_url(url) {
            Ok(())
        } else {
            Err(SecurityError::InvalidUrl(url.to_string()))
        }
    }

    /// Sliding-window check for `client_id` at the current time.
    pub fn check_rate_limit(&self, client_id: &str) -> bool {
        self.limiter.check(client_id)
    }

    /// Sliding-window check for `client_id` at `now`.
    pub fn check_rate_limit_at(&self, client_id: &str, now: Instant) -> bool {
        self.limiter.check_at(client_id, now)
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit) but as a `Result`.
    pub fn require_rate_limit(&self, client_id: &str) -> Result<(), SecurityError> {
        if self.check_rate_limit(client_id) {
            Ok(())
        } else {
            Err(SecurityError::RateLimited {
                client_id: client_id.to_string(),
            })
        }
    }

    /// Record a policy violation (e.g. a CSP report) for `(source, directive)`.
    pub fn record_violation(&self, source: &str, directive: &str) -> ViolationOutcome {
        self.limiter.record_violation_at(source, directive, Instant::now())
    }

    /// Record a policy violation at `now`.
    pub fn record_violation_at(&self, source: &str, directive: &str, now: Instant) -> ViolationOutcome {
        self.limiter.record_violation_at(source, directive, now)
    }

    /// Whether `client_id` is in the temporary block set.
    pub fn is_blocked(&self, client_id: &str) -> bool {
        self.limiter.is_blocked_at(client_id, Instant::now())
    }

    /// Periodic sweep of expired windows, blocks and counters.
    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(Instant::now())
    }

    /// Periodic sweep at `now`.
    pub fn sweep_at(&self, now: Instant) -> SweepStats {
        let stats = self.limiter.sweep_at(now);
        tracing::debug!(
            windows_removed = stats.windows_removed,
            blocks_lifted = stats.blocks_lifted,
            violations_cleared = stats.violations_cleared,
            "security sweep"
        );
        stats
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new(SecurityConfig::default())
    }
}
