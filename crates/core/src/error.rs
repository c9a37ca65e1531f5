//! Error taxonomy and the single handling funnel
//!
//! Every failure path in the map ends up in [`ErrorHandler::handle`], which
//! logs it, forwards it to an optional reporter and, for the classes a user
//! should see, queues a short-lived [`Notice`].

use hospital_map_security::SecurityError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a transient notice stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Errors produced by the map engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// Malformed hospital record or bad coordinates
    #[error("invalid record {id}: {reason}")]
    Validation { id: String, reason: String },

    /// Image or tile failed to load
    #[error("failed to load {url}: {reason}")]
    Resource { url: String, reason: String },

    /// An intent was throttled
    #[error("too many requests for {action}")]
    RateLimited { action: String },

    /// Suspicious input or a policy report
    #[error("security violation from {source_id}: {detail}")]
    SecurityViolation {
        source_id: String,
        detail: String,
        escalated: bool,
    },
}

impl MapError {
    /// Shorthand for a validation error
    pub fn validation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        MapError::Validation {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a resource error
    pub fn resource(url: impl Into<String>, reason: impl Into<String>) -> Self {
        MapError::Resource {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<SecurityError> for MapError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RateLimited { client_id } => MapError::RateLimited { action: client_id },
            SecurityError::Violation {
                source_id,
                directive,
                escalated,
            } => MapError::SecurityViolation {
                source_id,
                detail: directive,
                escalated,
            },
            SecurityError::InvalidUrl(url) => MapError::SecurityViolation {
                source_id: "url".to_string(),
                detail: format!("rejected URL {url}"),
                escalated: false,
            },
        }
    }
}

/// Telemetry sink for handled errors
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &MapError);
}

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// A transient, user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at: Instant,
}

/// Single funnel for all map errors.
///
/// Cloning shares the notice queue and reporter.
#[derive(Clone, Default)]
pub struct ErrorHandler {
    reporter: Option<Arc<dyn ErrorReporter>>,
    notices: Arc<Mutex<VecDeque<Notice>>>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a telemetry reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Handle an error at the current time
    pub fn handle(&self, error: &MapError) {
        self.handle_at(error, Instant::now());
    }

    /// Handle an error at `now`
    pub fn handle_at(&self, error: &MapError, now: Instant) {
        match error {
            MapError::Validation { id, reason } => {
                tracing::warn!(id = %id, reason = %reason, "dropping invalid record");
            }
            MapError::Resource { url, reason } => {
                tracing::warn!(url = %url, reason = %reason, "resource failed, using placeholder");
                self.push_notice(NoticeLevel::Info, "Some images could not be loaded", now);
            }
            MapError::RateLimited { action } => {
                tracing::warn!(action = %action, "action throttled");
                self.push_notice(
                    NoticeLevel::Warning,
                    "Too many requests. Please slow down.",
                    now,
                );
            }
            MapError::SecurityViolation {
                source_id,
                detail,
                escalated,
            } => {
                if *escalated {
                    tracing::error!(source_id = %source_id, detail = %detail, "repeated security violations, source blocked");
                } else {
                    tracing::warn!(source_id = %source_id, detail = %detail, "security violation");
                }
            }
        }

        if let Some(reporter) = &self.reporter {
            reporter.report(error);
        }
    }

    /// Notices still live at `now`; expired ones are dropped
    pub fn active_notices_at(&self, now: Instant) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap();
        notices.retain(|n| n.expires_at > now);
        notices.iter().cloned().collect()
    }

    /// Notices still live at the current time
    pub fn active_notices(&self) -> Vec<Notice> {
        self.active_notices_at(Instant::now())
    }

    fn push_notice(&self, level: NoticeLevel, message: &str, now: Instant) {
        let mut notices = self.notices.lock().unwrap();
        // Collapse repeats of the same message into one live notice
        notices.retain(|n| n.message != message && n.expires_at > now);
        notices.push_back(Notice {
            level,
            message: message.to_string(),
            expires_at: now + NOTICE_TTL,
        });
    }
}
