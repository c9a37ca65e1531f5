//! Hospital Map Security Library
//!
//! The gate every user-driven mutation passes through before it reaches the
//! map state: free-text sanitization, coordinate and URL validation, and
//! sliding-window rate limiting with violation escalation.
//!
//! # Example
//!
//! ```
//! use hospital_map_security::{SecurityConfig, SecurityGate};
//!
//! let gate = SecurityGate::new(SecurityConfig::default());
//!
//! let clean = gate.sanitize("<script>alert(1)</script>Clinic");
//! assert!(!clean.contains("<script"));
//!
//! assert!(gate.validate_coordinates(48.85, 2.35));
//! assert!(gate.check_rate_limit("search-box"));
//! ```

mod config;
mod gate;
mod rate_limit;
mod sanitize;
mod validate;

pub use config::SecurityConfig;
pub use gate::{SecurityError, SecurityGate};
pub use rate_limit::{RateLimiter, SweepStats, ViolationOutcome};
pub use sanitize::{escape_html, is_suspicious, sanitize};
pub use validate::{validate_coordinates, validate_url};
