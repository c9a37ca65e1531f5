//! Map engine configuration
//!
//! Every tunable has a default. Configuration can be built programmatically,
//! read from `HOSPITAL_MAP_*` environment variables, or loaded from a JSON
//! file.

use hospital_map_security::SecurityConfig;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Records per scheduler chunk
pub const CHUNK_SIZE: usize = 50;

/// Minimum delay between two visible chunks
pub const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Upper bound on live markers
pub const MAX_MARKERS: usize = 5000;

/// Live marker count above which off-screen markers are evicted
pub const MARKER_CLEANUP_THRESHOLD: usize = 1000;

/// Fraction of the viewport added on every side before eviction
pub const VIEWPORT_PADDING: f64 = 0.5;

/// Maximum cached images
pub const MAX_CACHE_SIZE: usize = 100;

/// Cached image lifetime
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Margin in pixels around the viewport that triggers image loading
pub const LAZY_LOAD_DISTANCE: f64 = 200.0;

/// Snapshots kept for undo
pub const HISTORY_LIMIT: usize = crate::store::HISTORY_LIMIT;

/// Configuration for the map engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Records per scheduler chunk
    pub chunk_size: usize,
    /// Minimum delay between visible chunks
    pub chunk_delay: Duration,
    /// Upper bound on live markers
    pub max_markers: usize,
    /// Eviction threshold
    pub marker_cleanup_threshold: usize,
    /// Viewport padding factor applied before eviction
    pub viewport_padding: f64,
    /// Image cache capacity (entries)
    pub max_cache_size: usize,
    /// Image cache entry lifetime
    pub cache_ttl: Duration,
    /// Lazy image loading margin in pixels
    pub lazy_load_distance: f64,
    /// Store undo depth
    pub history_limit: usize,
    /// Input sanitization and rate limiting
    pub security: SecurityConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_delay: CHUNK_DELAY,
            max_markers: MAX_MARKERS,
            marker_cleanup_threshold: MARKER_CLEANUP_THRESHOLD,
            viewport_padding: VIEWPORT_PADDING,
            max_cache_size: MAX_CACHE_SIZE,
            cache_ttl: CACHE_TTL,
            lazy_load_distance: LAZY_LOAD_DISTANCE,
            history_limit: HISTORY_LIMIT,
            security: SecurityConfig::default(),
        }
    }
}

impl MapConfig {
    /// Sets the scheduler chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sets the delay between visible chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Sets the live marker cap.
    pub fn with_max_markers(mut self, max: usize) -> Self {
        self.max_markers = max;
        self
    }

    /// Sets the eviction threshold.
    pub fn with_marker_cleanup_threshold(mut self, threshold: usize) -> Self {
        self.marker_cleanup_threshold = threshold;
        self
    }

    /// Sets the viewport padding factor.
    pub fn with_viewport_padding(mut self, padding: f64) -> Self {
        self.viewport_padding = padding;
        self
    }

    /// Sets the image cache capacity.
    pub fn with_max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    /// Sets the image cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the lazy loading margin.
    pub fn with_lazy_load_distance(mut self, distance: f64) -> Self {
        self.lazy_load_distance = distance;
        self
    }

    /// Sets the undo depth.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Replaces the security configuration.
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    /// The security configuration, for building a `SecurityGate`.
    pub fn security_config(&self) -> SecurityConfig {
        self.security.clone()
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HOSPITAL_MAP_CHUNK_SIZE`
    /// - `HOSPITAL_MAP_CHUNK_DELAY_MS`
    /// - `HOSPITAL_MAP_MAX_MARKERS`
    /// - `HOSPITAL_MAP_MARKER_CLEANUP_THRESHOLD`
    /// - `HOSPITAL_MAP_VIEWPORT_PADDING`
    /// - `HOSPITAL_MAP_MAX_CACHE_SIZE`
    /// - `HOSPITAL_MAP_CACHE_TTL_SECS`
    /// - `HOSPITAL_MAP_LAZY_LOAD_DISTANCE`
    /// - `HOSPITAL_MAP_HISTORY_LIMIT`
    /// - `HOSPITAL_MAP_INPUT_MAX_LENGTH`
    /// - `HOSPITAL_MAP_MAX_REQUESTS`
    /// - `HOSPITAL_MAP_TIME_WINDOW_SECS`
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_var("HOSPITAL_MAP_CHUNK_SIZE")? {
            config.chunk_size = positive("HOSPITAL_MAP_CHUNK_SIZE", v)?;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_CHUNK_DELAY_MS")? {
            config.chunk_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_var("HOSPITAL_MAP_MAX_MARKERS")? {
            config.max_markers = v;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_MARKER_CLEANUP_THRESHOLD")? {
            config.marker_cleanup_threshold = v;
        }
        if let Some(v) = env_var::<f64>("HOSPITAL_MAP_VIEWPORT_PADDING")? {
            config.viewport_padding = non_negative("HOSPITAL_MAP_VIEWPORT_PADDING", v)?;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_MAX_CACHE_SIZE")? {
            config.max_cache_size = v;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_var::<f64>("HOSPITAL_MAP_LAZY_LOAD_DISTANCE")? {
            config.lazy_load_distance = non_negative("HOSPITAL_MAP_LAZY_LOAD_DISTANCE", v)?;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_HISTORY_LIMIT")? {
            config.history_limit = v;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_INPUT_MAX_LENGTH")? {
            config.security.input_max_length = v;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_MAX_REQUESTS")? {
            config.security.max_requests = v;
        }
        if let Some(v) = env_var("HOSPITAL_MAP_TIME_WINDOW_SECS")? {
            config.security.time_window = Duration::from_secs(v);
        }

        Ok(config)
    }

    /// Loads configuration from a JSON file.
    ///
    /// Missing keys keep their defaults:
    /// ```json
    /// { "chunkSize": 25, "cacheTtlSecs": 600, "allowedHosts": ["example.org"] }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&contents)
    }

    /// Parses configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    chunk_size: Option<usize>,
    chunk_delay_ms: Option<u64>,
    max_markers: Option<usize>,
    marker_cleanup_threshold: Option<usize>,
    viewport_padding: Option<f64>,
    max_cache_size: Option<usize>,
    cache_ttl_secs: Option<u64>,
    lazy_load_distance: Option<f64>,
    history_limit: Option<usize>,
    input_max_length: Option<usize>,
    max_requests: Option<usize>,
    time_window_secs: Option<u64>,
    blocked_duration_secs: Option<u64>,
    max_violations: Option<u32>,
    allowed_hosts: Option<Vec<String>>,
}

impl ConfigFile {
    fn into_config(self) -> Result<MapConfig, ConfigError> {
        let mut config = MapConfig::default();

        if let Some(v) = self.chunk_size {
            config.chunk_size = positive("chunkSize", v)?;
        }
        if let Some(v) = self.chunk_delay_ms {
            config.chunk_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.max_markers {
            config.max_markers = v;
        }
        if let Some(v) = self.marker_cleanup_threshold {
            config.marker_cleanup_threshold = v;
        }
        if let Some(v) = self.viewport_padding {
            config.viewport_padding = non_negative("viewportPadding", v)?;
        }
        if let Some(v) = self.max_cache_size {
            config.max_cache_size = v;
        }
        if let Some(v) = self.cache_ttl_secs {
            config.cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = self.lazy_load_distance {
            config.lazy_load_distance = non_negative("lazyLoadDistance", v)?;
        }
        if let Some(v) = self.history_limit {
            config.history_limit = v;
        }
        if let Some(v) = self.input_max_length {
            config.security.input_max_length = v;
        }
        if let Some(v) = self.max_requests {
            config.security.max_requests = v;
        }
        if let Some(v) = self.time_window_secs {
            config.security.time_window = Duration::from_secs(v);
        }
        if let Some(v) = self.blocked_duration_secs {
            config.security.blocked_duration = Duration::from_secs(v);
        }
        if let Some(v) = self.max_violations {
            config.security.max_violations = v;
        }
        for host in self.allowed_hosts.unwrap_or_default() {
            config.security = config.security.allow_host(&host);
        }

        Ok(config)
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn non_negative(key: &str, value: f64) -> Result<f64, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration key
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// Malformed configuration file
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// I/O error reading the configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "HOSPITAL_MAP_CHUNK_SIZE",
        "HOSPITAL_MAP_CHUNK_DELAY_MS",
        "HOSPITAL_MAP_MAX_MARKERS",
        "HOSPITAL_MAP_MARKER_CLEANUP_THRESHOLD",
        "HOSPITAL_MAP_VIEWPORT_PADDING",
        "HOSPITAL_MAP_MAX_CACHE_SIZE",
        "HOSPITAL_MAP_CACHE_TTL_SECS",
        "HOSPITAL_MAP_LAZY_LOAD_DISTANCE",
        "HOSPITAL_MAP_HISTORY_LIMIT",
        "HOSPITAL_MAP_INPUT_MAX_LENGTH",
        "HOSPITAL_MAP_MAX_REQUESTS",
        "HOSPITAL_MAP_TIME_WINDOW_SECS",
    ];

    #[test]
    fn test_default_config() {
        let config = MapConfig::default();
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.chunk_delay, Duration::from_millis(10));
        assert_eq!(config.max_markers, 5000);
        assert_eq!(config.marker_cleanup_threshold, 1000);
        assert_eq!(config.max_cache_size, 100);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.lazy_load_distance, 200.0);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.security.max_requests, 100);
    }

    #[test]
    fn test_builder_methods() {
        let config = MapConfig::default()
            .with_chunk_size(20)
            .with_chunk_delay(Duration::ZERO)
            .with_max_markers(300)
            .with_marker_cleanup_threshold(100)
            .with_viewport_padding(0.25)
            .with_max_cache_size(5)
            .with_cache_ttl(Duration::from_secs(1))
            .with_lazy_load_distance(50.0)
            .with_history_limit(3);

        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.chunk_delay, Duration::ZERO);
        assert_eq!(config.max_markers, 300);
        assert_eq!(config.marker_cleanup_threshold, 100);
        assert_eq!(config.viewport_padding, 0.25);
        assert_eq!(config.max_cache_size, 5);
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert_eq!(config.lazy_load_distance, 50.0);
        assert_eq!(config.history_limit, 3);
    }

    #[test]
    fn test_chunk_size_never_zero() {
        assert_eq!(MapConfig::default().with_chunk_size(0).chunk_size, 1);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }

        env::set_var("HOSPITAL_MAP_CHUNK_SIZE", "25");
        env::set_var("HOSPITAL_MAP_CHUNK_DELAY_MS", "0");
        env::set_var("HOSPITAL_MAP_VIEWPORT_PADDING", "0.1");
        env::set_var("HOSPITAL_MAP_MAX_REQUESTS", "7");

        let config = MapConfig::from_env().unwrap();
        assert_eq!(config.chunk_size, 25);
        assert_eq!(config.chunk_delay, Duration::ZERO);
        assert_eq!(config.viewport_padding, 0.1);
        assert_eq!(config.security.max_requests, 7);
        assert_eq!(config.max_markers, MAX_MARKERS); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }

        env::set_var("HOSPITAL_MAP_MAX_MARKERS", "lots");
        assert!(matches!(
            MapConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "HOSPITAL_MAP_MAX_MARKERS"
        ));

        env::remove_var("HOSPITAL_MAP_MAX_MARKERS");
        env::set_var("HOSPITAL_MAP_CHUNK_SIZE", "0");
        assert!(MapConfig::from_env().is_err());

        env::remove_var("HOSPITAL_MAP_CHUNK_SIZE");
        env::set_var("HOSPITAL_MAP_VIEWPORT_PADDING", "-1");
        assert!(MapConfig::from_env().is_err());
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_from_json() {
        let config = MapConfig::from_json(
            r#"{
                "chunkSize": 10,
                "cacheTtlSecs": 60,
                "maxViolations": 2,
                "allowedHosts": ["CHU-Example.fr"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.security.max_violations, 2);
        assert!(config.security.allowed_hosts.contains(&"chu-example.fr".to_string()));
        assert_eq!(config.max_markers, MAX_MARKERS);
    }

    #[test]
    fn test_from_json_rejects_unknown_and_invalid() {
        assert!(matches!(
            MapConfig::from_json(r#"{"chunkSize": "big"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MapConfig::from_json(r#"{"colour": "red"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MapConfig::from_json(r#"{"viewportPadding": -0.5}"#),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(&path, r#"{"maxCacheSize": 12}"#).unwrap();

        let config = MapConfig::from_file(&path).unwrap();
        assert_eq!(config.max_cache_size, 12);

        assert!(matches!(
            MapConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
