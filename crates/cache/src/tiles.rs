//! Base map tile loading
//!
//! Tiles come from the configured tile hosts only. A failed tile is retried
//! per the [`RetryPolicy`]; once retries run out the placeholder is shown.

use crate::image_cache::ImageFetcher;
use crate::retry::RetryPolicy;
use hospital_map_security::SecurityGate;
use std::sync::Arc;
use std::time::Duration;

/// Tile template, `{z}/{x}/{y}` substituted per tile
pub const DEFAULT_TILE_TEMPLATE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// What the map should paint for a tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileImage {
    Loaded(Vec<u8>),
    Placeholder,
}

/// Loads base map tiles with bounded retries.
pub struct TileLoader {
    fetcher: Arc<dyn ImageFetcher>,
    gate: Arc<SecurityGate>,
    policy: RetryPolicy,
    template: String,
    sleep: Box<dyn Fn(Duration) + Send + Sync>,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, gate: Arc<SecurityGate>) -> Self {
        Self {
            fetcher,
            gate,
            policy: RetryPolicy::default(),
            template: DEFAULT_TILE_TEMPLATE.to_string(),
            sleep: Box::new(std::thread::sleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Replace the blocking sleep between retries
    pub fn with_sleep<S>(mut self, sleep: S) -> Self
    where
        S: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleep = Box::new(sleep);
        self
    }

    /// URL for tile `(z, x, y)`
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    /// Load tile `(z, x, y)`, falling back to the placeholder
    pub fn load(&self, z: u8, x: u32, y: u32) -> TileImage {
        let url = self.tile_url(z, x, y);
        if !self.gate.validate_url(&url) {
            tracing::warn!(url = %url, "tile host not allowed");
            return TileImage::Placeholder;
        }

        let result = self.policy.run(|_| self.fetcher.fetch(&url), |delay| (self.sleep)(delay));
        match result {
            Ok(bytes) if !bytes.is_empty() => TileImage::Loaded(bytes),
            Ok(_) => TileImage::Placeholder,
            Err(reason) => {
                tracing::warn!(url = %url, reason = %reason, "tile failed, showing placeholder");
                TileImage::Placeholder
            }
        }
    }
}
