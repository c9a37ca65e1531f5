//! Bounded image cache with TTL and FIFO eviction
//!
//! Marker and popup thumbnails are cached by URL. Entries expire after a
//! fixed TTL and, once the cache is full, the oldest-inserted entry is
//! evicted to make room. Eviction drops the entry's [`ImageHandle`], which
//! revokes its local URL once no element still uses it.

use crate::handle::{ImageHandle, ObjectUrlRegistry};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default maximum number of cached images
pub const MAX_CACHE_SIZE: usize = 100;

/// Default lifetime of a cached image (1 hour)
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Fetches raw image bytes
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        self(url)
    }
}

/// Image loading errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("empty image data from {url}")]
    Empty { url: String },
}

impl ImageError {
    /// URL the error is about
    pub fn url(&self) -> &str {
        match self {
            ImageError::Fetch { url, .. } | ImageError::Empty { url } => url,
        }
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of images currently cached
    pub entries: usize,

    /// Total bytes held by cached images
    pub bytes: usize,

    /// Maximum entries allowed
    pub max_entries: usize,

    /// Fresh hits served from the cache
    pub hits: u64,

    /// Misses and stale hits that went to the fetcher
    pub misses: u64,

    /// Entries removed to make room
    pub evictions: u64,

    /// Entries dropped because they outlived the TTL
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    handle: ImageHandle,
    inserted_at: Instant,
    size: usize,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,

    /// Insertion order, oldest at front
    insertion_order: VecDeque<String>,

    bytes: usize,
    stats: CacheStats,
}

impl CacheState {
    fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(url)?;
        self.insertion_order.retain(|u| u != url);
        self.bytes = self.bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheEntry> {
        let url = self.insertion_order.pop_front()?;
        let entry = self.entries.remove(&url)?;
        self.bytes = self.bytes.saturating_sub(entry.size);
        self.stats.evictions += 1;
        tracing::debug!(url = %url, size = entry.size, "image evicted");
        Some(entry)
    }

    fn sync_stats(&mut self) {
        self.stats.entries = self.entries.len();
        self.stats.bytes = self.bytes;
    }
}

/// Lazy, bounded, TTL-based image cache.
///
/// Clones share the same entries.
///
/// # Example
///
/// ```
/// use hospital_map_cache::{ImageCache, InMemoryUrlRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(InMemoryUrlRegistry::new());
/// let fetcher = |_url: &str| -> Result<Vec<u8>, String> { Ok(vec![0u8; 64]) };
/// let cache = ImageCache::new(Arc::new(fetcher), registry.clone());
///
/// let handle = cache.load_image("https://example.com/a.png").unwrap();
/// assert!(handle.local_url().starts_with("blob:"));
///
/// // Second load is served from the cache
/// let again = cache.load_image("https://example.com/a.png").unwrap();
/// assert!(handle.ptr_eq(&again));
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Clone)]
pub struct ImageCache {
    state: Arc<Mutex<CacheState>>,
    fetcher: Arc<dyn ImageFetcher>,
    registry: Arc<dyn ObjectUrlRegistry>,
    max_entries: usize,
    ttl: Duration,
}

impl ImageCache {
    /// Create a cache with the default size and TTL
    pub fn new(fetcher: Arc<dyn ImageFetcher>, registry: Arc<dyn ObjectUrlRegistry>) -> Self {
        Self::with_limits(fetcher, registry, MAX_CACHE_SIZE, CACHE_TTL)
    }

    /// Create a cache holding at most `max_entries` images for `ttl` each
    pub fn with_limits(
        fetcher: Arc<dyn ImageFetcher>,
        registry: Arc<dyn ObjectUrlRegistry>,
        max_entries: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                bytes: 0,
                stats: CacheStats {
                    max_entries,
                    ..Default::default()
                },
            })),
            fetcher,
            registry,
            max_entries,
            ttl,
        }
    }

    /// Load an image at the current time
    pub fn load_image(&self, url: &str) -> Result<ImageHandle, ImageError> {
        self.load_image_at(url, Instant::now())
    }

    /// Load an image, treating `now` as the current time.
    ///
    /// A hit younger than the TTL is returned directly. A miss or stale hit
    /// fetches the bytes, registers a new handle and caches it, evicting the
    /// oldest entry first when the cache is full.
    pub fn load_image_at(&self, url: &str, now: Instant) -> Result<ImageHandle, ImageError> {
        let stale = {
            let mut state = self.state.lock().unwrap();
            let fresh = state
                .entries
                .get(url)
                .filter(|entry| now.saturating_duration_since(entry.inserted_at) < self.ttl)
                .map(|entry| entry.handle.clone());

            if let Some(handle) = fresh {
                state.stats.hits += 1;
                return Ok(handle);
            }

            state.stats.misses += 1;
            let stale = state.remove(url);
            if stale.is_some() {
                state.stats.expirations += 1;
            }
            state.sync_stats();
            stale
        };
        // Release the expired handle outside the lock
        drop(stale);

        let bytes = self.fetcher.fetch(url).map_err(|reason| {
            tracing::warn!(url, reason = %reason, "image fetch failed");
            ImageError::Fetch {
                url: url.to_string(),
                reason,
            }
        })?;
        if bytes.is_empty() {
            return Err(ImageError::Empty {
                url: url.to_string(),
            });
        }

        let handle = ImageHandle::register(self.registry.clone(), url, &bytes);
        if self.max_entries == 0 {
            return Ok(handle);
        }

        let evicted = {
            let mut state = self.state.lock().unwrap();
            // A concurrent load may have inserted the same URL meanwhile
            let replaced = state.remove(url);

            let mut evicted = Vec::new();
            while state.entries.len() >= self.max_entries {
                match state.evict_oldest() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }

            state.entries.insert(
                url.to_string(),
                CacheEntry {
                    handle: handle.clone(),
                    inserted_at: now,
                    size: bytes.len(),
                },
            );
            state.insertion_order.push_back(url.to_string());
            state.bytes += bytes.len();
            state.sync_stats();

            evicted.extend(replaced);
            evicted
        };
        drop(evicted);

        Ok(handle)
    }

    /// Whether `url` is cached (fresh or not), without touching stats
    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(url)
    }

    /// Remove one entry
    pub fn remove(&self, url: &str) -> bool {
        let removed = {
            let mut state = self.state.lock().unwrap();
            let removed = state.remove(url);
            state.sync_stats();
            removed
        };
        removed.is_some()
    }

    /// Drop every entry, releasing their handles
    pub fn clear(&self) {
        let entries = {
            let mut state = self.state.lock().unwrap();
            state.insertion_order.clear();
            state.bytes = 0;
            let entries: Vec<CacheEntry> = state.entries.drain().map(|(_, e)| e).collect();
            state.sync_stats();
            entries
        };
        tracing::debug!(released = entries.len(), "image cache cleared");
        drop(entries);
    }

    /// Number of cached images
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs in insertion order, oldest first
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().insertion_order.iter().cloned().collect()
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.state.lock().unwrap().stats
    }
}
