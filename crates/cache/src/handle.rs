//! Locally addressable image handles
//!
//! Fetched image bytes are registered with an [`ObjectUrlRegistry`], which
//! hands back a local URL the renderer can point an image element at. Those
//! URLs hold memory until revoked, so every one is owned by an
//! [`ImageHandle`] and revoked when the last clone of the handle drops.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Creates and revokes local URLs for in-memory image data
pub trait ObjectUrlRegistry: Send + Sync {
    /// Register `bytes` and return a local URL for them
    fn create(&self, bytes: &[u8]) -> String;

    /// Release the data behind `url`
    fn revoke(&self, url: &str);
}

/// Registry that only tracks which URLs are live.
///
/// Used headless and in tests to verify that nothing leaks.
#[derive(Default)]
pub struct InMemoryUrlRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<String>>,
}

impl InMemoryUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URLs created and not yet revoked
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Whether `url` is still live
    pub fn is_live(&self, url: &str) -> bool {
        self.live.lock().unwrap().contains(url)
    }
}

impl ObjectUrlRegistry for InMemoryUrlRegistry {
    fn create(&self, bytes: &[u8]) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("blob:hospital-map/{id}-{}", bytes.len());
        self.live.lock().unwrap().insert(url.clone());
        url
    }

    fn revoke(&self, url: &str) {
        self.live.lock().unwrap().remove(url);
    }
}

struct HandleInner {
    local_url: String,
    source_url: String,
    size: usize,
    registry: Arc<dyn ObjectUrlRegistry>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        tracing::trace!(source = %self.source_url, "revoking image url");
        self.registry.revoke(&self.local_url);
    }
}

/// Shared ownership of a registered image.
///
/// Cloning is cheap. The local URL stays valid while any clone is alive.
#[derive(Clone)]
pub struct ImageHandle {
    inner: Arc<HandleInner>,
}

impl ImageHandle {
    /// Register `bytes` fetched from `source_url`
    pub fn register(registry: Arc<dyn ObjectUrlRegistry>, source_url: &str, bytes: &[u8]) -> Self {
        let local_url = registry.create(bytes);
        Self {
            inner: Arc::new(HandleInner {
                local_url,
                source_url: source_url.to_string(),
                size: bytes.len(),
                registry,
            }),
        }
    }

    /// Local URL usable as an image source
    pub fn local_url(&self) -> &str {
        &self.inner.local_url
    }

    /// Remote URL the bytes came from
    pub fn source_url(&self) -> &str {
        &self.inner.source_url
    }

    /// Size of the image data in bytes
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether two handles refer to the same registration
    pub fn ptr_eq(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("local_url", &self.inner.local_url)
            .field("source_url", &self.inner.source_url)
            .field("size", &self.inner.size)
            .finish()
    }
}
