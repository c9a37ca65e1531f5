//! Hospital Map Cache Library
//!
//! Thumbnail caching for map markers and popups: a bounded, TTL-based image
//! cache with FIFO eviction, scoped handles that release their local URLs,
//! an intersection-gated lazy loader, and the retry schedule for base map
//! tiles.

pub mod handle;
pub mod image_cache;
pub mod lazy;
pub mod retry;
pub mod tiles;

pub use handle::{ImageHandle, InMemoryUrlRegistry, ObjectUrlRegistry};
pub use image_cache::{CacheStats, ImageCache, ImageError, ImageFetcher};
pub use lazy::{LazyImageLoader, LoadEvent, LoadState, Rect, DEFAULT_IMAGE};
pub use retry::RetryPolicy;
pub use tiles::{TileImage, TileLoader};
