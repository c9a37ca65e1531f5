//! Intersection-gated image loading
//!
//! Image elements register their screen rectangle with [`LazyImageLoader`].
//! Nothing is fetched until the host reports an intersection pass and the
//! element lies within the loading margin around the viewport. An element
//! whose load fails switches to the default image and is never retried.

use crate::handle::ImageHandle;
use crate::image_cache::{ImageCache, ImageError};
use std::collections::BTreeMap;

/// Default margin in pixels around the viewport
pub const LAZY_LOAD_DISTANCE: f64 = 200.0;

/// Placeholder shown when an image fails to load
pub const DEFAULT_IMAGE: &str = "/images/default-hospital.svg";

/// Screen-space rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Grow the rectangle by `margin` on every side
    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Whether the two rectangles overlap (touching edges count)
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }
}

/// Load state of an observed element
#[derive(Debug, Clone)]
pub enum LoadState {
    /// Waiting to come into range
    Pending,

    /// Loaded; the element shows the handle's local URL
    Loaded(ImageHandle),

    /// Load failed; the element shows [`DEFAULT_IMAGE`]
    Error,
}

/// Outcome of one element load during an intersection pass
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Loaded { element: String, local_url: String },
    Failed { element: String, error: ImageError },
}

#[derive(Debug)]
struct Observed {
    url: String,
    rect: Rect,
    state: LoadState,
}

/// Lazily loads observed image elements as they approach the viewport.
pub struct LazyImageLoader {
    cache: ImageCache,
    margin: f64,
    default_image: String,
    elements: BTreeMap<String, Observed>,
}

impl LazyImageLoader {
    /// Create a loader with the default margin
    pub fn new(cache: ImageCache) -> Self {
        Self::with_margin(cache, LAZY_LOAD_DISTANCE)
    }

    /// Create a loader that starts loading `margin` pixels before an
    /// element becomes visible
    pub fn with_margin(cache: ImageCache, margin: f64) -> Self {
        Self {
            cache,
            margin,
            default_image: DEFAULT_IMAGE.to_string(),
            elements: BTreeMap::new(),
        }
    }

    /// Use a different placeholder image
    pub fn with_default_image(mut self, src: impl Into<String>) -> Self {
        self.default_image = src.into();
        self
    }

    /// Start observing `element`, which displays `url` at `rect`.
    ///
    /// Re-observing an element with a new URL resets it to pending.
    pub fn observe(&mut self, element: impl Into<String>, url: impl Into<String>, rect: Rect) {
        let element = element.into();
        let url = url.into();

        match self.elements.get_mut(&element) {
            Some(observed) if observed.url == url => observed.rect = rect,
            _ => {
                self.elements.insert(
                    element,
                    Observed {
                        url,
                        rect,
                        state: LoadState::Pending,
                    },
                );
            }
        }
    }

    /// Move an observed element
    pub fn update_rect(&mut self, element: &str, rect: Rect) {
        if let Some(observed) = self.elements.get_mut(element) {
            observed.rect = rect;
        }
    }

    /// Stop observing `element`, releasing its image
    pub fn unobserve(&mut self, element: &str) -> bool {
        self.elements.remove(element).is_some()
    }

    /// Run an intersection pass against `viewport`.
    ///
    /// Every pending element within the margin is loaded through the cache.
    /// Loaded and failed elements are skipped.
    pub fn on_intersection(&mut self, viewport: Rect) -> Vec<LoadEvent> {
        let range = viewport.expand(self.margin);
        let mut events = Vec::new();

        for (element, observed) in self.elements.iter_mut() {
            if !matches!(observed.state, LoadState::Pending) || !observed.rect.intersects(&range) {
                continue;
            }

            match self.cache.load_image(&observed.url) {
                Ok(handle) => {
                    events.push(LoadEvent::Loaded {
                        element: element.clone(),
                        local_url: handle.local_url().to_string(),
                    });
                    observed.state = LoadState::Loaded(handle);
                }
                Err(error) => {
                    tracing::warn!(element = %element, url = %observed.url, error = %error, "image load failed, using placeholder");
                    events.push(LoadEvent::Failed {
                        element: element.clone(),
                        error,
                    });
                    observed.state = LoadState::Error;
                }
            }
        }

        events
    }

    /// Current state of `element`
    pub fn state(&self, element: &str) -> Option<&LoadState> {
        self.elements.get(element).map(|o| &o.state)
    }

    /// Source the element should display: the local URL once loaded, the
    /// default image after a failure, `None` while pending
    pub fn src(&self, element: &str) -> Option<&str> {
        match &self.elements.get(element)?.state {
            LoadState::Pending => None,
            LoadState::Loaded(handle) => Some(handle.local_url()),
            LoadState::Error => Some(&self.default_image),
        }
    }

    /// Number of elements still waiting to load
    pub fn pending(&self) -> usize {
        self.elements
            .values()
            .filter(|o| matches!(o.state, LoadState::Pending))
            .count()
    }

    /// Number of observed elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
