//! Hospital Map Render Library
//!
//! Turns the filtered hospital list into clustered map markers without
//! blocking the host: records are validated, scheduled visible-first in
//! fixed-size chunks and painted through a [`MapBackend`] adapter. Markers
//! far outside the viewport are evicted once the working set grows large.
//!
//! # Example
//!
//! ```
//! use hospital_map_core::{ErrorHandler, Hospital, MapConfig, Status};
//! use hospital_map_render::{MapOptions, RecordingBackend, RenderEngine};
//! use hospital_map_security::SecurityGate;
//! use std::sync::Arc;
//!
//! let backend = RecordingBackend::new();
//! let mut engine = RenderEngine::new(
//!     backend.clone(),
//!     MapConfig::default(),
//!     Arc::new(SecurityGate::default()),
//!     ErrorHandler::new(),
//! );
//! engine.create_map(&MapOptions::default()).unwrap();
//!
//! let hospitals = vec![Hospital::new("1", 48.85, 2.35, Status::Deployed, "Necker", "Paris, France")];
//! engine.rebuild(&hospitals);
//! engine.flush();
//! assert_eq!(backend.marker_count(), 1);
//! ```

pub mod backend;
pub mod engine;
pub mod eviction;
pub mod popup;
pub mod session;
pub mod style;

pub use backend::{BackendError, MapBackend, MapOptions, MarkerHandle, MarkerOptions, RecordedMarker, RecordingBackend};
pub use engine::{MarkerRef, RenderEngine, RenderStats};
pub use eviction::plan_eviction;
pub use popup::{tooltip_text, LazyPopup, PopupContext};
pub use session::MapSession;
pub use style::{status_color, MarkerStyle};
