//! Map backend capability set
//!
//! The engine never talks to a mapping library directly. A host adapter
//! implements [`MapBackend`] on top of whatever map and clustering library
//! it uses, and forwards `click`, `zoomend` and `moveend` events to the
//! engine.

use crate::popup::LazyPopup;
use crate::style::MarkerStyle;
use hospital_map_scheduler::GeoBounds;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// Opaque marker identifier issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerHandle(pub u64);

/// Map creation options
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub center: (f64, f64),
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub tile_url: String,
    pub prefer_canvas: bool,
    pub max_cluster_radius: u32,
    pub disable_clustering_at_zoom: u32,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: (20.0, 0.0),
            zoom: hospital_map_core::model::DEFAULT_ZOOM,
            min_zoom: 2.0,
            max_zoom: 18.0,
            tile_url: hospital_map_cache::tiles::DEFAULT_TILE_TEMPLATE.to_string(),
            prefer_canvas: true,
            max_cluster_radius: 50,
            disable_clustering_at_zoom: 15,
        }
    }
}

/// Marker construction parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOptions {
    pub hospital_id: String,
    pub lat: f64,
    pub lon: f64,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("map has not been created")]
    MapNotCreated,

    #[error("unknown marker {0:?}")]
    UnknownMarker(MarkerHandle),

    #[error("backend rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },
}

/// Primitives the engine needs from a map and clustering library
pub trait MapBackend: Send {
    fn create_map(&mut self, options: &MapOptions) -> Result<(), BackendError>;

    fn add_marker_layer(&mut self) -> Result<(), BackendError>;

    fn create_marker(&mut self, options: &MarkerOptions) -> Result<MarkerHandle, BackendError>;

    fn set_marker_style(&mut self, marker: MarkerHandle, style: &MarkerStyle) -> Result<(), BackendError>;

    /// Delete a marker from the map
    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), BackendError>;

    fn bind_popup(&mut self, marker: MarkerHandle, popup: LazyPopup) -> Result<(), BackendError>;

    fn bind_tooltip(&mut self, marker: MarkerHandle, text: String) -> Result<(), BackendError>;

    fn unbind_popup(&mut self, marker: MarkerHandle);

    fn unbind_tooltip(&mut self, marker: MarkerHandle);

    /// Add a batch of markers to the clustering layer
    fn add_to_cluster(&mut self, markers: &[MarkerHandle]) -> Result<(), BackendError>;

    fn remove_from_cluster(&mut self, marker: MarkerHandle);

    /// Remove every marker from the clustering layer and the map
    fn clear_layer(&mut self);

    /// Current visible bounds
    fn viewport(&self) -> GeoBounds;
}

/// Marker as seen by [`RecordingBackend`]
#[derive(Debug)]
pub struct RecordedMarker {
    pub options: MarkerOptions,
    pub popup: Option<LazyPopup>,
    pub tooltip: Option<String>,
    pub clustered: bool,
}

#[derive(Debug, Default)]
struct RecordingState {
    map: Option<MapOptions>,
    layer: bool,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, RecordedMarker>,
    cluster_batches: Vec<usize>,
    viewport: Option<GeoBounds>,
    failing_ids: HashSet<String>,
    clears: usize,
}

/// In-memory backend for headless runs and tests
///
/// Clones share the same state, so a test can keep one clone for
/// inspection while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounds reported by `viewport`
    pub fn set_viewport(&self, bounds: GeoBounds) {
        self.state.lock().unwrap().viewport = Some(bounds);
    }

    /// Make `create_marker` fail for `hospital_id`
    pub fn fail_on(&self, hospital_id: impl Into<String>) {
        self.state.lock().unwrap().failing_ids.insert(hospital_id.into());
    }

    pub fn map_options(&self) -> Option<MapOptions> {
        self.state.lock().unwrap().map.clone()
    }

    pub fn marker_count(&self) -> usize {
        self.state.lock().unwrap().markers.len()
    }

    pub fn clustered_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .markers
            .values()
            .filter(|m| m.clustered)
            .count()
    }

    /// Sizes of each `add_to_cluster` batch, in call order
    pub fn cluster_batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().cluster_batches.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    /// Hospital ids of live markers, in creation order
    pub fn hospital_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .markers
            .values()
            .map(|m| m.options.hospital_id.clone())
            .collect()
    }

    pub fn style_of(&self, hospital_id: &str) -> Option<MarkerStyle> {
        self.state
            .lock()
            .unwrap()
            .markers
            .values()
            .find(|m| m.options.hospital_id == hospital_id)
            .map(|m| m.options.style.clone())
    }

    /// Open the popup of `hospital_id`, returning its HTML
    pub fn open_popup(&self, hospital_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .markers
            .values()
            .find(|m| m.options.hospital_id == hospital_id)
            .and_then(|m| m.popup.as_ref())
            .map(|p| p.html().to_string())
    }

    pub fn tooltip_of(&self, hospital_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .markers
            .values()
            .find(|m| m.options.hospital_id == hospital_id)
            .and_then(|m| m.tooltip.clone())
    }

    /// Number of popups whose HTML has been generated
    pub fn rendered_popups(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .markers
            .values()
            .filter(|m| m.popup.as_ref().is_some_and(|p| p.is_rendered()))
            .count()
    }

    fn with_marker<T>(
        &self,
        marker: MarkerHandle,
        f: impl FnOnce(&mut RecordedMarker) -> T,
    ) -> Result<T, BackendError> {
        let mut state = self.state.lock().unwrap();
        state
            .markers
            .get_mut(&marker)
            .map(f)
            .ok_or(BackendError::UnknownMarker(marker))
    }
}

impl MapBackend for RecordingBackend {
    fn create_map(&mut self, options: &MapOptions) -> Result<(), BackendError> {
        self.state.lock().unwrap().map = Some(options.clone());
        Ok(())
    }

    fn add_marker_layer(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.map.is_none() {
            return Err(BackendError::MapNotCreated);
        }
        state.layer = true;
        Ok(())
    }

    fn create_marker(&mut self, options: &MarkerOptions) -> Result<MarkerHandle, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_ids.contains(&options.hospital_id) {
            return Err(BackendError::Rejected {
                operation: "create_marker".to_string(),
                reason: format!("refused {}", options.hospital_id),
            });
        }

        state.next_handle += 1;
        let handle = MarkerHandle(state.next_handle);
        state.markers.insert(
            handle,
            RecordedMarker {
                options: options.clone(),
                popup: None,
                tooltip: None,
                clustered: false,
            },
        );
        Ok(handle)
    }

    fn set_marker_style(&mut self, marker: MarkerHandle, style: &MarkerStyle) -> Result<(), BackendError> {
        self.with_marker(marker, |m| m.options.style = style.clone())
    }

    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), BackendError> {
        self.state
            .lock()
            .unwrap()
            .markers
            .remove(&marker)
            .map(|_| ())
            .ok_or(BackendError::UnknownMarker(marker))
    }

    fn bind_popup(&mut self, marker: MarkerHandle, popup: LazyPopup) -> Result<(), BackendError> {
        self.with_marker(marker, |m| m.popup = Some(popup))
    }

    fn bind_tooltip(&mut self, marker: MarkerHandle, text: String) -> Result<(), BackendError> {
        self.with_marker(marker, |m| m.tooltip = Some(text))
    }

    fn unbind_popup(&mut self, marker: MarkerHandle) {
        let _ = self.with_marker(marker, |m| m.popup = None);
    }

    fn unbind_tooltip(&mut self, marker: MarkerHandle) {
        let _ = self.with_marker(marker, |m| m.tooltip = None);
    }

    fn add_to_cluster(&mut self, markers: &[MarkerHandle]) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if !state.layer {
            return Err(BackendError::MapNotCreated);
        }
        for handle in markers {
            if let Some(m) = state.markers.get_mut(handle) {
                m.clustered = true;
            }
        }
        state.cluster_batches.push(markers.len());
        Ok(())
    }

    fn remove_from_cluster(&mut self, marker: MarkerHandle) {
        let _ = self.with_marker(marker, |m| m.clustered = false);
    }

    fn clear_layer(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.markers.clear();
        state.clears += 1;
    }

    fn viewport(&self) -> GeoBounds {
        self.state.lock().unwrap().viewport.unwrap_or_default()
    }
}
