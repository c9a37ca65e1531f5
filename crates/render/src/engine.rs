//! Marker rendering pipeline
//!
//! A rebuild validates the filtered hospitals, splits them into hospitals
//! inside and outside the current viewport, trims the set to the marker
//! budget and queues fixed-size chunks. The host then drains the queue:
//! visible chunks on animation frames (at most one per `chunk_delay`),
//! deferred chunks from idle callbacks. Each chunk creates its markers,
//! binds lazy popups and tooltips, and hands the batch to the clustering
//! layer.
//!
//! A rebuild bumps the generation; chunks from an older generation are
//! discarded rather than painted.
//!
//! Eviction only removes markers. When the view settles, hospitals from the
//! current set that are back inside the padded viewport and have no marker
//! are queued again as visible chunks.

use crate::backend::{BackendError, MapBackend, MapOptions, MarkerHandle, MarkerOptions};
use crate::eviction::plan_eviction;
use crate::popup::{tooltip_text, LazyPopup, PopupContext};
use crate::style::MarkerStyle;
use hospital_map_cache::ImageCache;
use hospital_map_core::{ErrorHandler, Hospital, MapConfig, MapError, Translations};
use hospital_map_scheduler::{
    Chunk, ChunkPriority, ChunkQueue, ChunkedOperation, FrameBudget, Generation, GenerationCounter,
};
use hospital_map_security::SecurityGate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// A live marker and the hospital it shows
#[derive(Debug, Clone)]
pub struct MarkerRef {
    pub hospital: Hospital,
    pub handle: MarkerHandle,
}

/// Counters since the engine was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    pub rebuilds: usize,
    pub chunks_processed: usize,
    pub markers_created: usize,
    pub markers_failed: usize,
    pub dropped_invalid: usize,
    pub dropped_over_budget: usize,
    pub evicted: usize,
    pub restored: usize,
    pub stale_chunks_discarded: usize,
}

/// Check a record before it may become a marker
fn validate_record(hospital: &Hospital, gate: &SecurityGate) -> Result<(), MapError> {
    if hospital.id.trim().is_empty() {
        return Err(MapError::validation("<missing>", "empty id"));
    }
    if !gate.validate_coordinates(hospital.lat, hospital.lon) {
        return Err(MapError::validation(
            &hospital.id,
            format!("coordinates out of range ({}, {})", hospital.lat, hospital.lon),
        ));
    }
    if hospital.name.trim().is_empty() {
        return Err(MapError::validation(&hospital.id, "empty name"));
    }
    Ok(())
}

/// Drives marker creation and eviction against a [`MapBackend`]
pub struct RenderEngine<B: MapBackend> {
    backend: B,
    config: MapConfig,
    gate: Arc<SecurityGate>,
    errors: ErrorHandler,
    popup_context: Arc<PopupContext>,
    queue: ChunkQueue<Hospital>,
    generations: GenerationCounter,
    markers: HashMap<String, MarkerRef>,
    /// Validated, in-budget hospitals of the current generation
    scheduled: Vec<Hospital>,
    queued: HashSet<String>,
    selected: Option<String>,
    last_chunk_at: Option<Instant>,
    progress: ChunkedOperation,
    stats: RenderStats,
}

impl<B: MapBackend> RenderEngine<B> {
    pub fn new(backend: B, config: MapConfig, gate: Arc<SecurityGate>, errors: ErrorHandler) -> Self {
        let popup_context = Arc::new(PopupContext::new(Arc::clone(&gate), errors.clone()));
        Self {
            backend,
            config,
            gate,
            errors,
            popup_context,
            queue: ChunkQueue::new(),
            generations: GenerationCounter::new(),
            markers: HashMap::new(),
            scheduled: Vec::new(),
            queued: HashSet::new(),
            selected: None,
            last_chunk_at: None,
            progress: ChunkedOperation::default(),
            stats: RenderStats::default(),
        }
    }

    pub fn with_translations(mut self, translations: Arc<Translations>) -> Self {
        Arc::make_mut(&mut self.popup_context).translations = translations;
        self
    }

    /// Load popup thumbnails through `cache`
    pub fn with_image_cache(mut self, cache: ImageCache) -> Self {
        Arc::make_mut(&mut self.popup_context).images = Some(cache);
        self
    }

    /// Language for popups created from now on
    pub fn set_language(&mut self, language: &str) {
        if self.popup_context.language != language {
            Arc::make_mut(&mut self.popup_context).language = language.to_string();
        }
    }

    pub fn language(&self) -> &str {
        &self.popup_context.language
    }

    /// Create the map and its clustering layer
    pub fn create_map(&mut self, options: &MapOptions) -> Result<(), BackendError> {
        self.backend.create_map(options)?;
        self.backend.add_marker_layer()?;
        tracing::info!(zoom = options.zoom, "map created");
        Ok(())
    }

    /// Replace every marker with markers for `hospitals`.
    ///
    /// Clears the layer and the marker map, then queues chunks for the new
    /// set. Returns the new generation.
    pub fn rebuild(&mut self, hospitals: &[Hospital]) -> Generation {
        let generation = self.generations.bump();
        let stale = self.queue.remove_if(|c| c.generation != generation);
        self.stats.stale_chunks_discarded += stale;

        self.backend.clear_layer();
        self.markers.clear();
        self.queued.clear();
        self.last_chunk_at = None;
        self.stats.rebuilds += 1;

        let viewport = self.backend.viewport();
        let mut visible = Vec::new();
        let mut deferred = Vec::new();
        for hospital in hospitals {
            if let Err(e) = validate_record(hospital, &self.gate) {
                self.errors.handle(&e);
                self.stats.dropped_invalid += 1;
                continue;
            }
            if viewport.contains(hospital.lat, hospital.lon) {
                visible.push(hospital.clone());
            } else {
                deferred.push(hospital.clone());
            }
        }

        let budget = self.config.max_markers;
        let over_budget = (visible.len() + deferred.len()).saturating_sub(budget);
        visible.truncate(budget);
        deferred.truncate(budget - visible.len());
        self.stats.dropped_over_budget += over_budget;
        if over_budget > 0 {
            tracing::warn!(dropped = over_budget, max_markers = budget, "marker budget exceeded");
        }

        let chunk_size = self.config.chunk_size.max(1);
        self.progress = ChunkedOperation::new(visible.len() + deferred.len(), chunk_size);
        for chunk in visible.chunks(chunk_size) {
            self.queue.push(ChunkPriority::Visible, generation, chunk.to_vec());
        }
        for chunk in deferred.chunks(chunk_size) {
            self.queue.push(ChunkPriority::Deferred, generation, chunk.to_vec());
        }
        self.queued = visible.iter().chain(&deferred).map(|h| h.id.clone()).collect();
        self.scheduled = visible.iter().chain(&deferred).cloned().collect();

        tracing::info!(
            generation,
            visible = visible.len(),
            deferred = deferred.len(),
            chunks = self.queue.len(),
            "markers scheduled"
        );
        generation
    }

    /// Animation frame callback: process one visible chunk if the
    /// inter-chunk delay has passed. Returns the number of markers created.
    pub fn on_animation_frame(&mut self, now: Instant) -> usize {
        if let Some(last) = self.last_chunk_at {
            if now.saturating_duration_since(last) < self.config.chunk_delay {
                return 0;
            }
        }
        let Some(chunk) = self.queue.pop_priority(ChunkPriority::Visible) else {
            return 0;
        };

        self.last_chunk_at = Some(now);
        let created = self.process_chunk(chunk);
        self.progress.complete_frame();
        created
    }

    /// Idle callback: process deferred chunks until the idle budget runs
    /// out. Deferred work waits until every visible chunk is done.
    pub fn on_idle(&mut self, now: Instant) -> usize {
        let mut budget = FrameBudget::for_idle(now);
        let mut created = 0;
        while let Some(chunk) = self.queue.pop_priority(ChunkPriority::Deferred) {
            created += self.process_chunk(chunk);
            if budget.should_yield() {
                break;
            }
        }
        if created > 0 {
            self.progress.complete_frame();
        }
        created
    }

    /// Drain every queued chunk immediately
    pub fn flush(&mut self) -> usize {
        let mut created = 0;
        while let Some(chunk) = self.queue.pop() {
            created += self.process_chunk(chunk);
        }
        created
    }

    fn process_chunk(&mut self, chunk: Chunk<Hospital>) -> usize {
        if self.generations.is_stale(chunk.generation) {
            tracing::debug!(chunk = chunk.id, generation = chunk.generation, "discarding stale chunk");
            self.stats.stale_chunks_discarded += 1;
            return 0;
        }

        let len = chunk.len();
        let mut handles = Vec::with_capacity(len);
        for hospital in chunk.items {
            self.queued.remove(&hospital.id);
            if self.markers.contains_key(&hospital.id) {
                continue;
            }
            if self.markers.len() >= self.config.max_markers {
                self.stats.dropped_over_budget += 1;
                continue;
            }

            match self.create_marker(&hospital) {
                Ok(handle) => {
                    handles.push(handle);
                    self.markers.insert(hospital.id.clone(), MarkerRef { hospital, handle });
                }
                Err(e) => {
                    tracing::warn!(hospital = %hospital.id, error = %e, "marker creation failed");
                    self.stats.markers_failed += 1;
                }
            }
        }

        if !handles.is_empty() {
            if let Err(e) = self.backend.add_to_cluster(&handles) {
                tracing::error!(chunk = chunk.id, error = %e, "adding chunk to cluster layer failed");
            }
        }

        self.stats.markers_created += handles.len();
        self.stats.chunks_processed += 1;
        self.progress.advance(len);
        tracing::debug!(
            chunk = chunk.id,
            priority = chunk.priority.as_str(),
            created = handles.len(),
            remaining = self.progress.remaining(),
            "chunk processed"
        );
        handles.len()
    }

    fn create_marker(&mut self, hospital: &Hospital) -> Result<MarkerHandle, BackendError> {
        let active = self.selected.as_deref() == Some(hospital.id.as_str());
        let options = MarkerOptions {
            hospital_id: hospital.id.clone(),
            lat: hospital.lat,
            lon: hospital.lon,
            style: MarkerStyle::for_status(hospital.status, active),
        };

        let handle = self.backend.create_marker(&options)?;
        let popup = LazyPopup::new(hospital.clone(), Arc::clone(&self.popup_context));
        let bound = self
            .backend
            .bind_popup(handle, popup)
            .and_then(|_| self.backend.bind_tooltip(handle, tooltip_text(hospital, &self.gate)));

        if let Err(e) = bound {
            let _ = self.backend.remove_marker(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// Highlight `id`, restoring the previous selection's style
    pub fn select_hospital(&mut self, id: Option<&str>) {
        let next = id.map(str::to_string);
        if next == self.selected {
            return;
        }
        let previous = std::mem::replace(&mut self.selected, next);

        let affected: Vec<String> = previous.into_iter().chain(self.selected.clone()).collect();
        for id in affected {
            self.restyle(&id);
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn restyle(&mut self, id: &str) {
        let Some(marker) = self.markers.get(id) else {
            return;
        };
        let active = self.selected.as_deref() == Some(id);
        let style = MarkerStyle::for_status(marker.hospital.status, active);
        if let Err(e) = self.backend.set_marker_style(marker.handle, &style) {
            tracing::warn!(hospital = %id, error = %e, "restyle failed");
        }
    }

    /// Hospital id behind a clicked marker
    pub fn on_marker_click(&self, handle: MarkerHandle) -> Option<String> {
        self.markers
            .values()
            .find(|m| m.handle == handle)
            .map(|m| m.hospital.id.clone())
    }

    /// Zoom settled; returns the number of markers evicted
    pub fn on_zoom_end(&mut self, zoom: f64) -> usize {
        tracing::debug!(zoom, markers = self.markers.len(), "zoom end");
        self.view_settled()
    }

    /// Pan settled; returns the number of markers evicted
    pub fn on_move_end(&mut self) -> usize {
        self.view_settled()
    }

    fn view_settled(&mut self) -> usize {
        let evicted = self.evict_offscreen();
        self.restore_onscreen();
        evicted
    }

    /// Queue hospitals of the current set that are inside the padded
    /// viewport but have neither a marker nor a pending chunk.
    fn restore_onscreen(&mut self) -> usize {
        let keep = self.backend.viewport().pad(self.config.viewport_padding);
        let missing: Vec<Hospital> = self
            .scheduled
            .iter()
            .filter(|h| keep.contains(h.lat, h.lon))
            .filter(|h| !self.markers.contains_key(&h.id) && !self.queued.contains(&h.id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return 0;
        }

        let generation = self.generations.current();
        let chunk_size = self.config.chunk_size.max(1);
        for chunk in missing.chunks(chunk_size) {
            self.queue.push(ChunkPriority::Visible, generation, chunk.to_vec());
        }
        self.queued.extend(missing.iter().map(|h| h.id.clone()));
        self.stats.restored += missing.len();
        tracing::debug!(restored = missing.len(), generation, "re-queued on-screen markers");
        missing.len()
    }

    fn evict_offscreen(&mut self) -> usize {
        let viewport = self.backend.viewport();
        let plan = plan_eviction(
            self.markers
                .values()
                .map(|m| (m.hospital.id.as_str(), m.hospital.lat, m.hospital.lon)),
            &viewport,
            self.config.viewport_padding,
            self.config.marker_cleanup_threshold,
        );

        let evicted = plan.iter().filter(|id| self.remove_marker(id)).count();
        if evicted > 0 {
            self.stats.evicted += evicted;
            tracing::info!(evicted, remaining = self.markers.len(), "evicted off-screen markers");
        }
        evicted
    }

    /// Remove one marker. Returns `false` if it was already gone.
    pub fn remove_marker(&mut self, id: &str) -> bool {
        let Some(marker) = self.markers.remove(id) else {
            return false;
        };
        self.backend.unbind_popup(marker.handle);
        self.backend.unbind_tooltip(marker.handle);
        self.backend.remove_from_cluster(marker.handle);
        if let Err(e) = self.backend.remove_marker(marker.handle) {
            tracing::debug!(hospital = %id, error = %e, "marker already gone from map");
        }
        true
    }

    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    pub fn marker(&self, id: &str) -> Option<&MarkerRef> {
        self.markers.get(id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Sorted ids of live markers
    pub fn marker_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.markers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn pending_chunks(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    pub fn progress(&self) -> &ChunkedOperation {
        &self.progress
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
