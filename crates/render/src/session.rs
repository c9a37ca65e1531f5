//! Store-driven map session
//!
//! [`MapSession`] subscribes a [`RenderEngine`] to the store: a new hospital
//! set, new filters or a new language trigger a full rebuild from the
//! filtered list, a selection change restyles markers, and a zoom change
//! runs an eviction pass.

use crate::backend::{MapBackend, MarkerHandle};
use crate::engine::RenderEngine;
use hospital_map_core::{compute_displayed, MapController, MapError, StatePatch, StoreState, Subscription};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Keeps a render engine in sync with the store
pub struct MapSession<B: MapBackend + 'static> {
    controller: MapController,
    engine: Arc<Mutex<RenderEngine<B>>>,
    subscription: Option<Subscription>,
}

impl<B: MapBackend + 'static> MapSession<B> {
    /// Render the current state and follow every later change
    pub fn attach(controller: MapController, engine: RenderEngine<B>) -> Self {
        let engine = Arc::new(Mutex::new(engine));
        {
            let state = controller.store().get_state();
            let mut engine = engine.lock().unwrap();
            engine.set_language(&state.language);
            engine.select_hospital(state.ui.selected_hospital_id.as_deref());
            engine.rebuild(&compute_displayed(&state.hospitals, &state.filters, &state.active_status));
        }

        let listener_engine = Arc::clone(&engine);
        let subscription = controller.store().subscribe(move |new, old| {
            let mut engine = listener_engine.lock().unwrap();
            apply_change(&mut engine, new, old);
        });
        tracing::debug!(subscription = ?subscription.id(), "map session attached");

        Self {
            controller,
            engine,
            subscription: Some(subscription),
        }
    }

    pub fn controller(&self) -> &MapController {
        &self.controller
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut RenderEngine<B>) -> R) -> R {
        let mut engine = self.engine.lock().unwrap();
        f(&mut engine)
    }

    pub fn on_animation_frame(&self, now: Instant) -> usize {
        self.with_engine(|e| e.on_animation_frame(now))
    }

    pub fn on_idle(&self, now: Instant) -> usize {
        self.with_engine(|e| e.on_idle(now))
    }

    pub fn flush(&self) -> usize {
        self.with_engine(|e| e.flush())
    }

    /// Forwarded marker click: selects the hospital through the controller
    pub fn on_marker_click(&self, handle: MarkerHandle) -> Result<bool, MapError> {
        // Released before the controller notifies the listener
        let id = self.with_engine(|e| e.on_marker_click(handle));
        match id {
            Some(id) => self.controller.select_hospital(Some(&id)),
            None => Ok(false),
        }
    }

    /// Forwarded `zoomend`: records the zoom and returns the markers evicted
    pub fn on_zoom_end(&self, zoom: f64) -> usize {
        let before = self.with_engine(|e| e.stats().evicted);
        let changed = self
            .controller
            .store()
            .set_state(StatePatch::new().current_zoom(zoom), false);
        if !changed {
            self.with_engine(|e| e.on_zoom_end(zoom));
        }
        self.with_engine(|e| e.stats().evicted) - before
    }

    /// Forwarded `moveend`
    pub fn on_move_end(&self) -> usize {
        self.with_engine(|e| e.on_move_end())
    }

    /// Stop following the store. The engine keeps its markers.
    pub fn detach(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => subscription.unsubscribe(),
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }
}

impl<B: MapBackend + 'static> Drop for MapSession<B> {
    fn drop(&mut self) {
        self.detach();
    }
}

fn apply_change<B: MapBackend>(engine: &mut RenderEngine<B>, new: &StoreState, old: &StoreState) {
    if new.ui.selected_hospital_id != old.ui.selected_hospital_id {
        engine.select_hospital(new.ui.selected_hospital_id.as_deref());
    }

    let rebuild = !Arc::ptr_eq(&new.hospitals, &old.hospitals)
        || new.filters != old.filters
        || new.active_status != old.active_status
        || new.language != old.language;
    if rebuild {
        engine.set_language(&new.language);
        let visible = compute_displayed(&new.hospitals, &new.filters, &new.active_status);
        engine.rebuild(&visible);
    }

    if new.current_zoom != old.current_zoom {
        engine.on_zoom_end(new.current_zoom);
    }
}
