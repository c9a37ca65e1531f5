//! Reactive state container with bounded undo history
//!
//! The store is an explicitly constructed handle; clones share the same
//! state. Writers go through [`Store::set_state`], which sanitizes user
//! strings, merges the patch key by key and notifies subscribers only when
//! something actually changed.

use crate::error::{ErrorHandler, MapError};
use crate::filter::{compute_displayed, compute_stats};
use crate::model::{Filters, Hospital, MapHandle, Stats, Status, StoreState, UiState};
use hospital_map_security::SecurityGate;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

/// Default number of snapshots kept for undo
pub const HISTORY_LIMIT: usize = 10;

/// Source id for suspicious input written without a client id
pub const STORE_SOURCE: &str = "store";

/// Called with `(new_state, old_state)` after every change
pub type Listener = Arc<dyn Fn(&StoreState, &StoreState) + Send + Sync>;

/// Identifies a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Partial state update; every `None` key is left untouched
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub hospitals: Option<Arc<[Hospital]>>,
    pub filters: Option<Filters>,
    pub active_status: Option<Vec<Status>>,
    pub language: Option<String>,
    pub dark_mode: Option<bool>,
    pub ui: Option<UiState>,
    pub stats: Option<Stats>,
    pub current_zoom: Option<f64>,
    pub map_handle: Option<Option<MapHandle>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hospitals(mut self, hospitals: Vec<Hospital>) -> Self {
        self.hospitals = Some(Arc::from(hospitals));
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn active_status(mut self, statuses: Vec<Status>) -> Self {
        self.active_status = Some(statuses);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn dark_mode(mut self, dark_mode: bool) -> Self {
        self.dark_mode = Some(dark_mode);
        self
    }

    pub fn ui(mut self, ui: UiState) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn current_zoom(mut self, zoom: f64) -> Self {
        self.current_zoom = Some(zoom);
        self
    }

    pub fn map_handle(mut self, handle: Option<MapHandle>) -> Self {
        self.map_handle = Some(handle);
        self
    }

    /// True when the patch carries no keys
    pub fn is_empty(&self) -> bool {
        self.hospitals.is_none()
            && self.filters.is_none()
            && self.active_status.is_none()
            && self.language.is_none()
            && self.dark_mode.is_none()
            && self.ui.is_none()
            && self.stats.is_none()
            && self.current_zoom.is_none()
            && self.map_handle.is_none()
    }
}

struct StoreInner {
    state: StoreState,
    initial: StoreState,
    history: VecDeque<StoreState>,
    history_limit: usize,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

/// Shared, reactive state container.
///
/// # Example
///
/// ```
/// use hospital_map_core::{StatePatch, Store, StoreState};
/// use hospital_map_security::SecurityGate;
/// use std::sync::Arc;
///
/// let store = Store::new(StoreState::default(), Arc::new(SecurityGate::default()));
/// let sub = store.subscribe(|new, old| {
///     assert_ne!(new.dark_mode, old.dark_mode);
/// });
///
/// assert!(store.set_state(StatePatch::new().dark_mode(true), true));
/// assert!(!store.set_state(StatePatch::new().dark_mode(true), true));
/// sub.unsubscribe();
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
    gate: Arc<SecurityGate>,
    errors: ErrorHandler,
}

impl Store {
    /// Create a store with the default history limit
    pub fn new(initial: StoreState, gate: Arc<SecurityGate>) -> Self {
        Self::with_history_limit(initial, gate, HISTORY_LIMIT)
    }

    /// Create a store keeping at most `history_limit` snapshots
    pub fn with_history_limit(initial: StoreState, gate: Arc<SecurityGate>, history_limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: initial.clone(),
                initial,
                history: VecDeque::with_capacity(history_limit),
                history_limit,
                listeners: Vec::new(),
                next_id: 0,
            })),
            gate,
            errors: ErrorHandler::new(),
        }
    }

    /// Route security reports through `errors`
    pub fn with_error_handler(mut self, errors: ErrorHandler) -> Self {
        self.errors = errors;
        self
    }

    /// The gate used for sanitization
    pub fn gate(&self) -> &Arc<SecurityGate> {
        &self.gate
    }

    /// Snapshot of the current state
    pub fn get_state(&self) -> StoreState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Merge `patch` into the state.
    ///
    /// Returns `true` if at least one key changed, in which case listeners
    /// have been notified. With `record_history` the pre-update snapshot is
    /// pushed onto the undo history first.
    pub fn set_state(&self, patch: StatePatch, record_history: bool) -> bool {
        self.set_state_from(STORE_SOURCE, patch, record_history)
    }

    /// Like [`set_state`](Self::set_state), recording suspicious input
    /// against `source` so repeated offences block that client.
    pub fn set_state_from(&self, source: &str, patch: StatePatch, record_history: bool) -> bool {
        let patch = self.sanitize_patch(source, patch);

        let (new_state, old_state, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let old_state = inner.state.clone();
            let Some(new_state) = merge(&old_state, patch) else {
                return false;
            };

            if record_history {
                inner.history.push_back(old_state.clone());
                while inner.history.len() > inner.history_limit {
                    inner.history.pop_front();
                }
            }
            inner.state = new_state.clone();
            (new_state, old_state, snapshot_listeners(&inner))
        };

        notify(&listeners, &new_state, &old_state);
        true
    }

    /// Replace the hospital set wholesale and refresh the counters.
    ///
    /// Not recorded in history.
    pub fn load_hospitals(&self, hospitals: Vec<Hospital>) -> bool {
        let (filters, active_status) = {
            let inner = self.inner.lock().unwrap();
            (inner.state.filters.clone(), inner.state.active_status.clone())
        };
        let visible = compute_displayed(&hospitals, &filters, &active_status);
        let stats = compute_stats(&hospitals, &visible);
        tracing::info!(total = stats.total, visible = stats.visible, "hospitals loaded");

        self.set_state(StatePatch::new().hospitals(hospitals).stats(stats), false)
    }

    /// Register a listener; it runs after every change, in subscription order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreState, &StoreState) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a listener; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_listener(&self.inner, id)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }

    /// Restore the initial snapshot and clear history
    pub fn reset(&self) {
        let (new_state, old_state, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let initial = inner.initial.clone();
            let old_state = std::mem::replace(&mut inner.state, initial);
            inner.history.clear();
            (inner.state.clone(), old_state, snapshot_listeners(&inner))
        };
        tracing::debug!("store reset");
        notify(&listeners, &new_state, &old_state);
    }

    /// Restore the most recent history snapshot
    pub fn undo(&self) -> bool {
        let (new_state, old_state, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(previous) = inner.history.pop_back() else {
                return false;
            };
            let old_state = std::mem::replace(&mut inner.state, previous);
            (inner.state.clone(), old_state, snapshot_listeners(&inner))
        };
        notify(&listeners, &new_state, &old_state);
        true
    }

    /// Number of snapshots available for undo
    pub fn history_len(&self) -> usize {
        self.inner.lock().unwrap().history.len()
    }

    /// Sanitize the free-text filter fields, reporting suspicious input.
    ///
    /// Sanitizing is idempotent, so filters cleaned here pass through
    /// [`set_state`](Self::set_state) unchanged.
    pub fn sanitize_filters(&self, source: &str, mut filters: Filters) -> Filters {
        filters.continent = self.clean(source, &filters.continent);
        filters.country = self.clean(source, &filters.country);
        filters.city = self.clean(source, &filters.city);
        filters.search_term = self.clean(source, &filters.search_term);
        filters
    }

    fn sanitize_patch(&self, source: &str, mut patch: StatePatch) -> StatePatch {
        if let Some(filters) = patch.filters.take() {
            patch.filters = Some(self.sanitize_filters(source, filters));
        }
        if let Some(language) = patch.language.as_mut() {
            *language = self.clean(source, language);
        }
        if let Some(ui) = patch.ui.as_mut() {
            if let Some(id) = ui.selected_hospital_id.as_mut() {
                *id = self.clean(source, id);
            }
            if let Some(error) = ui.error.as_mut() {
                *error = self.clean(source, error);
            }
        }
        patch
    }

    fn clean(&self, source: &str, value: &str) -> String {
        let (clean, violation) = self.gate.sanitize_reporting(source, value);
        if let Some(violation) = violation {
            self.errors.handle(&MapError::from(violation));
        }
        clean
    }
}

/// Handle returned by [`Store::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    store: Weak<Mutex<StoreInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving notifications
    pub fn unsubscribe(self) -> bool {
        match self.store.upgrade() {
            Some(inner) => remove_listener(&inner, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for StoreInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInner")
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn remove_listener(inner: &Mutex<StoreInner>, id: SubscriptionId) -> bool {
    let mut inner = inner.lock().unwrap();
    let before = inner.listeners.len();
    inner.listeners.retain(|(sid, _)| *sid != id);
    inner.listeners.len() != before
}

fn snapshot_listeners(inner: &StoreInner) -> Vec<(SubscriptionId, Listener)> {
    inner.listeners.clone()
}

fn notify(listeners: &[(SubscriptionId, Listener)], new_state: &StoreState, old_state: &StoreState) {
    for (id, listener) in listeners {
        let result = catch_unwind(AssertUnwindSafe(|| listener(new_state, old_state)));
        if result.is_err() {
            tracing::error!(subscription = id.0, "store listener panicked");
        }
    }
}

/// Apply `patch` to `state`; `None` when no key changes value.
fn merge(state: &StoreState, patch: StatePatch) -> Option<StoreState> {
    let mut next = state.clone();
    let mut changed = false;

    macro_rules! apply {
        ($field:ident) => {
            if let Some(value) = patch.$field {
                if next.$field != value {
                    next.$field = value;
                    changed = true;
                }
            }
        };
    }

    apply!(hospitals);
    apply!(filters);
    apply!(active_status);
    apply!(language);
    apply!(dark_mode);
    apply!(ui);
    apply!(stats);
    apply!(current_zoom);
    apply!(map_handle);

    changed.then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> Store {
        Store::new(StoreState::default(), Arc::new(SecurityGate::default()))
    }

    #[test]
    fn test_notify_only_on_change() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.set_state(StatePatch::new().language("fr"), true));
        assert!(!store.set_state(StatePatch::new().language("fr"), true));
        assert!(!store.set_state(StatePatch::new(), true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_receives_new_and_old() {
        let store = store();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let _sub = store.subscribe(move |new, old| {
            *sink.lock().unwrap() = Some((new.current_zoom, old.current_zoom));
        });

        store.set_state(StatePatch::new().current_zoom(7.0), false);
        assert_eq!(*seen.lock().unwrap(), Some((7.0, crate::model::DEFAULT_ZOOM)));
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let store = store();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let _a = store.subscribe(move |_, _| first.lock().unwrap().push("a"));
        let _b = store.subscribe(|_, _| panic!("listener failure"));
        let third = order.clone();
        let _c = store.subscribe(move |_, _| third.lock().unwrap().push("c"));

        assert!(store.set_state(StatePatch::new().dark_mode(true), true));
        assert_eq!(*order.lock().unwrap(), vec!["a", "c"]);
        assert!(store.get_state().dark_mode);
    }

    #[test]
    fn test_history_capped() {
        let store = store();
        for zoom in 0..15 {
            store.set_state(StatePatch::new().current_zoom(zoom as f64 + 10.0), true);
        }
        assert_eq!(store.history_len(), HISTORY_LIMIT);
    }

    #[test]
    fn test_history_not_recorded_when_disabled() {
        let store = store();
        store.set_state(StatePatch::new().current_zoom(5.0), false);
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_undo_restores_previous() {
        let store = store();
        store.set_state(StatePatch::new().language("fr"), true);
        store.set_state(StatePatch::new().language("de"), true);

        assert!(store.undo());
        assert_eq!(store.get_state().language, "fr");
        assert!(store.undo());
        assert_eq!(store.get_state().language, "en");
        assert!(!store.undo());
    }

    #[test]
    fn test_reset_restores_initial_and_clears_history() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_state(StatePatch::new().dark_mode(true).language("es"), true);
        store.reset();

        let state = store.get_state();
        assert!(!state.dark_mode);
        assert_eq!(state.language, "en");
        assert_eq!(store.history_len(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_strings_sanitized() {
        let store = store();
        let filters = Filters {
            search_term: "<script>alert(1)</script>Necker".to_string(),
            ..Default::default()
        };
        store.set_state(StatePatch::new().filters(filters), true);

        let term = store.get_state().filters.search_term;
        assert!(!term.contains("<script"));
        assert_eq!(term, "alert(1)Necker");
    }

    #[test]
    fn test_suspicious_input_recorded_against_store() {
        let gate = Arc::new(SecurityGate::new(
            hospital_map_security::SecurityConfig::default().with_max_violations(1),
        ));
        let store = Store::new(StoreState::default(), gate.clone());

        store.set_state(StatePatch::new().language("<script>"), true);
        assert!(gate.is_blocked(STORE_SOURCE));
    }

    #[test]
    fn test_suspicious_input_recorded_against_source() {
        let gate = Arc::new(SecurityGate::new(
            hospital_map_security::SecurityConfig::default().with_max_violations(1),
        ));
        let store = Store::new(StoreState::default(), gate.clone());

        store.set_state_from("keyboard", StatePatch::new().language("<script>fr"), true);
        assert!(gate.is_blocked("keyboard"));
        assert!(!gate.is_blocked(STORE_SOURCE));
        assert_eq!(store.get_state().language, "fr");
    }

    #[test]
    fn test_unsubscribe() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let other = store.subscribe(|_, _| {});

        assert!(sub.unsubscribe());
        assert!(store.unsubscribe(other.id()));
        assert!(!store.unsubscribe(other.id()));
        assert_eq!(store.listener_count(), 0);

        store.set_state(StatePatch::new().dark_mode(true), true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_map_handle_passed_by_reference() {
        let store = store();
        let handle = MapHandle::new(42u32);
        store.set_state(StatePatch::new().map_handle(Some(handle.clone())), false);

        let snapshot = store.get_state();
        assert!(snapshot.map_handle.as_ref().is_some_and(|h| h.ptr_eq(&handle)));
    }

    #[test]
    fn test_load_hospitals_updates_stats() {
        let store = store();
        store.load_hospitals(vec![
            Hospital::new("1", 48.85, 2.35, Status::Deployed, "A", "Paris, France"),
            Hospital::new("2", 45.0, -1.0, Status::Signed, "B", "Bordeaux, France"),
        ]);

        let state = store.get_state();
        assert_eq!(state.hospitals.len(), 2);
        assert_eq!(state.stats.total, 2);
        assert_eq!(state.stats.visible, 2);
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_listener_may_write_back() {
        let store = store();
        let writer = store.clone();
        let _sub = store.subscribe(move |new, _| {
            if new.language == "fr" && !new.dark_mode {
                writer.set_state(StatePatch::new().dark_mode(true), false);
            }
        });

        store.set_state(StatePatch::new().language("fr"), true);
        assert!(store.get_state().dark_mode);
    }
}
