//! User intents
//!
//! The presentation layer never writes to the store directly. It calls a
//! [`MapController`] intent, which rate-limits the action, lets the store
//! sanitize the strings, and keeps derived values (stats, mirrored status
//! filter) consistent inside the same patch.

use crate::error::{ErrorHandler, MapError};
use crate::filter::{compute_displayed, compute_stats};
use crate::model::{Filters, FiltersPatch, Hospital, Status, StoreState};
use crate::store::{StatePatch, Store};
use hospital_map_security::SecurityGate;
use std::sync::Arc;

/// Rate-limit key used for UI intents
pub const DEFAULT_CLIENT_ID: &str = "ui";

/// Entry point for user-driven state changes
#[derive(Clone)]
pub struct MapController {
    store: Store,
    gate: Arc<SecurityGate>,
    errors: ErrorHandler,
    client_id: String,
}

impl MapController {
    /// Create a controller sharing the store's security gate
    pub fn new(store: Store, errors: ErrorHandler) -> Self {
        let gate = store.gate().clone();
        Self {
            store,
            gate,
            errors,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    /// Use a different rate-limit key
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    /// Merge `patch` into the current filters and refresh the counters
    pub fn set_filters(&self, patch: FiltersPatch) -> Result<bool, MapError> {
        self.throttle("setFilters")?;
        let state = self.store.get_state();
        let filters = patch.apply_to(&state.filters);
        Ok(self.commit_filters(&state, filters, None))
    }

    /// Toggle `status` in the active set and mirror it into the filters
    pub fn toggle_status(&self, status: Status) -> Result<bool, MapError> {
        self.throttle("toggleStatus")?;
        let state = self.store.get_state();

        let mut active = state.active_status.clone();
        if let Some(pos) = active.iter().position(|s| *s == status) {
            active.remove(pos);
        } else {
            active.push(status);
            active.sort();
        }

        let filters = Filters {
            statuses: active.clone(),
            ..state.filters.clone()
        };
        Ok(self.commit_filters(&state, filters, Some(active)))
    }

    /// Highlight a hospital, or clear the selection with `None`
    pub fn select_hospital(&self, id: Option<&str>) -> Result<bool, MapError> {
        self.throttle("selectHospital")?;
        let state = self.store.get_state();

        if let Some(id) = id {
            if state.hospital(id).is_none() {
                let error = MapError::validation(id, "no such hospital");
                self.errors.handle(&error);
                return Err(error);
            }
        }

        let mut ui = state.ui.clone();
        ui.selected_hospital_id = id.map(str::to_string);
        Ok(self.commit(StatePatch::new().ui(ui)))
    }

    /// Switch the display language
    pub fn set_language(&self, language: &str) -> Result<bool, MapError> {
        self.throttle("setLanguage")?;
        let language = language.trim();
        if language.is_empty() {
            let error = MapError::validation("language", "empty language code");
            self.errors.handle(&error);
            return Err(error);
        }
        Ok(self.commit(StatePatch::new().language(language)))
    }

    /// Toggle dark mode
    pub fn set_dark_mode(&self, dark_mode: bool) -> Result<bool, MapError> {
        self.throttle("setDarkMode")?;
        Ok(self.commit(StatePatch::new().dark_mode(dark_mode)))
    }

    /// Replace the hospital set (data loading is not rate-limited)
    pub fn load_hospitals(&self, hospitals: Vec<Hospital>) -> bool {
        self.store.load_hospitals(hospitals)
    }

    fn commit_filters(&self, state: &StoreState, filters: Filters, active: Option<Vec<Status>>) -> bool {
        let filters = self.store.sanitize_filters(&self.client_id, filters);
        let active_status = active.as_deref().unwrap_or(state.active_status.as_slice());
        let visible = compute_displayed(&state.hospitals, &filters, active_status);
        let stats = compute_stats(&state.hospitals, &visible);

        let mut patch = StatePatch::new().filters(filters).stats(stats);
        if let Some(active) = active {
            patch = patch.active_status(active);
        }
        self.commit(patch)
    }

    fn commit(&self, patch: StatePatch) -> bool {
        self.store.set_state_from(&self.client_id, patch, true)
    }

    fn throttle(&self, action: &str) -> Result<(), MapError> {
        if self.gate.check_rate_limit(&self.client_id) {
            return Ok(());
        }
        let error = MapError::RateLimited {
            action: action.to_string(),
        };
        self.errors.handle(&error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hospital_map_security::SecurityConfig;
    use std::time::Duration;

    fn hospitals() -> Vec<Hospital> {
        vec![
            Hospital::new("1", 48.85, 2.35, Status::Deployed, "Necker", "Rue A, 75015 Paris, France"),
            Hospital::new("2", 45.0, -1.0, Status::Signed, "Atlantique", "Rue B, 33000 Bordeaux, France"),
            Hospital::new("3", 40.71, -74.0, Status::InProgress, "Sinai", "1 Pl, New York 10029, USA"),
        ]
    }

    fn controller(config: SecurityConfig) -> MapController {
        let store = Store::new(StoreState::default(), Arc::new(SecurityGate::new(config)));
        let controller = MapController::new(store, ErrorHandler::new());
        controller.load_hospitals(hospitals());
        controller
    }

    #[test]
    fn test_set_filters_updates_stats() {
        let controller = controller(SecurityConfig::default());
        controller
            .set_filters(FiltersPatch {
                country: Some("France".to_string()),
                ..Default::default()
            })
            .unwrap();

        let state = controller.store().get_state();
        assert_eq!(state.filters.country, "France");
        assert_eq!(state.stats.visible, 2);
        assert_eq!(state.stats.total, 3);
    }

    #[test]
    fn test_set_filters_sanitizes() {
        let controller = controller(SecurityConfig::default());
        controller
            .set_filters(FiltersPatch {
                search_term: Some("<img src=x onerror=alert(1)>Necker".to_string()),
                ..Default::default()
            })
            .unwrap();

        let term = controller.store().get_state().filters.search_term;
        assert_eq!(term, "Necker");
    }

    #[test]
    fn test_toggle_status_mirrors_filters() {
        let controller = controller(SecurityConfig::default());

        controller.toggle_status(Status::Signed).unwrap();
        let state = controller.store().get_state();
        assert_eq!(state.active_status, vec![Status::Deployed, Status::InProgress]);
        assert_eq!(state.filters.statuses, state.active_status);
        assert_eq!(state.stats.visible, 2);

        controller.toggle_status(Status::Signed).unwrap();
        let state = controller.store().get_state();
        assert_eq!(state.active_status, Status::ALL.to_vec());
        assert_eq!(state.stats.visible, 3);
    }

    #[test]
    fn test_all_statuses_off_shows_nothing() {
        let controller = controller(SecurityConfig::default());
        for status in Status::ALL {
            controller.toggle_status(status).unwrap();
        }

        let state = controller.store().get_state();
        assert!(state.active_status.is_empty());
        assert_eq!(state.stats.visible, 0);
        assert_eq!(state.stats.total, 3);

        controller.toggle_status(Status::Deployed).unwrap();
        assert_eq!(controller.store().get_state().stats.visible, 1);
    }

    #[test]
    fn test_repeated_hostile_input_blocks_client() {
        let controller = controller(SecurityConfig::default().with_max_violations(2));
        let hostile = || FiltersPatch {
            search_term: Some("<script>x</script>".to_string()),
            ..Default::default()
        };

        controller.set_filters(hostile()).unwrap();
        controller.set_filters(hostile()).unwrap();
        assert!(controller.store().gate().is_blocked(DEFAULT_CLIENT_ID));

        let result = controller.set_dark_mode(true);
        assert!(matches!(result, Err(MapError::RateLimited { .. })));
        assert!(!controller.store().get_state().dark_mode);

        // Other clients are unaffected
        let other = controller.clone().with_client_id("keyboard");
        assert!(other.set_dark_mode(true).unwrap());
    }

    #[test]
    fn test_select_hospital() {
        let controller = controller(SecurityConfig::default());

        assert!(controller.select_hospital(Some("2")).unwrap());
        assert_eq!(
            controller.store().get_state().ui.selected_hospital_id.as_deref(),
            Some("2")
        );

        assert!(matches!(
            controller.select_hospital(Some("404")),
            Err(MapError::Validation { .. })
        ));

        assert!(controller.select_hospital(None).unwrap());
        assert!(controller.store().get_state().ui.selected_hospital_id.is_none());
    }

    #[test]
    fn test_language_and_dark_mode() {
        let controller = controller(SecurityConfig::default());
        assert!(controller.set_language("fr").unwrap());
        assert!(!controller.set_language("fr").unwrap());
        assert!(controller.set_language("  ").is_err());
        assert!(controller.set_dark_mode(true).unwrap());
        assert!(controller.store().get_state().dark_mode);
    }

    #[test]
    fn test_rate_limited_intent_leaves_state_untouched() {
        let controller = controller(SecurityConfig::default().with_rate_limit(2, Duration::from_secs(60)));

        controller.set_dark_mode(true).unwrap();
        controller.set_dark_mode(false).unwrap();
        let result = controller.set_dark_mode(true);

        assert!(matches!(result, Err(MapError::RateLimited { .. })));
        assert!(!controller.store().get_state().dark_mode);
        assert_eq!(controller.errors().active_notices().len(), 1);
    }

    #[test]
    fn test_client_ids_are_independent() {
        let controller = controller(SecurityConfig::default().with_rate_limit(1, Duration::from_secs(60)));
        let other = controller.clone().with_client_id("keyboard");

        controller.set_dark_mode(true).unwrap();
        assert!(controller.set_dark_mode(false).is_err());
        assert!(other.set_dark_mode(false).is_ok());
    }
}
