//! Persisted user preferences
//!
//! Language, dark mode, active statuses and filters survive a reload. The
//! envelope carries a schema version and a timestamp; an entry from another
//! version or older than [`PREFERENCES_MAX_AGE`] is removed instead of
//! applied.

use crate::kv::KeyValueStore;
use crate::StorageError;
use chrono::{DateTime, Utc};
use hospital_map_core::{Filters, StatePatch, Status, StoreState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage key of the preferences entry
pub const PREFERENCES_KEY: &str = "hospital-map-preferences";

pub const PREFERENCES_VERSION: u32 = 1;

/// Entries older than this are discarded
pub const PREFERENCES_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The part of the store state that is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub language: String,
    pub dark_mode: bool,
    pub active_status: Vec<Status>,
    pub filters: Filters,
}

impl Default for Preferences {
    fn default() -> Self {
        Self::from_state(&StoreState::default())
    }
}

impl Preferences {
    pub fn from_state(state: &StoreState) -> Self {
        Self {
            language: state.language.clone(),
            dark_mode: state.dark_mode,
            active_status: state.active_status.clone(),
            filters: state.filters.clone(),
        }
    }

    /// Patch that restores these preferences into a store
    pub fn to_patch(&self) -> StatePatch {
        StatePatch::new()
            .language(self.language.clone())
            .dark_mode(self.dark_mode)
            .active_status(self.active_status.clone())
            .filters(self.filters.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    #[serde(flatten)]
    preferences: Preferences,
    version: u32,
    timestamp: DateTime<Utc>,
}

/// Saves and restores [`Preferences`] through a [`KeyValueStore`]
pub struct PreferenceStore<S: KeyValueStore> {
    store: S,
    max_age: Duration,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_age: PREFERENCES_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), StorageError> {
        self.save_at(preferences, Utc::now())
    }

    pub fn save_at(&self, preferences: &Preferences, now: DateTime<Utc>) -> Result<(), StorageError> {
        let envelope = PreferencesEnvelope {
            preferences: preferences.clone(),
            version: PREFERENCES_VERSION,
            timestamp: now,
        };
        let json = serde_json::to_string(&envelope)?;
        self.store.set(PREFERENCES_KEY, &json)?;
        tracing::debug!(language = %preferences.language, "preferences saved");
        Ok(())
    }

    /// Saved preferences, or `None` when absent, outdated or unreadable
    pub fn load(&self) -> Result<Option<Preferences>, StorageError> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Result<Option<Preferences>, StorageError> {
        let Some(json) = self.store.get(PREFERENCES_KEY)? else {
            return Ok(None);
        };

        let envelope: PreferencesEnvelope = match serde_json::from_str(&json) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable preferences");
                self.store.remove(PREFERENCES_KEY)?;
                return Ok(None);
            }
        };

        if envelope.version != PREFERENCES_VERSION {
            tracing::info!(
                found = envelope.version,
                expected = PREFERENCES_VERSION,
                "discarding preferences from another version"
            );
            self.store.remove(PREFERENCES_KEY)?;
            return Ok(None);
        }

        // A timestamp in the future counts as fresh
        let age = now
            .signed_duration_since(envelope.timestamp)
            .to_std()
            .unwrap_or_default();
        if age > self.max_age {
            tracing::info!(saved_at = %envelope.timestamp, "discarding expired preferences");
            self.store.remove(PREFERENCES_KEY)?;
            return Ok(None);
        }

        Ok(Some(envelope.preferences))
    }

    /// Forget saved preferences
    pub fn clear(&self) -> Result<bool, StorageError> {
        self.store.remove(PREFERENCES_KEY)
    }
}
