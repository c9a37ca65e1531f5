//! Hospital Map Core Library
//!
//! Data model and state for the hospital map: the reactive [`Store`], the
//! pure filtering functions, the intent controller the UI talks to, and the
//! error funnel every failure path reports into.
//!
//! # Example
//!
//! ```
//! use hospital_map_core::{compute_visible, Filters, Hospital, Status};
//!
//! let hospitals = vec![
//!     Hospital::new("1", 48.85, 2.35, Status::Deployed, "Necker", "Paris, France"),
//!     Hospital::new("2", 45.0, -1.0, Status::Signed, "Atlantique", "Bordeaux, France"),
//! ];
//! let filters = Filters {
//!     statuses: vec![Status::Deployed],
//!     ..Default::default()
//! };
//!
//! let visible = compute_visible(&hospitals, &filters);
//! assert_eq!(visible.len(), 1);
//! assert_eq!(visible[0].id, "1");
//! ```

pub mod address;
pub mod config;
pub mod continent;
pub mod error;
pub mod filter;
pub mod intents;
pub mod loader;
pub mod model;
pub mod store;
pub mod translations;

pub use address::{parse_address, ParsedAddress};
pub use config::{ConfigError, MapConfig};
pub use continent::{classify_continent, Continent};
pub use error::{ErrorHandler, ErrorReporter, MapError, Notice, NoticeLevel};
pub use filter::{compute_displayed, compute_stats, compute_visible, matches, unique_cities, unique_countries};
pub use intents::MapController;
pub use loader::{load_hospitals_file, parse_hospitals, LoadError, LoadedHospitals};
pub use model::{
    DateRange, Filters, FiltersPatch, Hospital, MapHandle, Stats, Status, StoreState, UiState,
};
pub use store::{Listener, StatePatch, Store, Subscription, SubscriptionId};
pub use translations::Translations;
