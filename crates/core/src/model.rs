//! Hospital data model and store state
//!
//! Hospitals are immutable once loaded. The whole set is replaced on
//! refetch, so the state shares it behind an `Arc<[Hospital]>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Deployment status of a hospital
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// System is live at the site
    Deployed,

    /// Deployment underway
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,

    /// Contract signed, work not started
    Signed,
}

impl Status {
    /// All statuses in legend order
    pub const ALL: [Status; 3] = [Status::Deployed, Status::InProgress, Status::Signed];

    /// Display / wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Deployed => "Deployed",
            Status::InProgress => "In Progress",
            Status::Signed => "Signed",
        }
    }

    /// Translation key suffix
    pub fn key(&self) -> &'static str {
        match self {
            Status::Deployed => "deployed",
            Status::InProgress => "inProgress",
            Status::Signed => "signed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deployed" => Ok(Status::Deployed),
            "in progress" | "inprogress" | "in_progress" => Ok(Status::InProgress),
            "signed" => Ok(Status::Signed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A geolocated facility record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    /// Unique identifier
    pub id: String,

    pub lat: f64,
    pub lon: f64,

    pub status: Status,

    pub name: String,

    /// Free-form postal address, comma separated, country last
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// ISO date (`YYYY-MM-DD`); only consulted when a date filter is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_date: Option<String>,
}

impl Hospital {
    /// Create a hospital with the required fields
    pub fn new(
        id: impl Into<String>,
        lat: f64,
        lon: f64,
        status: Status,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            status,
            name: name.into(),
            address: address.into(),
            website: None,
            image_url: None,
            deployment_date: None,
        }
    }

    /// Set the website
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Set the thumbnail image URL
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Set the deployment date
    pub fn with_deployment_date(mut self, date: impl Into<String>) -> Self {
        self.deployment_date = Some(date.into());
        self
    }
}

/// Inclusive date bounds for the deployment-date filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Whether `date` falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// User-selected filters
///
/// Empty strings and an empty status list mean "no filter".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub continent: String,
    pub country: String,
    pub city: String,
    pub search_term: String,
    pub statuses: Vec<Status>,
    pub date_range: Option<DateRange>,
}

impl Filters {
    /// True when no predicate is active
    pub fn is_empty(&self) -> bool {
        self.continent.is_empty()
            && self.country.is_empty()
            && self.city.is_empty()
            && self.search_term.is_empty()
            && self.statuses.is_empty()
            && self.date_range.is_none()
    }
}

/// Partial filter update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltersPatch {
    pub continent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub search_term: Option<String>,
    pub statuses: Option<Vec<Status>>,
    pub date_range: Option<Option<DateRange>>,
}

impl FiltersPatch {
    /// Apply this patch on top of `filters`
    pub fn apply_to(&self, filters: &Filters) -> Filters {
        let mut next = filters.clone();
        if let Some(continent) = &self.continent {
            next.continent = continent.clone();
        }
        if let Some(country) = &self.country {
            next.country = country.clone();
        }
        if let Some(city) = &self.city {
            next.city = city.clone();
        }
        if let Some(search_term) = &self.search_term {
            next.search_term = search_term.clone();
        }
        if let Some(statuses) = &self.statuses {
            next.statuses = statuses.clone();
        }
        if let Some(date_range) = &self.date_range {
            next.date_range = *date_range;
        }
        next
    }
}

/// Transient UI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub controls_visible: bool,
    pub legend_visible: bool,
    pub selected_hospital_id: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            controls_visible: true,
            legend_visible: true,
            selected_hospital_id: None,
            loading: false,
            error: None,
        }
    }
}

/// Counters shown in badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub deployed: usize,
    pub in_progress: usize,
    pub signed: usize,
    pub visible: usize,
}

/// Opaque host object (live map, renderer) carried in state by reference.
///
/// Cloning the state clones the `Arc`, never the object. Equality is
/// identity.
#[derive(Clone)]
pub struct MapHandle(Arc<dyn Any + Send + Sync>);

impl MapHandle {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Borrow the host object as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether two handles point at the same object
    pub fn ptr_eq(&self, other: &MapHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MapHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MapHandle(..)")
    }
}

/// Default zoom level on first load
pub const DEFAULT_ZOOM: f64 = 3.0;

/// The full reactive state
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub hospitals: Arc<[Hospital]>,
    pub filters: Filters,
    pub active_status: Vec<Status>,
    pub language: String,
    pub dark_mode: bool,
    pub ui: UiState,
    pub stats: Stats,
    pub current_zoom: f64,
    pub map_handle: Option<MapHandle>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            hospitals: Arc::from(Vec::new()),
            filters: Filters::default(),
            active_status: Status::ALL.to_vec(),
            language: "en".to_string(),
            dark_mode: false,
            ui: UiState::default(),
            stats: Stats::default(),
            current_zoom: DEFAULT_ZOOM,
            map_handle: None,
        }
    }
}

impl StoreState {
    /// Look up a hospital by id
    pub fn hospital(&self, id: &str) -> Option<&Hospital> {
        self.hospitals.iter().find(|h| h.id == id)
    }
}
