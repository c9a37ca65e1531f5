//! Marker styling by status

use hospital_map_core::Status;
use serde::Serialize;

/// Stroke colour of a normal marker
pub const STROKE_COLOR: &str = "#ffffff";

/// Stroke colour of the highlighted marker
pub const ACTIVE_STROKE_COLOR: &str = "#111827";

pub const MARKER_RADIUS: f64 = 8.0;
pub const ACTIVE_MARKER_RADIUS: f64 = 12.0;
pub const MARKER_WEIGHT: f64 = 2.0;
pub const ACTIVE_MARKER_WEIGHT: f64 = 3.0;
pub const MARKER_OPACITY: f64 = 1.0;
pub const MARKER_FILL_OPACITY: f64 = 0.8;

/// Fill colour for a status
pub fn status_color(status: Status) -> &'static str {
    match status {
        Status::Deployed => "#22c55e",
        Status::InProgress => "#f59e0b",
        Status::Signed => "#3b82f6",
    }
}

/// Visual attributes of a circle marker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStyle {
    pub radius: f64,
    pub fill_color: &'static str,
    pub stroke_color: &'static str,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl MarkerStyle {
    /// Style for a marker of `status`, highlighted when `active`
    pub fn for_status(status: Status, active: bool) -> Self {
        let (radius, weight, stroke_color) = if active {
            (ACTIVE_MARKER_RADIUS, ACTIVE_MARKER_WEIGHT, ACTIVE_STROKE_COLOR)
        } else {
            (MARKER_RADIUS, MARKER_WEIGHT, STROKE_COLOR)
        };

        Self {
            radius,
            fill_color: status_color(status),
            stroke_color,
            weight,
            opacity: MARKER_OPACITY,
            fill_opacity: MARKER_FILL_OPACITY,
        }
    }
}
