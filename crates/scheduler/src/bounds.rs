//! Geographic viewport bounds
//!
//! Decides which hospitals count as visible for scheduling and which
//! markers survive an eviction pass.

use crate::priority::ChunkPriority;
use serde::{Deserialize, Serialize};

/// Latitude/longitude rectangle, edges inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// The whole map
    pub fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    /// Whether `(lat, lon)` lies inside the bounds
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Grow each side by `ratio` of the span on that axis
    ///
    /// # Example
    ///
    /// ```
    /// use hospital_map_scheduler::GeoBounds;
    ///
    /// let padded = GeoBounds::new(0.0, 0.0, 10.0, 20.0).pad(0.5);
    /// assert_eq!(padded, GeoBounds::new(-5.0, -10.0, 15.0, 30.0));
    /// ```
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_buffer = (self.north - self.south).abs() * ratio;
        let lon_buffer = (self.east - self.west).abs() * ratio;
        Self {
            south: self.south - lat_buffer,
            west: self.west - lon_buffer,
            north: self.north + lat_buffer,
            east: self.east + lon_buffer,
        }
    }

    /// Scheduling priority for a hospital at `(lat, lon)`
    pub fn priority_for(&self, lat: f64, lon: f64) -> ChunkPriority {
        if self.contains(lat, lon) {
            ChunkPriority::Visible
        } else {
            ChunkPriority::Deferred
        }
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::world()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let bounds = GeoBounds::new(40.0, -5.0, 50.0, 10.0);
        assert!(bounds.contains(48.85, 2.35));
        assert!(bounds.contains(40.0, -5.0));
        assert!(bounds.contains(50.0, 10.0));
        assert!(!bounds.contains(51.5, -0.12));
        assert!(!bounds.contains(39.9, 0.0));
    }

    #[test]
    fn test_pad_zero_is_identity() {
        let bounds = GeoBounds::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(bounds.pad(0.0), bounds);
    }

    #[test]
    fn test_priority_for() {
        let bounds = GeoBounds::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(bounds.priority_for(5.0, 5.0), ChunkPriority::Visible);
        assert_eq!(bounds.priority_for(-5.0, 5.0), ChunkPriority::Deferred);
    }

    #[test]
    fn test_world_contains_everything_valid() {
        let world = GeoBounds::default();
        assert!(world.contains(-90.0, -180.0));
        assert!(world.contains(90.0, 180.0));
        assert!(!world.contains(f64::NAN, 0.0));
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(GeoBounds::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json["south"], 1.0);
        assert_eq!(json["east"], 4.0);
    }
}
