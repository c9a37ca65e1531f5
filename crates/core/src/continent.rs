//! Continent classification by bounding box

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Continent a coordinate classifies into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continent {
    Europe,
    Africa,
    Asia,
    Oceania,
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "South America")]
    SouthAmerica,
    Unknown,
}

impl Continent {
    /// Display name, as used in filter values
    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::Europe => "Europe",
            Continent::Africa => "Africa",
            Continent::Asia => "Asia",
            Continent::Oceania => "Oceania",
            Continent::NorthAmerica => "North America",
            Continent::SouthAmerica => "South America",
            Continent::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Continent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "europe" => Ok(Continent::Europe),
            "africa" => Ok(Continent::Africa),
            "asia" => Ok(Continent::Asia),
            "oceania" => Ok(Continent::Oceania),
            "northamerica" => Ok(Continent::NorthAmerica),
            "southamerica" => Ok(Continent::SouthAmerica),
            "unknown" => Ok(Continent::Unknown),
            _ => Err(format!("unknown continent: {s}")),
        }
    }
}

/// `(lat_min, lat_max, lon_min, lon_max)`, inclusive
type BoundingBox = (f64, f64, f64, f64);

/// Checked in order; the first containing box wins. The Maghreb coast must
/// come before Europe, whose box reaches down to 35°N, and South America
/// before North America for the Caribbean coast.
const CONTINENT_BOXES: &[(Continent, &[BoundingBox])] = &[
    (
        Continent::Africa,
        &[
            (27.0, 35.95, -10.0, -2.0),
            (27.0, 37.0, -2.0, 0.0),
            (27.0, 37.4, 0.0, 11.6),
        ],
    ),
    (Continent::Europe, &[(35.0, 71.0, -25.0, 45.0)]),
    (
        Continent::Africa,
        &[
            (-35.0, 37.5, -18.0, 32.0),
            (-35.0, 31.5, 32.0, 35.0),
            (-35.0, 12.0, 35.0, 52.0),
        ],
    ),
    (Continent::Asia, &[(-11.0, 77.0, 26.0, 180.0)]),
    (
        Continent::Oceania,
        &[(-50.0, 0.0, 110.0, 180.0), (-50.0, 0.0, -180.0, -120.0)],
    ),
    (
        Continent::SouthAmerica,
        &[(-56.0, 7.0, -82.0, -34.0), (7.0, 12.5, -77.3, -59.0)],
    ),
    (Continent::NorthAmerica, &[(7.0, 84.0, -170.0, -50.0)]),
];

/// Classify a coordinate; anything outside every box is `Unknown`.
pub fn classify_continent(lat: f64, lon: f64) -> Continent {
    if !lat.is_finite() || !lon.is_finite() {
        return Continent::Unknown;
    }

    CONTINENT_BOXES
        .iter()
        .find(|(_, boxes)| {
            boxes.iter().any(|&(lat_min, lat_max, lon_min, lon_max)| {
                (lat_min..=lat_max).contains(&lat) && (lon_min..=lon_max).contains(&lon)
            })
        })
        .map_or(Continent::Unknown, |(continent, _)| *continent)
}
