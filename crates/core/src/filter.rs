//! Filtering of the hospital set
//!
//! Everything here is a pure function of its arguments. The renderer and the
//! UI counters both call [`compute_visible`], so two calls with the same
//! inputs must agree element for element.

use crate::address::parse_address;
use crate::continent::{classify_continent, Continent};
use crate::model::{DateRange, Filters, Hospital, Stats, Status};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Return the hospitals that pass every active filter, in input order.
///
/// Predicates run in a fixed order and the first failing one excludes the
/// record: status, name search, continent, country/city, deployment date.
pub fn compute_visible(hospitals: &[Hospital], filters: &Filters) -> Vec<Hospital> {
    let search = filters.search_term.trim().to_lowercase();
    let continent = parse_continent_filter(&filters.continent);
    let country = filters.country.trim().to_lowercase();
    let city = filters.city.trim().to_lowercase();

    hospitals
        .iter()
        .filter(|h| {
            matches_status(h, &filters.statuses)
                && matches_search(h, &search)
                && matches_continent(h, &filters.continent, continent)
                && matches_location(h, &country, &city)
                && matches_date_range(h, filters.date_range.as_ref())
        })
        .cloned()
        .collect()
}

/// Hospitals to draw: [`compute_visible`] restricted to the statuses
/// switched on in the legend. An empty legend draws nothing, even though an
/// empty `filters.statuses` means "any status".
pub fn compute_displayed(hospitals: &[Hospital], filters: &Filters, active_status: &[Status]) -> Vec<Hospital> {
    let mut visible = compute_visible(hospitals, filters);
    visible.retain(|h| active_status.contains(&h.status));
    visible
}

/// Whether a single hospital passes `filters`
pub fn matches(hospital: &Hospital, filters: &Filters) -> bool {
    !compute_visible(std::slice::from_ref(hospital), filters).is_empty()
}

/// Totals per status over `all`, plus the visible count
pub fn compute_stats(all: &[Hospital], visible: &[Hospital]) -> Stats {
    let mut stats = Stats {
        total: all.len(),
        visible: visible.len(),
        ..Default::default()
    };
    for hospital in all {
        match hospital.status {
            Status::Deployed => stats.deployed += 1,
            Status::InProgress => stats.in_progress += 1,
            Status::Signed => stats.signed += 1,
        }
    }
    stats
}

/// Distinct countries, sorted, for the country dropdown
pub fn unique_countries(hospitals: &[Hospital]) -> Vec<String> {
    hospitals
        .iter()
        .map(|h| parse_address(&h.address).country)
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct cities, sorted, optionally limited to one country
pub fn unique_cities(hospitals: &[Hospital], country: Option<&str>) -> Vec<String> {
    let country = country.map(|c| c.trim().to_lowercase());
    hospitals
        .iter()
        .map(|h| parse_address(&h.address))
        .filter(|parsed| {
            country
                .as_deref()
                .is_none_or(|c| parsed.country.to_lowercase() == c)
        })
        .map(|parsed| parsed.city)
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn parse_continent_filter(raw: &str) -> Option<Continent> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<Continent>() {
        Ok(continent) => Some(continent),
        Err(_) => {
            tracing::warn!(continent = raw, "unrecognised continent filter");
            Some(Continent::Unknown)
        }
    }
}

fn matches_status(hospital: &Hospital, statuses: &[Status]) -> bool {
    statuses.is_empty() || statuses.contains(&hospital.status)
}

fn matches_search(hospital: &Hospital, search: &str) -> bool {
    search.is_empty() || hospital.name.to_lowercase().contains(search)
}

fn matches_continent(hospital: &Hospital, raw: &str, continent: Option<Continent>) -> bool {
    if raw.trim().is_empty() {
        return true;
    }
    let classified = classify_continent(hospital.lat, hospital.lon);
    classified != Continent::Unknown && Some(classified) == continent
}

fn matches_location(hospital: &Hospital, country: &str, city: &str) -> bool {
    if country.is_empty() && city.is_empty() {
        return true;
    }
    let parsed = parse_address(&hospital.address);
    (country.is_empty() || parsed.country.to_lowercase().contains(country))
        && (city.is_empty() || parsed.city.to_lowercase().contains(city))
}

fn matches_date_range(hospital: &Hospital, range: Option<&DateRange>) -> bool {
    let Some(range) = range else {
        return true;
    };

    let Some(raw) = hospital.deployment_date.as_deref() else {
        tracing::debug!(id = %hospital.id, "no deployment date, excluded by date filter");
        return false;
    };

    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => range.contains(date),
        Err(e) => {
            tracing::warn!(
                id = %hospital.id,
                deployment_date = raw,
                error = %e,
                "unparseable deployment date, excluded by date filter"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Hospital> {
        vec![
            Hospital::new("1", 48.85, 2.35, Status::Deployed, "Hôpital Necker", "149 Rue de Sèvres, 75015 Paris, France")
                .with_deployment_date("2023-03-01"),
            Hospital::new("2", 45.0, -1.0, Status::Signed, "Clinique Atlantique", "Rue Z, 33000 Bordeaux, France"),
            Hospital::new("3", 40.71, -74.0, Status::InProgress, "Mount Sinai", "1 Gustave L. Levy Pl, New York 10029, USA")
                .with_deployment_date("not-a-date"),
            Hospital::new("4", 51.52, -0.12, Status::Deployed, "Great Ormond Street", "Great Ormond St, London WC1N 3JH, United Kingdom")
                .with_deployment_date("2024-06-15"),
        ]
    }

    fn ids(hospitals: &[Hospital]) -> Vec<&str> {
        hospitals.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_displayed_respects_legend() {
        let hospitals = sample();
        let filters = Filters::default();

        let all = compute_displayed(&hospitals, &filters, &Status::ALL);
        assert_eq!(ids(&all), vec!["1", "2", "3", "4"]);

        let deployed = compute_displayed(&hospitals, &filters, &[Status::Deployed]);
        assert_eq!(ids(&deployed), vec!["1", "4"]);

        assert!(compute_displayed(&hospitals, &filters, &[]).is_empty());
    }

    #[test]
    fn test_no_filters_keeps_all_in_order() {
        let hospitals = sample();
        let visible = compute_visible(&hospitals, &Filters::default());
        assert_eq!(ids(&visible), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_status_filter_scenario() {
        let hospitals = vec![
            Hospital::new("1", 48.85, 2.35, Status::Deployed, "A", "Paris, France"),
            Hospital::new("2", 45.0, -1.0, Status::Signed, "B", "Bordeaux, France"),
        ];
        let filters = Filters {
            statuses: vec![Status::Deployed],
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["1"]);
    }

    #[test]
    fn test_idempotent() {
        let hospitals = sample();
        let filters = Filters {
            country: "france".to_string(),
            ..Default::default()
        };
        let first = compute_visible(&hospitals, &filters);
        let second = compute_visible(&hospitals, &filters);
        assert_eq!(first, second);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let hospitals = sample();
        let filters = Filters {
            search_term: "NECKER".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["1"]);
    }

    #[test]
    fn test_continent_filter() {
        let hospitals = sample();
        let filters = Filters {
            continent: "Europe".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["1", "2", "4"]);

        let filters = Filters {
            continent: "North America".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["3"]);
    }

    #[test]
    fn test_unknown_continent_fails_filter() {
        let hospitals = vec![Hospital::new("x", -80.0, 0.0, Status::Signed, "Polar", "Base, Antarctica")];
        for continent in ["Europe", "Unknown", "Atlantis"] {
            let filters = Filters {
                continent: continent.to_string(),
                ..Default::default()
            };
            assert!(compute_visible(&hospitals, &filters).is_empty(), "{continent}");
        }
    }

    #[test]
    fn test_country_and_city() {
        let hospitals = sample();
        let filters = Filters {
            country: "France".to_string(),
            city: "bordeaux".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["2"]);
    }

    #[test]
    fn test_date_range_excludes_missing_and_unparseable() {
        let hospitals = sample();
        let filters = Filters {
            date_range: Some(DateRange {
                from: NaiveDate::from_ymd_opt(2023, 1, 1),
                to: None,
            }),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["1", "4"]);

        let filters = Filters {
            date_range: Some(DateRange {
                from: None,
                to: NaiveDate::from_ymd_opt(2023, 12, 31),
            }),
            ..Default::default()
        };
        assert_eq!(ids(&compute_visible(&hospitals, &filters)), vec!["1"]);
    }

    #[test]
    fn test_matches_single() {
        let hospitals = sample();
        let filters = Filters {
            statuses: vec![Status::Signed],
            ..Default::default()
        };
        assert!(!matches(&hospitals[0], &filters));
        assert!(matches(&hospitals[1], &filters));
    }

    #[test]
    fn test_compute_stats() {
        let hospitals = sample();
        let visible = compute_visible(
            &hospitals,
            &Filters {
                statuses: vec![Status::Deployed],
                ..Default::default()
            },
        );
        let stats = compute_stats(&hospitals, &visible);
        assert_eq!(
            stats,
            Stats {
                total: 4,
                deployed: 2,
                in_progress: 1,
                signed: 1,
                visible: 2,
            }
        );
    }

    #[test]
    fn test_unique_countries_and_cities() {
        let hospitals = sample();
        assert_eq!(unique_countries(&hospitals), vec!["France", "USA", "United Kingdom"]);
        assert_eq!(unique_cities(&hospitals, Some("france")), vec!["Bordeaux", "Paris"]);
        assert_eq!(unique_cities(&hospitals, None).len(), 4);
    }
}
