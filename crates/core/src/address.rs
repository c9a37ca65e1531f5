//! Free-form address parsing
//!
//! Addresses are comma separated with the country last. The segment before
//! the country holds the city, usually with a postal code attached
//! ("75001 Paris", "SW1A 1AA London", "Toronto ON M5G 1X8").

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Components extracted from an address
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAddress {
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: Option<String>,
}

/// Postal code patterns, most specific first
fn postal_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // US ZIP / ZIP+4, FR, DE, ES, IT
            r"\b\d{5}(?:-\d{4})?\b",
            // IN, CN, RU
            r"\b\d{6}\b",
            // JP
            r"\b\d{3}-\d{4}\b",
            // CA
            r"\b[ABCEGHJ-NPRSTVXY]\d[A-Z]\s?\d[A-Z]\d\b",
            // UK
            r"\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b",
            // NL
            r"\b\d{4}\s?[A-Z]{2}\b",
            // BE, CH, AT, AU, DK
            r"\b\d{4}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Parse an address into street, city, country and postal code.
///
/// # Example
///
/// ```
/// use hospital_map_core::parse_address;
///
/// let parsed = parse_address("12 Rue X, 75001 Paris, France");
/// assert_eq!(parsed.city, "Paris");
/// assert_eq!(parsed.postal_code.as_deref(), Some("75001"));
/// assert_eq!(parsed.country, "France");
/// ```
pub fn parse_address(address: &str) -> ParsedAddress {
    let segments: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let Some((&country, rest)) = segments.split_last() else {
        return ParsedAddress::default();
    };

    let mut parsed = ParsedAddress {
        country: country.to_string(),
        ..Default::default()
    };

    let Some((&candidate, street)) = rest.split_last() else {
        return parsed;
    };
    parsed.street = street.join(", ");

    let (city, postal_code) = split_postal_code(candidate);
    parsed.city = city;
    parsed.postal_code = postal_code;
    parsed
}

fn split_postal_code(candidate: &str) -> (String, Option<String>) {
    for pattern in postal_patterns() {
        if let Some(found) = pattern.find(candidate) {
            let mut city = String::with_capacity(candidate.len());
            city.push_str(&candidate[..found.start()]);
            city.push(' ');
            city.push_str(&candidate[found.end()..]);

            let city = city.split_whitespace().collect::<Vec<_>>().join(" ");
            return (city, Some(found.as_str().to_string()));
        }
    }
    (candidate.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_french_address() {
        let parsed = parse_address("12 Rue X, 75001 Paris, France");
        assert_eq!(
            parsed,
            ParsedAddress {
                street: "12 Rue X".to_string(),
                city: "Paris".to_string(),
                country: "France".to_string(),
                postal_code: Some("75001".to_string()),
            }
        );
    }

    #[test]
    fn test_us_zip_plus_four() {
        let parsed = parse_address("1 Main St, Suite 4, Boston 02114-2696, USA");
        assert_eq!(parsed.street, "1 Main St, Suite 4");
        assert_eq!(parsed.city, "Boston");
        assert_eq!(parsed.postal_code.as_deref(), Some("02114-2696"));
        assert_eq!(parsed.country, "USA");
    }

    #[test]
    fn test_uk_postcode() {
        let parsed = parse_address("Great Ormond St, London WC1N 3JH, United Kingdom");
        assert_eq!(parsed.city, "London");
        assert_eq!(parsed.postal_code.as_deref(), Some("WC1N 3JH"));
    }

    #[test]
    fn test_canadian_postcode() {
        let parsed = parse_address("555 University Ave, Toronto ON M5G 1X8, Canada");
        assert_eq!(parsed.city, "Toronto ON");
        assert_eq!(parsed.postal_code.as_deref(), Some("M5G 1X8"));
    }

    #[test]
    fn test_dutch_postcode() {
        let parsed = parse_address("Meibergdreef 9, 1105 AZ Amsterdam, Netherlands");
        assert_eq!(parsed.city, "Amsterdam");
        assert_eq!(parsed.postal_code.as_deref(), Some("1105 AZ"));
    }

    #[test]
    fn test_four_digit_postcode() {
        let parsed = parse_address("Rue Y, 1000 Bruxelles, Belgium");
        assert_eq!(parsed.city, "Bruxelles");
        assert_eq!(parsed.postal_code.as_deref(), Some("1000"));
    }

    #[test]
    fn test_city_without_postcode() {
        let parsed = parse_address("Lyon, France");
        assert_eq!(parsed.city, "Lyon");
        assert!(parsed.postal_code.is_none());
        assert!(parsed.street.is_empty());
    }

    #[test]
    fn test_single_segment_is_country() {
        let parsed = parse_address("Japan");
        assert_eq!(parsed.country, "Japan");
        assert!(parsed.city.is_empty());
    }

    #[test]
    fn test_empty_and_blank_segments() {
        assert_eq!(parse_address(""), ParsedAddress::default());
        assert_eq!(parse_address(" , ,"), ParsedAddress::default());

        let parsed = parse_address("Paris, , France");
        assert_eq!(parsed.city, "Paris");
        assert_eq!(parsed.country, "France");
    }
}
