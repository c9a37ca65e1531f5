//! Coordinate and URL validation.

use url::Url;

/// Schemes that carry a host and therefore go through the host allow-list
const HIERARCHICAL_SCHEMES: [&str; 2] = ["http", "https"];

/// Returns `true` if both values are finite and within world bounds
/// (`[-90, 90]` latitude, `[-180, 180]` longitude).
pub fn validate_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Validate a URL against a protocol and host allow-list.
///
/// The URL must parse and use one of `allowed_protocols`. For `http` and
/// `https` the host must equal one of `allowed_hosts` or be a subdomain of
/// one. `mailto:` and `tel:` carry no host and only need an allowed scheme.
///
/// # Example
///
/// ```
/// use hospital_map_security::validate_url;
///
/// let protocols = vec!["https".to_string()];
/// let hosts = vec!["openstreetmap.org".to_string()];
///
/// assert!(validate_url("https://tile.openstreetmap.org/1/1/1.png", &protocols, &hosts));
/// assert!(!validate_url("https://evil-openstreetmap.org/", &protocols, &hosts));
/// ```
pub fn validate_url(url: &str, allowed_protocols: &[String], allowed_hosts: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    let scheme = parsed.scheme();
    if !allowed_protocols.iter().any(|p| p.eq_ignore_ascii_case(scheme)) {
        return false;
    }

    if !HIERARCHICAL_SCHEMES.contains(&scheme) {
        return true;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    allowed_hosts.iter().any(|allowed| {
        let allowed = allowed.to_ascii_lowercase();
        host == allowed || host.ends_with(&format!(".{allowed}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocols() -> Vec<String> {
        ["http", "https", "mailto", "tel"].iter().map(|s| s.to_string()).collect()
    }

    fn hosts() -> Vec<String> {
        vec!["openstreetmap.org".to_string(), "example.com".to_string()]
    }

    #[test]
    fn test_valid_coordinates() {
        assert!(validate_coordinates(48.85, 2.35));
        assert!(validate_coordinates(-90.0, 180.0));
        assert!(validate_coordinates(90.0, -180.0));
        assert!(validate_coordinates(0.0, 0.0));
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(!validate_coordinates(90.1, 0.0));
        assert!(!validate_coordinates(0.0, -180.5));
        assert!(!validate_coordinates(f64::NAN, 0.0));
        assert!(!validate_coordinates(0.0, f64::INFINITY));
    }

    #[test]
    fn test_allowed_hosts_and_subdomains() {
        assert!(validate_url("https://openstreetmap.org", &protocols(), &hosts()));
        assert!(validate_url("https://a.tile.openstreetmap.org/1/2/3.png", &protocols(), &hosts()));
        assert!(validate_url("http://EXAMPLE.com/path", &protocols(), &hosts()));
    }

    #[test]
    fn test_lookalike_hosts_rejected() {
        assert!(!validate_url("https://notexample.com", &protocols(), &hosts()));
        assert!(!validate_url("https://example.com.attacker.net", &protocols(), &hosts()));
    }

    #[test]
    fn test_disallowed_schemes_rejected() {
        assert!(!validate_url("javascript:alert(1)", &protocols(), &hosts()));
        assert!(!validate_url("ftp://example.com/file", &protocols(), &hosts()));
        assert!(!validate_url("data:text/html,<b>x</b>", &protocols(), &hosts()));
    }

    #[test]
    fn test_hostless_schemes() {
        assert!(validate_url("mailto:contact@example.org", &protocols(), &hosts()));
        assert!(validate_url("tel:+33123456789", &protocols(), &hosts()));
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(!validate_url("not a url", &protocols(), &hosts()));
        assert!(!validate_url("", &protocols(), &hosts()));
    }
}
