//! Off-screen marker eviction decision
//!
//! Pure function over marker positions; the engine performs the removals.

use hospital_map_scheduler::GeoBounds;

/// Ids of markers to evict.
///
/// Nothing is evicted until more than `threshold` markers are live. Past
/// that, every marker outside `viewport` padded by `padding` goes.
///
/// # Example
///
/// ```
/// use hospital_map_render::eviction::plan_eviction;
/// use hospital_map_scheduler::GeoBounds;
///
/// let viewport = GeoBounds::new(0.0, 0.0, 10.0, 10.0);
/// let markers = [("near", 12.0, 5.0), ("far", 40.0, 5.0)];
///
/// assert!(plan_eviction(markers, &viewport, 0.5, 5).is_empty());
/// assert_eq!(plan_eviction(markers, &viewport, 0.5, 1), vec!["far".to_string()]);
/// ```
pub fn plan_eviction<'a, I>(markers: I, viewport: &GeoBounds, padding: f64, threshold: usize) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, f64, f64)>,
    I::IntoIter: ExactSizeIterator,
{
    let markers = markers.into_iter();
    if markers.len() <= threshold {
        return Vec::new();
    }

    let keep = viewport.pad(padding);
    markers
        .filter(|(_, lat, lon)| !keep.contains(*lat, *lon))
        .map(|(id, _, _)| id.to_string())
        .collect()
}
