//! Rebuild generations
//!
//! Every full rebuild bumps the generation. Work captured under an older
//! generation is stale and must be discarded instead of applied.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Monotonic rebuild number
pub type Generation = u64;

/// Shared generation counter
///
/// Clones observe the same counter.
///
/// # Example
///
/// ```
/// use hospital_map_scheduler::GenerationCounter;
///
/// let counter = GenerationCounter::new();
/// let captured = counter.current();
/// counter.bump();
/// assert!(counter.is_stale(captured));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation
    pub fn current(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    /// Start a new generation and return it
    pub fn bump(&self) -> Generation {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(generation, "generation advanced");
        generation
    }

    /// Whether work captured at `generation` has been superseded
    pub fn is_stale(&self, generation: Generation) -> bool {
        generation != self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_is_monotonic() {
        let counter = GenerationCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.bump(), 1);
        assert_eq!(counter.bump(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_staleness() {
        let counter = GenerationCounter::new();
        let first = counter.bump();
        assert!(!counter.is_stale(first));

        counter.bump();
        assert!(counter.is_stale(first));
    }

    #[test]
    fn test_clones_share_state() {
        let counter = GenerationCounter::new();
        let other = counter.clone();
        other.bump();
        assert_eq!(counter.current(), 1);
    }
}
