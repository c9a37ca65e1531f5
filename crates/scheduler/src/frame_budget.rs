//! Frame budget tracking for main-thread responsiveness
//!
//! Marker creation runs in chunks between frames. [`FrameBudget`] bounds how
//! long an idle callback may keep draining chunks, and [`ChunkedOperation`]
//! tracks how far a rebuild has progressed across frames.

use std::time::{Duration, Instant};

/// Frame budget for 60 FPS displays (16.67ms)
pub const FRAME_BUDGET_60FPS: Duration = Duration::from_micros(16_667);

/// Budget for one idle callback
pub const IDLE_BUDGET: Duration = Duration::from_millis(50);

/// Time left for event processing at the end of a budget
pub const EVENT_PROCESSING_RESERVE: Duration = Duration::from_millis(5);

/// Time budget for one callback
#[derive(Debug, Clone)]
pub struct FrameBudget {
    frame_start: Instant,
    budget: Duration,
    reserved: Duration,
    check_count: u32,
}

impl FrameBudget {
    /// Budget starting now
    pub fn new(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    /// Budget whose clock started at `start`
    pub fn starting_at(start: Instant, budget: Duration) -> Self {
        Self {
            frame_start: start,
            budget,
            reserved: EVENT_PROCESSING_RESERVE.min(budget),
            check_count: 0,
        }
    }

    pub fn for_60fps() -> Self {
        Self::new(FRAME_BUDGET_60FPS)
    }

    /// Budget for an idle callback that started at `start`
    pub fn for_idle(start: Instant) -> Self {
        Self::starting_at(start, IDLE_BUDGET)
    }

    /// Set the reserve kept for event processing
    pub fn with_reserve(mut self, reserved: Duration) -> Self {
        self.reserved = reserved.min(self.budget);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.frame_start.elapsed()
    }

    /// Time left before the reserve is reached
    pub fn remaining(&self) -> Duration {
        self.budget
            .saturating_sub(self.reserved)
            .saturating_sub(self.elapsed())
    }

    pub fn is_exceeded(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Check whether the caller should hand control back to the host
    pub fn should_yield(&mut self) -> bool {
        self.check_count += 1;
        self.is_exceeded()
    }

    /// Number of `should_yield` checks so far
    pub fn check_count(&self) -> u32 {
        self.check_count
    }
}

/// Progress of a chunked rebuild
///
/// # Example
///
/// ```
/// use hospital_map_scheduler::ChunkedOperation;
///
/// let mut op = ChunkedOperation::new(120, 50);
/// assert_eq!(op.chunk_count(), 3);
///
/// op.advance(50);
/// op.complete_frame();
/// assert_eq!(op.remaining(), 70);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedOperation {
    total: usize,
    processed: usize,
    chunk_size: usize,
    frames_used: u32,
}

impl Default for ChunkedOperation {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl ChunkedOperation {
    pub fn new(total: usize, chunk_size: usize) -> Self {
        Self {
            total,
            processed: 0,
            chunk_size: chunk_size.max(1),
            frames_used: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }

    /// Progress from 0.0 to 100.0
    pub fn progress_percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f32 / self.total as f32) * 100.0
    }

    /// Record `count` items as handled, capped at the total
    pub fn advance(&mut self, count: usize) {
        self.processed = self.processed.saturating_add(count).min(self.total);
    }

    pub fn complete_frame(&mut self) {
        self.frames_used += 1;
    }

    pub fn frames_used(&self) -> u32 {
        self.frames_used
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks the whole operation splits into
    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }
}
