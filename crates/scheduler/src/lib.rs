//! Hospital Map Scheduler Library
//!
//! Visible-first chunk scheduling for marker rendering.
//!
//! Markers are created in fixed-size chunks so the host's main thread stays
//! responsive. Chunks for hospitals inside the viewport are queued as
//! [`ChunkPriority::Visible`] and drained on animation frames; the rest are
//! [`ChunkPriority::Deferred`] and drained when the host is idle. Each chunk
//! carries the rebuild generation it was created under so superseded work
//! can be dropped.
//!
//! # Example
//!
//! ```
//! use hospital_map_scheduler::{ChunkPriority, ChunkQueue, GeoBounds, GenerationCounter};
//!
//! let viewport = GeoBounds::new(40.0, -5.0, 50.0, 10.0);
//! let generations = GenerationCounter::new();
//! let queue = ChunkQueue::new();
//!
//! let generation = generations.bump();
//! queue.push(viewport.priority_for(48.85, 2.35), generation, vec!["paris"]);
//! queue.push(viewport.priority_for(-33.9, 18.4), generation, vec!["cape-town"]);
//!
//! let chunk = queue.pop().unwrap();
//! assert_eq!(chunk.priority, ChunkPriority::Visible);
//! assert!(!generations.is_stale(chunk.generation));
//! ```

pub mod bounds;
pub mod frame_budget;
pub mod generation;
pub mod priority;

pub use bounds::GeoBounds;
pub use frame_budget::{ChunkedOperation, FrameBudget, FRAME_BUDGET_60FPS, IDLE_BUDGET};
pub use generation::{Generation, GenerationCounter};
pub use priority::{Chunk, ChunkId, ChunkPriority, ChunkQueue};
