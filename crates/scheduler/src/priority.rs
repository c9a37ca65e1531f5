//! Chunk priority queue
//!
//! Marker chunks are queued by priority: chunks whose hospitals lie inside
//! the viewport are drained before chunks outside it. Within one priority
//! chunks come out in the order they were pushed.

use crate::generation::Generation;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

/// Unique identifier for a queued chunk
pub type ChunkId = u64;

/// Chunk priority levels
///
/// Higher numeric values are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkPriority {
    /// Outside the viewport; processed when the host is idle
    Deferred = 0,

    /// Inside the viewport; processed on animation frames
    Visible = 1,
}

impl ChunkPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkPriority::Deferred => "deferred",
            ChunkPriority::Visible => "visible",
        }
    }
}

/// A batch of work items tagged with the generation that produced it
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    pub id: ChunkId,
    pub priority: ChunkPriority,
    pub generation: Generation,
    pub items: Vec<T>,
    insertion_order: u64,
}

impl<T> Chunk<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> PartialEq for Chunk<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Chunk<T> {}

impl<T> PartialOrd for Chunk<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Chunk<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

struct QueueState<T> {
    heap: BinaryHeap<Chunk<T>>,
    next_chunk_id: ChunkId,
    insertion_counter: u64,
}

/// Priority queue of marker chunks
///
/// Cloning the queue shares the underlying state.
///
/// # Example
///
/// ```
/// use hospital_map_scheduler::{ChunkPriority, ChunkQueue};
///
/// let queue = ChunkQueue::new();
/// queue.push(ChunkPriority::Deferred, 1, vec!["far"]);
/// queue.push(ChunkPriority::Visible, 1, vec!["near"]);
///
/// let first = queue.pop().unwrap();
/// assert_eq!(first.items, vec!["near"]);
/// ```
pub struct ChunkQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,
}

impl<T> Clone for ChunkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for ChunkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChunkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> ChunkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_chunk_id: 1,
                insertion_counter: 0,
            })),
        }
    }

    /// Queue a chunk and return its id
    pub fn push(&self, priority: ChunkPriority, generation: Generation, items: Vec<T>) -> ChunkId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_chunk_id;
        state.next_chunk_id += 1;

        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state.heap.push(Chunk {
            id,
            priority,
            generation,
            items,
            insertion_order,
        });
        id
    }

    /// Pop the highest priority chunk
    pub fn pop(&self) -> Option<Chunk<T>> {
        self.state.lock().unwrap().heap.pop()
    }

    /// Pop the next chunk only if it has exactly `priority`
    pub fn pop_priority(&self, priority: ChunkPriority) -> Option<Chunk<T>> {
        let mut state = self.state.lock().unwrap();
        match state.heap.peek() {
            Some(chunk) if chunk.priority == priority => state.heap.pop(),
            _ => None,
        }
    }

    /// Priority of the chunk that would be popped next
    pub fn peek_priority(&self) -> Option<ChunkPriority> {
        self.state.lock().unwrap().heap.peek().map(|c| c.priority)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().heap.is_empty()
    }

    /// Number of queued chunks with `priority`
    pub fn count(&self, priority: ChunkPriority) -> usize {
        self.state
            .lock()
            .unwrap()
            .heap
            .iter()
            .filter(|c| c.priority == priority)
            .count()
    }

    /// Drop every queued chunk, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let dropped = state.heap.len();
        state.heap.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "chunk queue cleared");
        }
        dropped
    }

    /// Remove all chunks matching `predicate`
    ///
    /// Returns the number of chunks removed.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Chunk<T>) -> bool,
    {
        let mut state = self.state.lock().unwrap();
        let original_len = state.heap.len();
        let heap = std::mem::take(&mut state.heap);
        state.heap = heap.into_iter().filter(|c| !predicate(c)).collect();
        let removed = original_len - state.heap.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = state.heap.len(), "chunks removed from queue");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_before_deferred() {
        let queue = ChunkQueue::new();
        queue.push(ChunkPriority::Deferred, 0, vec![1]);
        queue.push(ChunkPriority::Visible, 0, vec![2]);
        queue.push(ChunkPriority::Deferred, 0, vec![3]);

        assert_eq!(queue.pop().unwrap().priority, ChunkPriority::Visible);
        assert_eq!(queue.pop().unwrap().priority, ChunkPriority::Deferred);
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = ChunkQueue::new();
        for i in 0..5 {
            queue.push(ChunkPriority::Visible, 0, vec![i]);
        }

        let order: Vec<i32> = std::iter::from_fn(|| queue.pop())
            .flat_map(|c| c.items)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_pop_priority_only_matches_head() {
        let queue = ChunkQueue::new();
        queue.push(ChunkPriority::Deferred, 0, vec!["a"]);

        assert!(queue.pop_priority(ChunkPriority::Visible).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_priority(ChunkPriority::Deferred).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_if_by_generation() {
        let queue = ChunkQueue::new();
        queue.push(ChunkPriority::Visible, 1, vec![1]);
        queue.push(ChunkPriority::Deferred, 1, vec![2]);
        queue.push(ChunkPriority::Visible, 2, vec![3]);

        assert_eq!(queue.remove_if(|c| c.generation < 2), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().items, vec![3]);
    }

    #[test]
    fn test_counts_and_clear() {
        let queue = ChunkQueue::new();
        queue.push(ChunkPriority::Visible, 0, vec![1]);
        queue.push(ChunkPriority::Deferred, 0, vec![2]);
        queue.push(ChunkPriority::Deferred, 0, vec![3]);

        assert_eq!(queue.count(ChunkPriority::Visible), 1);
        assert_eq!(queue.count(ChunkPriority::Deferred), 2);
        assert_eq!(queue.peek_priority(), Some(ChunkPriority::Visible));

        let shared = queue.clone();
        assert_eq!(shared.clear(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let queue: ChunkQueue<u8> = ChunkQueue::new();
        let a = queue.push(ChunkPriority::Visible, 0, vec![]);
        let b = queue.push(ChunkPriority::Visible, 0, vec![]);
        assert_ne!(a, b);
    }
}
