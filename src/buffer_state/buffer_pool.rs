//! Bounded pool of scratch buffers.
//!
//! Entries are handed out from a free list in FIFO order, like free buckets in
//! a bucket allocator. The pool never blocks and never grows: when it is empty,
//! the caller simply stops scheduling until a running task gives one back.

use std::collections::{HashSet, VecDeque};

use log::trace;

use super::section_buffers::SectionBuffers;

pub struct BufferPool {
    free: VecDeque<SectionBuffers>,
    outstanding: HashSet<usize>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize, vertex_capacity: usize, index_capacity: usize) -> Self {
        let free = (0..capacity)
            .map(|id| SectionBuffers::new(id, vertex_capacity, index_capacity))
            .collect();

        Self {
            free,
            outstanding: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Takes a free entry, or `None` when every entry is held by a task.
    pub fn acquire(&mut self) -> Option<SectionBuffers> {
        let entry = self.free.pop_front()?;
        self.outstanding.insert(entry.id());
        trace!("Acquired scratch buffers #{}", entry.id());
        Some(entry)
    }

    /// Returns an entry taken with [`BufferPool::acquire`]. The caller clears or
    /// resets it first.
    pub fn release(&mut self, entry: SectionBuffers) {
        let was_outstanding = self.outstanding.remove(&entry.id());
        debug_assert!(
            was_outstanding,
            "scratch buffers #{} released twice or not from this pool",
            entry.id()
        );
        debug_assert!(self.free.len() < self.capacity, "pool released beyond capacity");

        if was_outstanding {
            trace!("Released scratch buffers #{}", entry.id());
            self.free.push_back(entry);
        }
    }

    pub fn has_no_available_builder(&self) -> bool {
        self.free.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_until_exhausted() {
        let mut pool = BufferPool::new(2, 4, 6);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(pool.acquire().is_none());
        assert!(pool.has_no_available_builder());

        pool.release(a);
        assert_eq!(pool.available_count(), 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn entries_are_reused_in_release_order() {
        let mut pool = BufferPool::new(2, 4, 6);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let (a_id, b_id) = (a.id(), b.id());

        pool.release(b);
        pool.release(a);

        assert_eq!(pool.acquire().unwrap().id(), b_id);
        assert_eq!(pool.acquire().unwrap().id(), a_id);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    #[cfg(debug_assertions)]
    fn foreign_release_is_caught() {
        let mut pool = BufferPool::new(1, 4, 6);
        pool.release(SectionBuffers::new(0, 4, 6));
    }
}
