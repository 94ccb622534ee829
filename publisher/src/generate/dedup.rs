//! Deduplication of sub-entities within one generator run
//!
//! Hierarchical reports can reach the same entity through more than one
//! path (a test case listed under a suite and under an aggregate, an agent
//! that ran several pipeline stages). Generators key each entity by its
//! structural identity and emit only the first visit.

use std::collections::HashSet;
use std::hash::Hash;

/// Remembers structural keys already emitted
#[derive(Debug)]
pub struct Deduplicator<K> {
    seen: HashSet<K>,
}

impl<K: Hash + Eq> Deduplicator<K> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Returns true if this key is new, false for a repeat visit
    pub fn check(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<K: Hash + Eq> Default for Deduplicator<K> {
    fn default() -> Self {
        Self::new()
    }
}
