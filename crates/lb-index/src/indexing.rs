//! Dense indexing for matrix integration.
//!
//! Provides bidirectional mappings between domain keys and contiguous
//! matrix positions (0..N).

use std::collections::HashMap;
use std::hash::Hash;

use crate::descriptor::ImpactDescriptor;
use crate::error::{IndexError, IndexResult};

/// Index map providing stable, contiguous positions for matrix keys.
///
/// Positions are handed out in insertion order and never change; the index
/// only grows. Provides O(1) bidirectional lookup between keys and positions.
#[derive(Debug, Clone)]
pub struct MatrixIndex<K> {
    /// Contiguous list of keys (position -> key).
    keys: Vec<K>,

    /// Reverse lookup: key -> position.
    positions: HashMap<K, usize>,
}

/// Impact categories need nothing beyond the plain index.
pub type ImpactIndex = MatrixIndex<ImpactDescriptor>;

impl<K> Default for MatrixIndex<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> MatrixIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Build an index from keys in order; duplicates keep their first position.
    pub fn from_keys(keys: impl IntoIterator<Item = K>) -> Self {
        let mut index = Self::new();
        for key in keys {
            index.add(key);
        }
        index
    }

    /// Number of keys in the index.
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get the position of a key.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// Get the key at a position (panics if out of bounds).
    pub fn key_at(&self, position: usize) -> &K {
        &self.keys[position]
    }

    /// Get the key at a position.
    pub fn get(&self, position: usize) -> IndexResult<&K> {
        self.keys.get(position).ok_or(IndexError::PositionOob {
            position,
            len: self.keys.len(),
        })
    }

    /// Add a key and return its position. Adding a key twice returns the
    /// position it already has.
    pub fn add(&mut self, key: K) -> usize {
        if let Some(&pos) = self.positions.get(&key) {
            return pos;
        }
        let pos = self.keys.len();
        self.positions.insert(key.clone(), pos);
        self.keys.push(key);
        pos
    }

    /// Add all keys of another index that are not yet present.
    pub fn add_all(&mut self, other: &MatrixIndex<K>) {
        for key in other.keys() {
            self.add(key.clone());
        }
    }

    /// Visit every key in ascending position order.
    pub fn each(&self, mut visitor: impl FnMut(usize, &K)) {
        for (pos, key) in self.keys.iter().enumerate() {
            visitor(pos, key);
        }
    }

    /// Iterate over `(position, key)` pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> {
        self.keys.iter().enumerate()
    }

    /// All keys in position order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// For every position of this index, the position of the same key in
    /// `other`, or `None` when `other` does not contain it.
    pub fn map_to(&self, other: &MatrixIndex<K>) -> Vec<Option<usize>> {
        self.keys.iter().map(|key| other.position(key)).collect()
    }
}
