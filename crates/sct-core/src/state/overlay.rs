//! Ordered write overlay for one tracking frame
//!
//! Writes are kept in a `BTreeMap` so folding a frame into its parent, or
//! into the base store, visits keys in the same order on every node.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMap<K, V> {
    writes: BTreeMap<K, V>,
}

impl<K: Ord, V> OverlayMap<K, V> {
    pub fn new() -> Self {
        Self {
            writes: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.writes.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.writes.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.writes.contains_key(key)
    }

    pub fn set(&mut self, key: K, value: V) {
        self.writes.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Move every write into `apply`, leaving the overlay empty
    pub fn drain_to<M>(&mut self, mut apply: M)
    where
        M: FnMut(K, V),
    {
        let writes = std::mem::take(&mut self.writes);
        for (key, value) in writes {
            apply(key, value);
        }
    }

    pub fn into_inner(self) -> BTreeMap<K, V> {
        self.writes
    }
}

impl<K: Ord, V> Default for OverlayMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
