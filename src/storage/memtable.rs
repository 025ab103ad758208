use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::storage::key::StoreKey;

/// One logical value in the store: a single payload byte plus the
/// tombstone flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
    pub value: u8,
    pub deleted: bool,
}

impl Entry {
    pub fn live(value: u8) -> Self {
        Entry {
            value,
            deleted: false,
        }
    }

    pub fn tombstone() -> Self {
        Entry {
            value: 0,
            deleted: true,
        }
    }
}

/// Ordered in-memory write buffer in front of the disk segments.
/// Deletions are recorded as tombstones so they shadow older segment
/// entries until the next eviction.
pub(crate) struct Memtable<K: StoreKey> {
    map: RwLock<BTreeMap<K, Entry>>,
}

impl<K: StoreKey> Memtable<K> {
    pub fn new() -> Self {
        Memtable {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, key: K, entry: Entry) {
        self.map.write().insert(key, entry);
    }

    pub fn get(&self, key: &K) -> Option<Entry> {
        self.map.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Smallest entry at or after the bound.
    pub fn next_at_or_after(&self, lower: Bound<K>) -> Option<(K, Entry)> {
        self.map
            .read()
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(k, e)| (*k, *e))
    }

    /// Largest entry at or before the bound.
    pub fn prev_at_or_before(&self, upper: Bound<K>) -> Option<(K, Entry)> {
        self.map
            .read()
            .range((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, e)| (*k, *e))
    }

    /// Takes the whole buffer, sorted, leaving the memtable empty.
    pub fn drain_sorted(&self) -> Vec<(K, Entry)> {
        let map = std::mem::take(&mut *self.map.write());
        map.into_iter().collect()
    }
}
