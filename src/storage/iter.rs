use std::ops::Bound;
use std::sync::Arc;

use crate::core::error::Result;
use crate::storage::key::StoreKey;
use crate::storage::memtable::Entry;
use crate::storage::segment::Segment;
use crate::storage::store::KvStore;

// Source rank used to break ties between overlapping versions of the
// same key: the memtable always wins, then the segment with the highest
// sequence number.
const MEMTABLE_RANK: u64 = u64::MAX;

fn bound_satisfied<K: Ord>(bound: &Bound<K>, key: &K, forward: bool) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(b) => {
            if forward {
                key >= b
            } else {
                key <= b
            }
        }
        Bound::Excluded(b) => {
            if forward {
                key > b
            } else {
                key < b
            }
        }
    }
}

/// Forward ordered iterator over the live keys of a store. `seek`
/// positions at the first key `>=` the target; `next` then walks keys in
/// ascending order, resolving the newest version of each and skipping
/// tombstones.
///
/// The segment list and memtable are read live on every step, so keys
/// moved to disk by a concurrent eviction stay visible.
pub struct StoreIter<'a, K: StoreKey> {
    store: &'a KvStore<K>,
    position: Bound<K>,
}

impl<'a, K: StoreKey> StoreIter<'a, K> {
    pub(crate) fn new(store: &'a KvStore<K>) -> Self {
        StoreIter {
            store,
            position: Bound::Unbounded,
        }
    }

    pub fn seek(&mut self, key: &K) {
        self.position = Bound::Included(*key);
    }

    pub fn next(&mut self) -> Result<Option<(K, u8)>> {
        loop {
            let Some((key, entry)) = pick_forward(self.store, &self.position)? else {
                return Ok(None);
            };
            self.position = Bound::Excluded(key);
            if entry.deleted {
                continue;
            }
            return Ok(Some((key, entry.value)));
        }
    }
}

/// Reverse ordered iterator. `seek` positions at the last key `<=` the
/// target; `next` walks keys in descending order.
pub struct RevStoreIter<'a, K: StoreKey> {
    store: &'a KvStore<K>,
    position: Bound<K>,
}

impl<'a, K: StoreKey> RevStoreIter<'a, K> {
    pub(crate) fn new(store: &'a KvStore<K>) -> Self {
        RevStoreIter {
            store,
            position: Bound::Unbounded,
        }
    }

    pub fn seek(&mut self, key: &K) {
        self.position = Bound::Included(*key);
    }

    pub fn next(&mut self) -> Result<Option<(K, u8)>> {
        loop {
            let Some((key, entry)) = pick_reverse(self.store, &self.position)? else {
                return Ok(None);
            };
            self.position = Bound::Excluded(key);
            if entry.deleted {
                continue;
            }
            return Ok(Some((key, entry.value)));
        }
    }
}

fn segment_candidate_forward<K: StoreKey>(
    segment: &Segment<K>,
    position: &Bound<K>,
) -> Result<Option<(K, Entry)>> {
    let idx = match position {
        Bound::Unbounded => 0,
        Bound::Included(k) => segment.lower_bound(k, false)?,
        Bound::Excluded(k) => segment.lower_bound(k, true)?,
    };
    if idx < segment.entry_count() {
        Ok(Some(segment.entry(idx)?))
    } else {
        Ok(None)
    }
}

fn segment_candidate_reverse<K: StoreKey>(
    segment: &Segment<K>,
    position: &Bound<K>,
) -> Result<Option<(K, Entry)>> {
    // Number of entries strictly before the bound; the candidate is the
    // one just under it.
    let end = match position {
        Bound::Unbounded => segment.entry_count(),
        Bound::Included(k) => segment.lower_bound(k, true)?,
        Bound::Excluded(k) => segment.lower_bound(k, false)?,
    };
    if end > 0 {
        Ok(Some(segment.entry(end - 1)?))
    } else {
        Ok(None)
    }
}

/// Replaces `best` when the candidate key comes first in iteration
/// order, or is the same key from a newer source.
fn consider<K: StoreKey>(
    best: &mut Option<(K, Entry, u64)>,
    key: K,
    entry: Entry,
    rank: u64,
    forward: bool,
) {
    match best {
        None => *best = Some((key, entry, rank)),
        Some((best_key, _, best_rank)) => {
            let earlier = if forward {
                key < *best_key
            } else {
                key > *best_key
            };
            if earlier || (key == *best_key && rank > *best_rank) {
                *best = Some((key, entry, rank));
            }
        }
    }
}

fn pick_forward<K: StoreKey>(
    store: &KvStore<K>,
    position: &Bound<K>,
) -> Result<Option<(K, Entry)>> {
    let mut best: Option<(K, Entry, u64)> = None;
    if let Some((key, entry)) = store.memtable().next_at_or_after(*position) {
        best = Some((key, entry, MEMTABLE_RANK));
    }
    let segments: Arc<Vec<Arc<Segment<K>>>> = store.segments_snapshot();
    for segment in segments.iter() {
        let Some((key, entry)) = segment_candidate_forward(segment, position)? else {
            continue;
        };
        debug_assert!(bound_satisfied(position, &key, true));
        consider(&mut best, key, entry, segment.sequence(), true);
    }
    Ok(best.map(|(k, e, _)| (k, e)))
}

fn pick_reverse<K: StoreKey>(
    store: &KvStore<K>,
    position: &Bound<K>,
) -> Result<Option<(K, Entry)>> {
    let mut best: Option<(K, Entry, u64)> = None;
    if let Some((key, entry)) = store.memtable().prev_at_or_before(*position) {
        best = Some((key, entry, MEMTABLE_RANK));
    }
    let segments: Arc<Vec<Arc<Segment<K>>>> = store.segments_snapshot();
    for segment in segments.iter() {
        let Some((key, entry)) = segment_candidate_reverse(segment, position)? else {
            continue;
        };
        debug_assert!(bound_satisfied(position, &key, false));
        consider(&mut best, key, entry, segment.sequence(), false);
    }
    Ok(best.map(|(k, e, _)| (k, e)))
}
