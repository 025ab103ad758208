use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

/// Identifies one block of entries within a segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockKey {
    pub segment: Uuid,
    pub block: u64,
}

/// Block-cache counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub resident_blocks: usize,
}

#[derive(Debug)]
struct CachedBlock {
    data: Arc<Vec<u8>>,
    last_access: Instant,
}

/// LRU cache of segment blocks shared by every reader of one store.
/// Capacity bounds total residency; the maintenance thread additionally
/// drops blocks idle longer than the configured lifetime.
#[derive(Debug)]
pub(crate) struct BlockCache {
    blocks: Mutex<LruCache<BlockKey, CachedBlock>>,
    lifetime: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BlockCache {
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        BlockCache {
            blocks: Mutex::new(LruCache::new(capacity)),
            lifetime,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &BlockKey) -> Option<Arc<Vec<u8>>> {
        let mut blocks = self.blocks.lock();
        match blocks.get_mut(key) {
            Some(block) => {
                block.last_access = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(block.data.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: BlockKey, data: Arc<Vec<u8>>) {
        self.blocks.lock().put(
            key,
            CachedBlock {
                data,
                last_access: Instant::now(),
            },
        );
    }

    /// Drops blocks that have not been touched within the lifetime.
    /// Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut blocks = self.blocks.lock();
        let expired: Vec<BlockKey> = blocks
            .iter()
            .filter(|(_, block)| now.duration_since(block.last_access) >= self.lifetime)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            blocks.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.blocks.lock().clear();
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hit_count(),
            misses: self.miss_count(),
            resident_blocks: self.blocks.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(data: &[u8]) -> Arc<Vec<u8>> {
        Arc::new(data.to_vec())
    }

    #[test]
    fn hit_and_miss_counters() {
        let cache = BlockCache::new(4, Duration::from_secs(60));
        let key = BlockKey {
            segment: Uuid::new_v4(),
            block: 0,
        };
        assert!(cache.get(&key).is_none());
        cache.insert(key, block(b"abc"));
        assert_eq!(cache.get(&key).unwrap().as_slice(), b"abc");
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn idle_blocks_expire() {
        let cache = BlockCache::new(4, Duration::ZERO);
        let key = BlockKey {
            segment: Uuid::new_v4(),
            block: 7,
        };
        cache.insert(key, block(b"x"));
        assert_eq!(cache.evict_idle(), 1);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn capacity_bounds_residency() {
        let cache = BlockCache::new(1, Duration::from_secs(60));
        let segment = Uuid::new_v4();
        let first = BlockKey { segment, block: 0 };
        let second = BlockKey { segment, block: 1 };
        cache.insert(first, block(b"a"));
        cache.insert(second, block(b"b"));
        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());
    }
}
