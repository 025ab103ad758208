use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::StoreOptions;
use crate::core::error::{Error, Result};
use crate::storage::cache::{BlockCache, CacheStats};
use crate::storage::iter::{RevStoreIter, StoreIter};
use crate::storage::key::StoreKey;
use crate::storage::maintain::Maintainer;
use crate::storage::memtable::{Entry, Memtable};
use crate::storage::segment::{write_segment, Segment, SegmentMeta};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TMP: &str = "MANIFEST.tmp";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    segments: Vec<SegmentMeta>,
}

/// Ordered key-value store with LSM semantics: an in-memory memtable in
/// front of immutable sorted segments, tombstoned deletes, and merging
/// iterators. `evict_to_disk` is the durability boundary; there is no
/// write-ahead log.
pub struct KvStore<K: StoreKey> {
    dir: PathBuf,
    options: StoreOptions,
    memtable: Memtable<K>,
    segments: RwLock<Arc<Vec<Arc<Segment<K>>>>>,
    next_sequence: AtomicU64,
    cache: Arc<BlockCache>,
    maintainer: Maintainer,
    // Serializes evictions so two callers cannot both drain the memtable
    // into overlapping segments.
    evict_lock: Mutex<()>,
}

impl<K: StoreKey> KvStore<K> {
    pub fn open(dir: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let cache = Arc::new(BlockCache::new(
            options.cache_capacity,
            options.cache_lifetime,
        ));

        let mut segments = Vec::new();
        let mut next_sequence = 0;
        let manifest_path = dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            let bytes = fs::read(&manifest_path)?;
            let manifest: Manifest = bincode::deserialize(&bytes)?;
            let mut metas = manifest.segments;
            metas.sort_by_key(|m| m.sequence);
            for meta in metas {
                next_sequence = next_sequence.max(meta.sequence + 1);
                segments.push(Arc::new(Segment::open(
                    &dir,
                    meta,
                    cache.clone(),
                    options.block_entries,
                )?));
            }
        }

        let maintainer = Maintainer::spawn(cache.clone(), options.cleanup_interval);
        info!(path = %dir.display(), segments = segments.len(), "opened store");

        Ok(KvStore {
            dir,
            options,
            memtable: Memtable::new(),
            segments: RwLock::new(Arc::new(segments)),
            next_sequence: AtomicU64::new(next_sequence),
            cache,
            maintainer,
            evict_lock: Mutex::new(()),
        })
    }

    pub(crate) fn memtable(&self) -> &Memtable<K> {
        &self.memtable
    }

    pub(crate) fn segments_snapshot(&self) -> Arc<Vec<Arc<Segment<K>>>> {
        self.segments.read().clone()
    }

    /// Inserts or overwrites the key.
    pub fn upsert(&self, key: K, value: u8) {
        self.memtable.insert(key, Entry::live(value));
    }

    /// Inserts only when the key is not already live. Returns whether
    /// the insert happened.
    pub fn try_add(&self, key: K, value: u8) -> Result<bool> {
        if self.try_get(&key)?.is_some() {
            return Ok(false);
        }
        self.memtable.insert(key, Entry::live(value));
        Ok(true)
    }

    /// Writes a tombstone for the key.
    pub fn force_delete(&self, key: K) {
        self.memtable.insert(key, Entry::tombstone());
    }

    pub fn try_get(&self, key: &K) -> Result<Option<u8>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(if entry.deleted {
                None
            } else {
                Some(entry.value)
            });
        }
        let segments = self.segments_snapshot();
        for segment in segments.iter().rev() {
            if let Some(entry) = segment.get(key)? {
                return Ok(if entry.deleted {
                    None
                } else {
                    Some(entry.value)
                });
            }
        }
        Ok(None)
    }

    /// Drains the memtable into a new sealed segment. Tombstones are
    /// carried so they keep shadowing older segments.
    pub fn evict_to_disk(&self) -> Result<()> {
        let _guard = self.evict_lock.lock();
        if self.memtable.is_empty() {
            return Ok(());
        }
        let entries = self.memtable.drain_sorted();
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let meta = write_segment(&self.dir, sequence, &entries)?;
        let segment = Arc::new(Segment::open(
            &self.dir,
            meta,
            self.cache.clone(),
            self.options.block_entries,
        )?);

        let mut guard = self.segments.write();
        let mut list: Vec<Arc<Segment<K>>> = guard.as_ref().clone();
        list.push(segment);
        *guard = Arc::new(list);
        let metas: Vec<SegmentMeta> = guard.iter().map(|s| s.meta().clone()).collect();
        drop(guard);

        self.persist_manifest(&metas)?;
        debug!(entries = entries.len(), sequence, "evicted memtable to disk");
        Ok(())
    }

    fn persist_manifest(&self, metas: &[SegmentMeta]) -> Result<()> {
        let manifest = Manifest {
            segments: metas.to_vec(),
        };
        let tmp = self.dir.join(MANIFEST_TMP);
        fs::write(&tmp, bincode::serialize(&manifest)?)?;
        fs::rename(&tmp, self.dir.join(MANIFEST_FILE))?;
        Ok(())
    }

    /// Forward ordered iterator, positioned before the first key.
    pub fn iter(&self) -> StoreIter<'_, K> {
        StoreIter::new(self)
    }

    /// Reverse ordered iterator, positioned after the last key.
    pub fn iter_reverse(&self) -> RevStoreIter<'_, K> {
        RevStoreIter::new(self)
    }

    /// Buffered (not yet evicted) entry count, tombstones included.
    pub fn pending_writes(&self) -> usize {
        self.memtable.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn try_cancel_background_threads(&self) {
        self.maintainer.cancel();
    }

    pub fn wait_for_background_threads(&self) {
        self.maintainer.wait();
    }

    /// Deletes the on-disk tree. The store must not be used afterwards;
    /// callers gate access through their own dropped latch.
    pub fn destroy(&self) -> Result<()> {
        self.maintainer.cancel();
        self.maintainer.wait();
        self.cache.clear();
        *self.segments.write() = Arc::new(Vec::new());
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::from(err)),
        }
        info!(path = %self.dir.display(), "destroyed store");
        Ok(())
    }
}
