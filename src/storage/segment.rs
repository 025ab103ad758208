use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{Error, Result};
use crate::storage::cache::{BlockCache, BlockKey};
use crate::storage::key::StoreKey;
use crate::storage::memtable::Entry;

const SEGMENT_MAGIC: u32 = 0x4c58_5347;
const SEGMENT_VERSION: u32 = 1;
// magic + version + entry_count + checksum, bincode fixint little-endian.
const HEADER_LEN: usize = 20;

const FLAG_TOMBSTONE: u8 = 1;

/// Segment file header, written once when the segment is sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SegmentHeader {
    magic: u32,
    version: u32,
    entry_count: u64,
    checksum: u32,
}

/// Manifest entry describing one sealed segment on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SegmentMeta {
    pub id: Uuid,
    pub sequence: u64,
    pub entry_count: u64,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
}

pub(crate) fn segment_file_name(id: &Uuid) -> String {
    format!("seg-{}.dat", id.simple())
}

/// Writes a sorted run of entries (tombstones included, so they shadow
/// older segments) into a new sealed segment file.
pub(crate) fn write_segment<K: StoreKey>(
    dir: &Path,
    sequence: u64,
    entries: &[(K, Entry)],
) -> Result<SegmentMeta> {
    let id = Uuid::new_v4();
    let file_name = segment_file_name(&id);
    let path = dir.join(&file_name);

    let mut body = Vec::with_capacity(entries.len() * (K::ENCODED_LEN + 2));
    for (key, entry) in entries {
        key.encode_into(&mut body);
        body.push(entry.value);
        body.push(if entry.deleted { FLAG_TOMBSTONE } else { 0 });
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    let header = SegmentHeader {
        magic: SEGMENT_MAGIC,
        version: SEGMENT_VERSION,
        entry_count: entries.len() as u64,
        checksum: hasher.finalize(),
    };

    let mut file = File::create(&path)?;
    file.write_all(&bincode::serialize(&header)?)?;
    file.write_all(&body)?;
    file.sync_all()?;

    Ok(SegmentMeta {
        id,
        sequence,
        entry_count: entries.len() as u64,
        created_at: Utc::now(),
        file_name,
    })
}

/// Read handle over one sealed segment. All entry access goes through
/// the shared block cache.
#[derive(Debug)]
pub(crate) struct Segment<K: StoreKey> {
    meta: SegmentMeta,
    file: Mutex<File>,
    cache: Arc<BlockCache>,
    block_entries: usize,
    _key: PhantomData<K>,
}

impl<K: StoreKey> Segment<K> {
    const ENTRY_LEN: usize = K::ENCODED_LEN + 2;

    pub fn open(
        dir: &Path,
        meta: SegmentMeta,
        cache: Arc<BlockCache>,
        block_entries: usize,
    ) -> Result<Self> {
        let path = dir.join(&meta.file_name);
        let mut file = OpenOptions::new().read(true).open(&path)?;

        let mut header_bytes = [0u8; HEADER_LEN];
        file.read_exact(&mut header_bytes)?;
        let header: SegmentHeader = bincode::deserialize(&header_bytes)?;
        if header.magic != SEGMENT_MAGIC {
            return Err(Error::corrupted(format!(
                "bad segment magic in {}",
                path.display()
            )));
        }
        if header.version != SEGMENT_VERSION {
            return Err(Error::corrupted(format!(
                "unsupported segment version {} in {}",
                header.version,
                path.display()
            )));
        }
        if header.entry_count != meta.entry_count {
            return Err(Error::corrupted(format!(
                "entry count mismatch in {}: header {}, manifest {}",
                path.display(),
                header.entry_count,
                meta.entry_count
            )));
        }

        let mut body = Vec::new();
        file.read_to_end(&mut body)?;
        if body.len() != header.entry_count as usize * Self::ENTRY_LEN {
            return Err(Error::corrupted(format!(
                "truncated segment {}",
                path.display()
            )));
        }
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        if hasher.finalize() != header.checksum {
            return Err(Error::corrupted(format!(
                "checksum mismatch in {}",
                path.display()
            )));
        }

        Ok(Segment {
            meta,
            file: Mutex::new(file),
            cache,
            block_entries,
            _key: PhantomData,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn entry_count(&self) -> u64 {
        self.meta.entry_count
    }

    fn read_block(&self, block: u64) -> Result<Arc<Vec<u8>>> {
        let key = BlockKey {
            segment: self.meta.id,
            block,
        };
        if let Some(data) = self.cache.get(&key) {
            return Ok(data);
        }

        let first_entry = block * self.block_entries as u64;
        let entries_in_block =
            (self.meta.entry_count - first_entry).min(self.block_entries as u64) as usize;
        let offset = HEADER_LEN as u64 + first_entry * Self::ENTRY_LEN as u64;
        let mut buf = vec![0u8; entries_in_block * Self::ENTRY_LEN];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        let data = Arc::new(buf);
        self.cache.insert(key, data.clone());
        Ok(data)
    }

    pub fn entry(&self, index: u64) -> Result<(K, Entry)> {
        debug_assert!(index < self.meta.entry_count, "entry index out of range");
        let block = index / self.block_entries as u64;
        let within = (index % self.block_entries as u64) as usize;
        let data = self.read_block(block)?;
        let start = within * Self::ENTRY_LEN;
        let bytes = &data[start..start + Self::ENTRY_LEN];
        let key = K::decode(&bytes[..K::ENCODED_LEN]);
        let value = bytes[K::ENCODED_LEN];
        let flags = bytes[K::ENCODED_LEN + 1];
        Ok((
            key,
            Entry {
                value,
                deleted: flags & FLAG_TOMBSTONE != 0,
            },
        ))
    }

    /// Index of the first entry with `key >= target` (or `> target` when
    /// exclusive). Equals `entry_count` when no such entry exists.
    pub fn lower_bound(&self, target: &K, exclusive: bool) -> Result<u64> {
        let mut lo = 0u64;
        let mut hi = self.meta.entry_count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (key, _) = self.entry(mid)?;
            let before = if exclusive {
                key <= *target
            } else {
                key < *target
            };
            if before {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    pub fn get(&self, key: &K) -> Result<Option<Entry>> {
        let idx = self.lower_bound(key, false)?;
        if idx < self.meta.entry_count {
            let (found, entry) = self.entry(idx)?;
            if found == *key {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
