use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::core::cancel::CancellationToken;
use crate::core::config::IndexOptions;
use crate::core::error::{Error, Result};
use crate::index::key::{PositionalKey, ReverseKey};
use crate::query::ast::SearchQuery;
use crate::search::advanced::AdvancedSearchExecutor;
use crate::search::simple::{SimpleSearchExecutor, SimpleSearchRequest};
use crate::storage::cache::CacheStats;
use crate::storage::key::KeyComponent;
use crate::storage::store::KvStore;

const PRIMARY_DIR: &str = "index1";
const REVERSE_DIR: &str = "index2";

/// Point-in-time index counters for monitoring.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub pending_writes: usize,
    pub segment_count: usize,
    pub cache: CacheStats,
    pub reverse_pending_writes: usize,
    pub reverse_segment_count: usize,
    pub read_only: bool,
}

/// Durable positional inverted index over `(token, record, prev)`
/// triples, with an optional reverse `(record, token)` mirror that makes
/// record deletion proportional to the record instead of the index.
///
/// States: open, read-only, dropped. Dropped is terminal.
pub struct PositionalIndex<T: KeyComponent, R: KeyComponent> {
    primary: KvStore<PositionalKey<T, R>>,
    reverse: Option<KvStore<ReverseKey<R, T>>>,
    read_only: AtomicBool,
    dropped: AtomicBool,
}

impl<T: KeyComponent, R: KeyComponent> PositionalIndex<T, R> {
    pub fn open(options: IndexOptions) -> Result<Self> {
        options.validate()?;
        let primary = KvStore::open(
            options.data_path.join(PRIMARY_DIR),
            options.primary.clone(),
        )?;
        let reverse = if options.use_reverse_index {
            Some(KvStore::open(
                options.data_path.join(REVERSE_DIR),
                options.reverse.clone(),
            )?)
        } else {
            None
        };
        info!(
            path = %options.data_path.display(),
            reverse_index = reverse.is_some(),
            "opened positional index"
        );
        Ok(PositionalIndex {
            primary,
            reverse,
            read_only: AtomicBool::new(false),
            dropped: AtomicBool::new(false),
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Flips both stores read-only (or writable) from the caller's point
    /// of view.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    pub fn has_reverse_index(&self) -> bool {
        self.reverse.is_some()
    }

    /// Primary-index writes buffered in memory, tombstones included.
    pub fn pending_writes(&self) -> usize {
        self.primary.pending_writes()
    }

    /// Sealed segments backing the primary index.
    pub fn segment_count(&self) -> usize {
        self.primary.segment_count()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            pending_writes: self.primary.pending_writes(),
            segment_count: self.primary.segment_count(),
            cache: self.primary.cache_stats(),
            reverse_pending_writes: self
                .reverse
                .as_ref()
                .map(KvStore::pending_writes)
                .unwrap_or(0),
            reverse_segment_count: self
                .reverse
                .as_ref()
                .map(KvStore::segment_count)
                .unwrap_or(0),
            read_only: self.is_read_only(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_dropped() {
            return Err(Error::index_dropped());
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.is_read_only() {
            return Err(Error::read_only());
        }
        Ok(())
    }

    /// Inserts or overwrites one positional triple, mirroring the
    /// `(record, token)` pair into the reverse index when enabled.
    pub fn upsert(&self, token: T, record: R, prev: T) -> Result<()> {
        self.ensure_writable()?;
        self.primary
            .upsert(PositionalKey::new(token, record, prev), 0);
        if let Some(reverse) = &self.reverse {
            reverse.try_add(ReverseKey::new(record, token), 0)?;
        }
        Ok(())
    }

    /// Tombstones one positional triple and its reverse mirror.
    pub fn delete(&self, token: T, record: R, prev: T) -> Result<()> {
        self.ensure_writable()?;
        self.primary
            .force_delete(PositionalKey::new(token, record, prev));
        if let Some(reverse) = &self.reverse {
            reverse.force_delete(ReverseKey::new(record, token));
        }
        Ok(())
    }

    /// Removes every triple whose record component equals `record`.
    /// With the reverse index this touches only that record's keys;
    /// without it the whole primary index is scanned. Both paths leave
    /// the same logical state. Returns the number of removed triples.
    pub fn delete_record(&self, record: R) -> Result<usize> {
        self.ensure_writable()?;
        let count = match &self.reverse {
            Some(reverse) => self.delete_record_via_reverse(reverse, record)?,
            None => self.delete_record_via_scan(record)?,
        };
        debug!(count, "deleted record triples");
        Ok(count)
    }

    fn delete_record_via_reverse(
        &self,
        reverse: &KvStore<ReverseKey<R, T>>,
        record: R,
    ) -> Result<usize> {
        let mut tokens = Vec::new();
        {
            let mut iter = reverse.iter();
            iter.seek(&ReverseKey::record_start(record));
            while let Some((key, _)) = iter.next()? {
                if key.record != record {
                    break;
                }
                tokens.push(key.token);
            }
        }

        let mut count = 0;
        for token in tokens {
            let mut doomed = Vec::new();
            {
                let mut iter = self.primary.iter();
                iter.seek(&PositionalKey::record_start(token, record));
                while let Some((key, _)) = iter.next()? {
                    if key.token != token || key.record != record {
                        break;
                    }
                    doomed.push(key);
                }
            }
            for key in doomed {
                self.primary.force_delete(key);
                count += 1;
            }
            reverse.force_delete(ReverseKey::new(record, token));
        }
        Ok(count)
    }

    fn delete_record_via_scan(&self, record: R) -> Result<usize> {
        let mut doomed = Vec::new();
        {
            let mut iter = self.primary.iter();
            while let Some((key, _)) = iter.next()? {
                if key.record == record {
                    doomed.push(key);
                }
            }
        }
        let count = doomed.len();
        for key in doomed {
            self.primary.force_delete(key);
        }
        Ok(count)
    }

    /// Conjunctive token search with optional ordering, disjunctive
    /// facet filter and pagination.
    pub fn simple_search(
        &self,
        request: &SimpleSearchRequest<'_, T>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        self.ensure_open()?;
        SimpleSearchExecutor::new(&self.primary).execute(request, cancellation)
    }

    /// Evaluates an arbitrary Boolean/facet query tree.
    pub fn search(
        &self,
        query: &SearchQuery<T>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        self.ensure_open()?;
        AdvancedSearchExecutor::new(&self.primary).execute(query, cancellation)
    }

    /// Drains both memtables into sealed segments.
    pub fn evict_to_disk(&self) -> Result<()> {
        self.ensure_open()?;
        self.primary.evict_to_disk()?;
        if let Some(reverse) = &self.reverse {
            reverse.evict_to_disk()?;
        }
        Ok(())
    }

    pub fn try_cancel_background_threads(&self) {
        self.primary.try_cancel_background_threads();
        if let Some(reverse) = &self.reverse {
            reverse.try_cancel_background_threads();
        }
    }

    pub fn wait_for_background_threads(&self) {
        self.primary.wait_for_background_threads();
        if let Some(reverse) = &self.reverse {
            reverse.wait_for_background_threads();
        }
    }

    /// Irreversibly destroys the index: cancels maintenance, waits for
    /// it, flips read-only, deletes both on-disk trees and latches the
    /// dropped state. Every later operation fails with `IndexDropped`.
    pub fn drop_index(&self) -> Result<()> {
        self.ensure_open()?;
        self.try_cancel_background_threads();
        self.wait_for_background_threads();
        self.set_read_only(true);
        self.primary.destroy()?;
        if let Some(reverse) = &self.reverse {
            reverse.destroy()?;
        }
        self.dropped.store(true, Ordering::Release);
        info!("dropped positional index");
        Ok(())
    }
}
