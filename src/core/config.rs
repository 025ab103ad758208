use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{Error, Result};

/// Tuning for one ordered key-value store (primary or reverse index).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Entries read from a segment file per cached block.
    pub block_entries: usize,
    /// Maximum number of blocks held by the block cache.
    pub cache_capacity: usize,
    /// How long an untouched block stays cached before the maintenance
    /// thread drops it.
    pub cache_lifetime: Duration,
    /// Interval between idle-block sweeps. Zero disables the thread.
    pub cleanup_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            block_entries: 256,
            cache_capacity: 1024,
            cache_lifetime: Duration::from_millis(60_000),
            cleanup_interval: Duration::from_millis(5_000),
        }
    }
}

impl StoreOptions {
    pub fn validate(&self) -> Result<()> {
        if self.block_entries == 0 {
            return Err(Error::invalid_configuration("block_entries must be > 0"));
        }
        if self.cache_capacity == 0 {
            return Err(Error::invalid_configuration("cache_capacity must be > 0"));
        }
        Ok(())
    }
}

/// Configuration for a positional index: where it lives, whether the
/// reverse `(record, token)` mirror is maintained, and the store tuning
/// for both trees.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub data_path: PathBuf,
    /// Maintain the reverse index so record deletion is proportional to
    /// the record size instead of the whole index.
    pub use_reverse_index: bool,
    pub primary: StoreOptions,
    pub reverse: StoreOptions,
}

impl IndexOptions {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        IndexOptions {
            data_path: data_path.into(),
            use_reverse_index: true,
            primary: StoreOptions::default(),
            reverse: StoreOptions::default(),
        }
    }

    pub fn without_reverse_index(mut self) -> Self {
        self.use_reverse_index = false;
        self
    }

    /// Sets the block-cache lifetime for both stores.
    pub fn block_cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.primary.cache_lifetime = lifetime;
        self.reverse.cache_lifetime = lifetime;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(Error::invalid_configuration("data_path must not be empty"));
        }
        self.primary.validate()?;
        self.reverse.validate()
    }
}
