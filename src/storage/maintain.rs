use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::cache::BlockCache;

/// Owns the background thread that sweeps idle blocks out of the cache.
/// Cancellation is a one-shot signal; `wait` joins the thread.
pub(crate) struct Maintainer {
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Option<Sender<()>>,
}

impl Maintainer {
    /// Spawns the cleanup loop, or a no-op maintainer when the interval
    /// is zero.
    pub fn spawn(cache: Arc<BlockCache>, interval: Duration) -> Self {
        if interval.is_zero() {
            return Maintainer {
                handle: Mutex::new(None),
                shutdown: None,
            };
        }

        let (tx, rx) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("lexstone-cache-sweep".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let evicted = cache.evict_idle();
                        if evicted > 0 {
                            debug!(
                                evicted,
                                hits = cache.hit_count(),
                                misses = cache.miss_count(),
                                "evicted idle cache blocks"
                            );
                        }
                    }
                }
            })
            .expect("failed to spawn cache sweep thread");

        Maintainer {
            handle: Mutex::new(Some(handle)),
            shutdown: Some(tx),
        }
    }

    /// Requests shutdown without blocking.
    pub fn cancel(&self) {
        if let Some(shutdown) = &self.shutdown {
            let _ = shutdown.try_send(());
        }
    }

    /// Blocks until the background thread has exited.
    pub fn wait(&self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Maintainer {
    fn drop(&mut self) {
        self.cancel();
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_and_wait_stop_the_thread() {
        let cache = Arc::new(BlockCache::new(4, Duration::from_secs(60)));
        let maintainer = Maintainer::spawn(cache, Duration::from_millis(10));
        maintainer.cancel();
        maintainer.wait();
        // A second wait is a no-op.
        maintainer.wait();
    }

    #[test]
    fn zero_interval_spawns_nothing() {
        let cache = Arc::new(BlockCache::new(4, Duration::from_secs(60)));
        let maintainer = Maintainer::spawn(cache, Duration::ZERO);
        maintainer.cancel();
        maintainer.wait();
    }
}
