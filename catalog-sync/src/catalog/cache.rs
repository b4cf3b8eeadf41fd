//! Short-lived memoization of the merged view
//!
//! The TTL only collapses repeated reads within one burst; an explicit
//! [`ReadCache::invalidate`] always wins over an unexpired record.

use super::merger::MergedView;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time-to-live of a cached view
pub const DEFAULT_TTL: Duration = Duration::from_millis(1_000);

#[derive(Debug)]
struct CacheRecord {
    view: Arc<MergedView>,
    captured_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    record: Option<CacheRecord>,
    /// Set by invalidate, cleared by the next stored compute
    invalidated: bool,
    /// Bumped by invalidate; a compute started under an older generation
    /// is returned to its caller but not stored
    generation: u64,
}

#[derive(Debug)]
pub struct ReadCache {
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached view if still valid, otherwise `compute` and store
    pub fn read(&self, compute: impl FnOnce() -> MergedView) -> Arc<MergedView> {
        self.read_at(Instant::now(), compute)
    }

    pub(crate) fn read_at(&self, now: Instant, compute: impl FnOnce() -> MergedView) -> Arc<MergedView> {
        let generation = {
            let inner = self.inner.lock();
            if !inner.invalidated
                && let Some(record) = &inner.record
                && now.saturating_duration_since(record.captured_at) < self.ttl
            {
                return record.view.clone();
            }
            inner.generation
        };

        // Compute without the lock held
        let view = Arc::new(compute());

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.record = Some(CacheRecord {
                view: view.clone(),
                captured_at: now,
            });
            inner.invalidated = false;
        }
        view
    }

    /// Drop the cached view now and force the next read to recompute
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        inner.record = None;
        inner.invalidated = true;
        inner.generation = inner.generation.wrapping_add(1);
    }

    pub fn is_warm(&self) -> bool {
        self.inner.lock().record.is_some()
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
