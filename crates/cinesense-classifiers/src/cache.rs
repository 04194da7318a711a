//! Result cache keyed by exact input text

use cinesense_core::SentimentResult;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

/// Concurrent least-recently-used cache of accepted results.
///
/// Keys are the raw input text, case-sensitive and unnormalized. A capacity
/// of 0 disables eviction.
pub struct ResultCache {
    capacity: usize,
    inner: Cache<String, SentimentResult>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let mut builder = Cache::builder().eviction_policy(EvictionPolicy::lru());
        if capacity > 0 {
            builder = builder.max_capacity(capacity as u64);
        }

        tracing::debug!(capacity, "Result cache initialized");

        Self {
            capacity,
            inner: builder.build(),
        }
    }

    /// Unbounded cache
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached result for `text`, marking it most recently used
    pub fn get(&self, text: &str) -> Option<SentimentResult> {
        self.inner.get(text)
    }

    /// Store `result` for `text`; the least recently used entry goes once full
    pub fn insert(&self, text: &str, result: SentimentResult) {
        self.inner.insert(text.to_string(), result);
    }

    /// Entry count after pending evictions and removals are applied
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
