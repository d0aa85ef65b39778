//! A bounded LRU memoizing `(query, flags) -> (ranked docs, highlights)`.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::engine::executor::Highlights;
use crate::ids::DocId;
use crate::percentile::FainderMode;

/// Cache key: normalized query text plus the four behavior flags that
/// change the result for otherwise-identical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub fainder_mode: FainderMode,
    pub enable_highlighting: bool,
    pub enable_filtering: bool,
    pub enable_merging: bool,
}

pub type CacheValue = (Vec<DocId>, Highlights);

/// `(hits, misses, max_size, current_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub max_size: usize,
    pub current_size: usize,
}

pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CacheValue>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(max_size: usize) -> Self {
        let cap = NonZeroUsize::new(max_size.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, value: CacheValue) {
        let mut entries = self.entries.lock();
        let cap = entries.cap().get();
        if entries.len() >= cap && !entries.contains(&key) {
            tracing::debug!(cap, "result cache at capacity, evicting LRU entry");
        }
        entries.put(key, value);
    }

    /// Drops all entries. Must be called on every atomic index swap.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn info(&self) -> CacheInfo {
        let entries = self.entries.lock();
        CacheInfo {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            max_size: entries.cap().get(),
            current_size: entries.len(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(q: &str) -> CacheKey {
        CacheKey {
            query: q.to_string(),
            fainder_mode: FainderMode::Exact,
            enable_highlighting: true,
            enable_filtering: true,
            enable_merging: true,
        }
    }

    #[test]
    fn miss_then_hit_increments_counters() {
        let cache = ResultCache::new(4);
        assert!(cache.get(&key("kw(a)")).is_none());
        cache.insert(key("kw(a)"), (vec![1, 2], Default::default()));
        assert_eq!(cache.get(&key("kw(a)")), Some((vec![1, 2], Default::default())));

        let info = cache.info();
        assert_eq!(info.hits, 1);
        assert_eq!(info.misses, 1);
        assert_eq!(info.current_size, 1);
    }

    #[test]
    fn clear_drops_all_entries() {
        let cache = ResultCache::new(4);
        cache.insert(key("kw(a)"), (vec![1], Default::default()));
        cache.clear();
        assert_eq!(cache.info().current_size, 0);
    }

    #[test]
    fn distinct_flag_combinations_are_distinct_keys() {
        let cache = ResultCache::new(4);
        let mut k1 = key("kw(a)");
        let mut k2 = key("kw(a)");
        k1.enable_filtering = true;
        k2.enable_filtering = false;
        cache.insert(k1.clone(), (vec![1], Default::default()));
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
    }
}
