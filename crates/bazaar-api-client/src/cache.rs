//! Tag-invalidated query cache.
//!
//! Read results are stored under their request key together with the tags they
//! depend on. Mutations invalidate tags, evicting every entry that carries one.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use bazaar_core::Resource;
use lru::LruCache;

/// Cache tag: a whole collection (`id: None`) or a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub resource: Resource,
    pub id: Option<String>,
}

impl Tag {
    pub fn list(resource: Resource) -> Self {
        Self { resource, id: None }
    }

    pub fn record(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    tags: Vec<Tag>,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<String, CacheEntry>,
    /// Bumped by every invalidation and clear.
    generation: u64,
}

#[derive(Debug)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Poisoning is ignored: entries are only ever replaced whole.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.lock().entries.get(key).map(|entry| entry.value.clone());
        tracing::debug!(key, hit = hit.is_some(), "Query cache lookup");
        hit
    }

    /// Current invalidation generation. Read it before fetching and pass it to
    /// [`QueryCache::insert_if_current`].
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value, tags: Vec<Tag>) {
        self.lock().entries.put(key.into(), CacheEntry { value, tags });
    }

    /// Store a fetched value unless an invalidation or clear happened since
    /// `generation` was read. Returns whether the value was stored.
    pub fn insert_if_current(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
        tags: Vec<Tag>,
        generation: u64,
    ) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            let key = key.into();
            tracing::debug!(key = %key, "Query cache insert skipped, invalidated during fetch");
            return false;
        }
        state.entries.put(key.into(), CacheEntry { value, tags });
        true
    }

    /// Evict every entry carrying any of `tags`. Returns the number evicted.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        let mut state = self.lock();
        state.generation += 1;
        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| tags.contains(t)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            state.entries.pop(key);
        }
        if !stale.is_empty() {
            tracing::debug!(evicted = stale.len(), "Query cache invalidated");
        }
        stale.len()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
