//! In-memory artifact repository.

use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;

use super::{Artifact, ArtifactKey, ArtifactRepository};

/// Configuration for [`InMemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Maximum number of entries when bounded.
    pub max_entries: usize,
    /// Evict least recently used entries beyond `max_entries`. Unbounded
    /// when false.
    pub bounded: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            bounded: true,
        }
    }
}

/// Repository statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    /// Current number of entries.
    pub len: usize,
    /// Capacity, `None` when unbounded.
    pub cap: Option<usize>,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
}

#[derive(Debug)]
enum Storage {
    Unbounded(HashMap<ArtifactKey, Artifact>),
    Lru(LruCache<ArtifactKey, Artifact>),
}

#[derive(Debug)]
struct Inner {
    storage: Storage,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Thread-safe in-memory repository, optionally LRU-bounded.
///
/// Every access moves the entry to the front of the LRU order, so `get`
/// takes the write lock.
#[derive(Debug)]
pub struct InMemoryRepository {
    inner: RwLock<Inner>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Repository with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RepositoryConfig::default())
    }

    /// Unbounded repository.
    pub fn unbounded() -> Self {
        Self::with_config(RepositoryConfig {
            bounded: false,
            ..RepositoryConfig::default()
        })
    }

    /// Repository with custom configuration.
    pub fn with_config(config: RepositoryConfig) -> Self {
        let storage = match NonZeroUsize::new(config.max_entries) {
            Some(cap) if config.bounded => Storage::Lru(LruCache::new(cap)),
            _ => Storage::Unbounded(HashMap::new()),
        };
        Self {
            inner: RwLock::new(Inner {
                storage,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Current statistics.
    pub fn stats(&self) -> RepositoryStats {
        let inner = self.inner.read();
        let (len, cap) = match &inner.storage {
            Storage::Unbounded(map) => (map.len(), None),
            Storage::Lru(cache) => (cache.len(), Some(cache.cap().get())),
        };
        RepositoryStats {
            len,
            cap,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        match &mut self.inner.write().storage {
            Storage::Unbounded(map) => map.clear(),
            Storage::Lru(cache) => cache.clear(),
        }
    }
}

impl ArtifactRepository for InMemoryRepository {
    fn get(&self, key: &ArtifactKey) -> Option<Artifact> {
        let mut inner = self.inner.write();
        let found = match &mut inner.storage {
            Storage::Unbounded(map) => map.get(key).cloned(),
            Storage::Lru(cache) => cache.get(key).cloned(),
        };
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        tracing::trace!(
            graph_id = %key.graph_id,
            resource = %key.resource(),
            hit = found.is_some(),
            "repository lookup"
        );
        found
    }

    fn put(&self, key: ArtifactKey, artifact: Artifact) {
        let mut inner = self.inner.write();
        let evicted = match &mut inner.storage {
            Storage::Unbounded(map) => {
                map.insert(key, artifact);
                None
            }
            Storage::Lru(cache) => match cache.push(key.clone(), artifact) {
                Some((old_key, _)) if old_key != key => Some(old_key),
                _ => None,
            },
        };
        if let Some(old_key) = evicted {
            inner.evictions += 1;
            tracing::debug!(
                graph_id = %old_key.graph_id,
                resource = %old_key.resource(),
                "repository evicted entry"
            );
        }
    }

    fn delete(&self, key: &ArtifactKey) -> Option<Artifact> {
        match &mut self.inner.write().storage {
            Storage::Unbounded(map) => map.remove(key),
            Storage::Lru(cache) => cache.pop(key),
        }
    }
}
