// In-memory key/value cache with per-key TTL
// Holds the hot and regular flight slots plus one entry per flight source

use std::{
    collections::{BTreeMap, HashSet},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

// Key of the short-lived slot answering most requests
pub const HOT_CACHED_FLIGHTS: &str = "hotCachedFlights";
// Key of the slot that never expires and backs the hot one
pub const REGULAR_CACHED_FLIGHTS: &str = "regularCachedFlights";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub rejected_count: usize,
    pub total_lookups: usize,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

// Store interface the rest of the crate is written against
pub trait CacheStore<V>: Send + Sync + 'static {
    // Value for `key` if present and not expired
    fn get(&self, key: &str) -> Option<V>;

    // Store `value` under `key`, overwriting any previous value. `None` ttl never expires.
    // Returns false if the write was rejected (capacity limits)
    fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> bool;

    // Returns true if an entry was removed
    fn delete(&self, key: &str) -> bool;

    fn stats(&self) -> CacheStats;
}

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_alive(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => now < at,
            None => true,
        }
    }
}

pub struct TtlCache<V> {
    store: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    cache_stats: RwLock<CacheStats>,
    // expiry instant -> keys that were stored with it
    expiry_index: RwLock<BTreeMap<Instant, HashSet<String>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: DashMap::new(),
            config,
            cache_stats: RwLock::new(CacheStats::default()),
            expiry_index: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drops every entry whose TTL has elapsed and returns how many were removed.
    /// Index entries of keys that are already gone are discarded on the way.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        loop {
            let due = {
                let index = self.expiry_index.read();
                match index.first_key_value() {
                    Some((at, _)) => *at <= now,
                    None => false,
                }
            };

            if !due {
                break;
            }

            let keys = match self.expiry_index.write().pop_first() {
                Some((_, keys)) => keys,
                None => break,
            };

            for key in keys {
                if self
                    .store
                    .remove_if(&key, |_, entry| !entry.is_alive(now))
                    .is_some()
                {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            self.cache_stats.write().expired_count += removed;
            debug!("Removed {} expired cache entries", removed);
        }

        removed
    }

    fn unindex(&self, key: &str, at: Instant) {
        let mut index = self.expiry_index.write();
        if let Some(keys) = index.get_mut(&at) {
            keys.remove(key);
            if keys.is_empty() {
                index.remove(&at);
            }
        }
    }
}

impl<V> CacheStore<V> for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.cache_stats.write().total_lookups += 1;

        let lookup = self
            .store
            .get(key)
            .map(|entry| entry.is_alive(now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.cache_stats.write().hit_count += 1;
                Some(value)
            }
            Some(None) => {
                // expired: drop it unless a concurrent writer refreshed it meanwhile
                if self
                    .store
                    .remove_if(key, |_, entry| !entry.is_alive(now))
                    .is_some()
                {
                    self.cache_stats.write().expired_count += 1;
                }
                self.cache_stats.write().miss_count += 1;
                None
            }
            None => {
                self.cache_stats.write().miss_count += 1;
                None
            }
        }
    }

    fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> bool {
        // due index entries go first so the index stays bounded by the live entries
        self.cleanup_expired();

        if !self.store.contains_key(key) && self.store.len() >= self.config.max_entries {
            self.cache_stats.write().rejected_count += 1;
            debug!("Cache full ({} entries), rejected key {}", self.store.len(), key);
            return false;
        }

        // a TTL past the clock's range never expires
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));

        if let Some(at) = expires_at {
            self.expiry_index
                .write()
                .entry(at)
                .or_default()
                .insert(key.to_string());
        }

        let previous = self
            .store
            .insert(key.to_string(), CacheEntry { value, expires_at });

        if let Some(old_at) = previous.and_then(|entry| entry.expires_at) {
            if Some(old_at) != expires_at {
                self.unindex(key, old_at);
            }
        }

        true
    }

    fn delete(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Some((_, entry)) => {
                if let Some(at) = entry.expires_at {
                    self.unindex(key, at);
                }
                true
            }
            None => false,
        }
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.cache_stats.read().clone();
        stats.items_count = self.store.len();
        stats
    }
}
