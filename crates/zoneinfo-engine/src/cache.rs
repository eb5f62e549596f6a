//! Instance cache -- at most one live `ZoneInfo` per key.
//!
//! Two views are kept under one mutex:
//!
//! - a bounded most-recently-used list of strong `Arc`s, which keeps the
//!   last few zones alive even when no caller holds them;
//! - an unbounded map of `Weak` handles, which hands back the existing
//!   instance for as long as anybody still holds it, even after it has been
//!   evicted from the MRU list.
//!
//! Evicting from the MRU list only drops the strong owner. Map entries whose
//! instance has died are removed lazily, the next time their key is looked up.
//! Decoding happens outside the lock; if two threads race to build the same
//! zone, the first one to publish wins and the other result is discarded.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::tzpath::{TzPath, ZoneSource};
use crate::zone::ZoneInfo;
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Default number of zones kept alive by the MRU list.
pub const DEFAULT_STRONG_CAPACITY: usize = 8;

static GLOBAL: Lazy<ZoneCache> = Lazy::new(|| {
    let config = EngineConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring invalid environment configuration");
        EngineConfig::default()
    });
    ZoneCache::from_config(&config)
});

/// The process-wide cache, configured from the environment on first use.
pub fn global() -> &'static ZoneCache {
    &GLOBAL
}

#[derive(Debug, Default)]
struct CacheState {
    strong: VecDeque<(String, Arc<ZoneInfo>)>,
    weak: HashMap<String, Weak<ZoneInfo>>,
}

impl CacheState {
    /// Live instance for `key`, dropping the map entry if it has died.
    fn lookup(&mut self, key: &str) -> Option<Arc<ZoneInfo>> {
        let zone = self.weak.get(key)?.upgrade();
        if zone.is_none() {
            self.weak.remove(key);
        }
        zone
    }

    /// Move `key` to the most-recently-used end, evicting from the other end.
    fn promote(&mut self, key: &str, zone: Arc<ZoneInfo>, capacity: usize) {
        if let Some(pos) = self.strong.iter().position(|(k, _)| k == key) {
            self.strong.remove(pos);
        }
        self.strong.push_back((key.to_string(), zone));
        while self.strong.len() > capacity {
            if let Some((evicted, _)) = self.strong.pop_front() {
                tracing::debug!(key = %evicted, "evicted zone from strong cache");
            }
        }
    }
}

/// A shared, thread-safe cache of `ZoneInfo` instances keyed by zone key.
pub struct ZoneCache {
    source: Box<dyn ZoneSource>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl ZoneCache {
    /// A cache over `source` that pins at most `capacity` zones.
    pub fn new(source: impl ZoneSource + 'static, capacity: usize) -> Self {
        Self {
            source: Box::new(source),
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// A cache over the configured search path.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            TzPath::new(config.tzpath.search_paths.iter().cloned()),
            config.cache.strong_capacity,
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn source(&self) -> &dyn ZoneSource {
        self.source.as_ref()
    }

    /// The shared instance for `key`, building it if no live instance exists.
    ///
    /// # Errors
    /// Propagates lookup and decode errors. A failed build leaves the cache
    /// untouched.
    pub fn get(&self, key: &str) -> Result<Arc<ZoneInfo>> {
        {
            let mut state = self.lock();
            if let Some(zone) = state.lookup(key) {
                state.promote(key, Arc::clone(&zone), self.capacity);
                return Ok(zone);
            }
        }

        let fresh = Arc::new(self.load_uncached(key)?);

        let mut state = self.lock();
        let zone = match state.lookup(key) {
            Some(existing) => existing,
            None => {
                state.weak.insert(key.to_string(), Arc::downgrade(&fresh));
                fresh
            }
        };
        state.promote(key, Arc::clone(&zone), self.capacity);
        Ok(zone)
    }

    /// Build a new instance for `key`, bypassing and not updating the cache.
    pub fn load_uncached(&self, key: &str) -> Result<ZoneInfo> {
        tracing::debug!(key, "building zone");
        ZoneInfo::load(key, self.source.as_ref())
    }

    /// Forget every cached instance. Instances held by callers stay valid.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.strong.clear();
        state.weak.clear();
    }

    /// Forget the cached instances for `keys` only.
    pub fn clear_keys<S: AsRef<str>>(&self, keys: &[S]) {
        let mut state = self.lock();
        for key in keys {
            let key = key.as_ref();
            state.weak.remove(key);
            state.strong.retain(|(k, _)| k != key);
        }
    }

    /// Keys currently pinned by the MRU list, least recently used first.
    pub fn pinned_keys(&self) -> Vec<String> {
        self.lock().strong.iter().map(|(k, _)| k.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The state stays consistent across a panic in another holder.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ZoneCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneCache")
            .field("capacity", &self.capacity)
            .field("pinned", &self.pinned_keys())
            .finish()
    }
}
