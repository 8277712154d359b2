//! LRU Backend
//!
//! Bounded in-memory cache evicting the least recently used entry.
//!
//! # Design
//!
//! - Storage is a [`TransientMap`]; a recency queue records the keys, most
//!   recently used at the back
//! - A hit through `cached` moves the key to the back; `is_cached` does not
//!   touch recency
//! - Each put evicts at most one entry: the front of the queue, when the
//!   queue already holds `capacity` keys before the new one is appended

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::backend::{CacheBackend, ConfigurableBackend};
use super::key::CallKey;
use super::stats::{BackendStats, StatsRecorder};
use super::transient::TransientMap;
use crate::error::{Error, Result};
use crate::settings::SectionConfig;

#[derive(Debug, Default)]
struct LruState {
    store: TransientMap<Value>,
    /// Oldest at the front
    order: VecDeque<CallKey>,
}

impl LruState {
    fn forget(&mut self, key: &CallKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    fn touch(&mut self, key: &CallKey) {
        self.forget(key);
        self.order.push_back(key.clone());
    }
}

/// Least-recently-used backend (`RamLRUCache`)
#[derive(Debug)]
pub struct LruBackend {
    capacity: usize,
    state: Mutex<LruState>,
    stats: StatsRecorder,
}

impl LruBackend {
    /// Create a backend holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
            stats: StatsRecorder::new(),
        }
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used
    pub fn recency(&self) -> Vec<CallKey> {
        self.state.lock().order.iter().cloned().collect()
    }
}

impl ConfigurableBackend for LruBackend {
    const MODULE: &'static str = "RamLRUCache";

    fn check_conf(config: &SectionConfig) -> Result<()> {
        config.require_module(Self::MODULE)?;
        config.integer(Self::MODULE, "size")?;
        Ok(())
    }

    fn from_config(config: &SectionConfig) -> Result<Self> {
        let size = config.integer(Self::MODULE, "size")?;
        let capacity = usize::try_from(size).map_err(|_| Error::MalformedValue {
            field: "size",
            reason: "is too large".to_string(),
        })?;
        Ok(Self::new(capacity))
    }
}

impl CacheBackend for LruBackend {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn is_cached(&self, key: &CallKey) -> bool {
        let hit = self.state.lock().store.contains(key);
        self.stats.record_lookup(hit);
        hit
    }

    fn cached(&self, key: &CallKey) -> Result<Value> {
        let mut state = self.state.lock();
        let value = state
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotCached(key.composite()))?;
        state.touch(key);
        Ok(value)
    }

    fn put_in_cache(&self, key: &CallKey, result: Value) -> Result<Value> {
        let mut state = self.state.lock();
        state.forget(key);

        if state.order.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.store.remove(&oldest);
                self.stats.record_eviction();
                debug!(evicted = %oldest, capacity = self.capacity, "LRU eviction");
            }
        }

        state.order.push_back(key.clone());
        state.store.insert(key, result.clone());
        self.stats.record_write();
        Ok(result)
    }

    fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.store.clear();
        state.order.clear();
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
