//! Transient Map Backend
//!
//! Unbounded in-memory storage with no eviction and no expiry.
//!
//! # Design
//!
//! - Three-level map: function -> args repr -> kwargs repr -> value
//! - Intermediate levels are created lazily on insert and pruned on removal
//! - [`TransientMap`] is generic over the stored value so the LRU and TTL
//!   backends reuse it and layer their policy on top

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use super::backend::{CacheBackend, ConfigurableBackend};
use super::key::CallKey;
use super::stats::{BackendStats, StatsRecorder};
use crate::error::{Error, Result};
use crate::settings::SectionConfig;

type KwargsLevel<V> = HashMap<String, V>;
type ArgsLevel<V> = HashMap<String, KwargsLevel<V>>;

/// Three-level map keyed by the components of a [`CallKey`]
#[derive(Debug, Clone)]
pub struct TransientMap<V> {
    functions: HashMap<String, ArgsLevel<V>>,
    len: usize,
}

impl<V> Default for TransientMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TransientMap<V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            len: 0,
        }
    }

    /// Three-level membership test
    pub fn contains(&self, key: &CallKey) -> bool {
        self.get(key).is_some()
    }

    /// Three-level lookup
    pub fn get(&self, key: &CallKey) -> Option<&V> {
        self.functions
            .get(key.function())?
            .get(key.args_repr())?
            .get(key.kwargs_repr())
    }

    /// Insert a value, returning the old value if present
    pub fn insert(&mut self, key: &CallKey, value: V) -> Option<V> {
        let old = self
            .functions
            .entry(key.function().to_string())
            .or_default()
            .entry(key.args_repr().to_string())
            .or_default()
            .insert(key.kwargs_repr().to_string(), value);

        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Remove a value, returning it if present
    pub fn remove(&mut self, key: &CallKey) -> Option<V> {
        let by_args = self.functions.get_mut(key.function())?;
        let by_kwargs = by_args.get_mut(key.args_repr())?;
        let removed = by_kwargs.remove(key.kwargs_repr())?;

        if by_kwargs.is_empty() {
            by_args.remove(key.args_repr());
        }
        if by_args.is_empty() {
            self.functions.remove(key.function());
        }

        self.len -= 1;
        Some(removed)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct function identifiers
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.functions.clear();
        self.len = 0;
    }
}

// =============================================================================
// Memory Backend
// =============================================================================

/// Transient map backend (`RamCache`)
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Mutex<TransientMap<Value>>,
    stats: StatsRecorder,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigurableBackend for MemoryBackend {
    const MODULE: &'static str = "RamCache";

    fn check_conf(config: &SectionConfig) -> Result<()> {
        config.require_module(Self::MODULE)
    }

    fn from_config(_config: &SectionConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

impl CacheBackend for MemoryBackend {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn is_cached(&self, key: &CallKey) -> bool {
        let hit = self.store.lock().contains(key);
        self.stats.record_lookup(hit);
        hit
    }

    fn cached(&self, key: &CallKey) -> Result<Value> {
        self.store
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotCached(key.composite()))
    }

    fn put_in_cache(&self, key: &CallKey, result: Value) -> Result<Value> {
        self.store.lock().insert(key, result.clone());
        self.stats.record_write();
        trace!(key = %key, "stored result");
        Ok(result)
    }

    fn len(&self) -> usize {
        self.store.lock().len()
    }

    fn clear(&self) -> Result<()> {
        self.store.lock().clear();
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
