//! TTL Backend
//!
//! In-memory cache whose entries are valid for a fixed duration after their
//! last write. Reads never extend validity.
//!
//! Expiry is lazy: an expired entry is reported as absent but stays in
//! memory until the same key is written again. Nothing sweeps it.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use super::backend::{CacheBackend, ConfigurableBackend};
use super::key::CallKey;
use super::stats::{BackendStats, StatsRecorder};
use super::transient::TransientMap;
use crate::error::{Error, Result};
use crate::settings::SectionConfig;

#[derive(Debug, Clone)]
struct TimedValue {
    value: Value,
    written_at: Instant,
}

impl TimedValue {
    #[inline]
    fn is_valid(&self, duration: Duration) -> bool {
        self.written_at.elapsed() < duration
    }
}

/// Time-limited backend (`TimeLimitedRamCache`)
#[derive(Debug)]
pub struct TtlBackend {
    duration: Duration,
    store: Mutex<TransientMap<TimedValue>>,
    stats: StatsRecorder,
}

impl TtlBackend {
    /// Create a backend whose entries stay valid for `duration`
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            store: Mutex::new(TransientMap::new()),
            stats: StatsRecorder::new(),
        }
    }

    /// Get validity duration
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl ConfigurableBackend for TtlBackend {
    const MODULE: &'static str = "TimeLimitedRamCache";

    fn check_conf(config: &SectionConfig) -> Result<()> {
        config.require_module(Self::MODULE)?;
        config.integer(Self::MODULE, "duration")?;
        Ok(())
    }

    fn from_config(config: &SectionConfig) -> Result<Self> {
        let seconds = config.integer(Self::MODULE, "duration")?;
        Ok(Self::new(Duration::from_secs(seconds)))
    }
}

impl CacheBackend for TtlBackend {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn is_cached(&self, key: &CallKey) -> bool {
        let hit = self
            .store
            .lock()
            .get(key)
            .is_some_and(|entry| entry.is_valid(self.duration));
        self.stats.record_lookup(hit);
        hit
    }

    fn cached(&self, key: &CallKey) -> Result<Value> {
        self.store
            .lock()
            .get(key)
            .filter(|entry| entry.is_valid(self.duration))
            .map(|entry| entry.value.clone())
            .ok_or_else(|| Error::NotCached(key.composite()))
    }

    fn put_in_cache(&self, key: &CallKey, result: Value) -> Result<Value> {
        let entry = TimedValue {
            value: result.clone(),
            written_at: Instant::now(),
        };
        if self.store.lock().insert(key, entry).is_some() {
            trace!(key = %key, "replaced entry, validity restarted");
        }
        self.stats.record_write();
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
