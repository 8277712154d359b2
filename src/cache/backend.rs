//! Cache Backend Contract
//!
//! Every backend implements [`CacheBackend`] for runtime use and
//! [`ConfigurableBackend`] for validation and construction from a
//! configuration section. [`BackendKind`] is the closed table mapping a
//! section's `module` name to the backend type that handles it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use super::fs::FsBackend;
use super::key::CallKey;
use super::lru::LruBackend;
use super::stats::BackendStats;
use super::transient::MemoryBackend;
use super::ttl::TtlBackend;
use crate::error::{Error, Result};
use crate::settings::SectionConfig;

/// Runtime contract shared by all backends
///
/// Call sites follow one protocol: `is_cached`, then `cached` on a hit or
/// `put_in_cache` with a freshly computed result on a miss.
pub trait CacheBackend: Send + Sync {
    /// Module name this backend is configured under
    fn module(&self) -> &'static str;

    /// True iff a currently valid entry exists for `key`
    fn is_cached(&self, key: &CallKey) -> bool;

    /// Stored result for `key`
    ///
    /// Only meaningful after `is_cached` returned true. A missing entry is
    /// reported as [`Error::NotCached`].
    fn cached(&self, key: &CallKey) -> Result<Value>;

    /// Store `result` under `key` and hand it back unchanged
    fn put_in_cache(&self, key: &CallKey, result: Value) -> Result<Value>;

    /// Number of stored entries, valid or not
    fn len(&self) -> usize;

    /// Check if nothing is stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored entry
    fn clear(&self) -> Result<()>;

    /// Traffic counters
    fn stats(&self) -> BackendStats;

    /// Stop background work owned by the backend
    fn stop(&self) {}
}

/// Construction side of a backend type
pub trait ConfigurableBackend: CacheBackend + Sized + 'static {
    /// Value of `module` selecting this backend
    const MODULE: &'static str;

    /// Validate a section without side effects
    fn check_conf(config: &SectionConfig) -> Result<()>;

    /// Build an instance from a section that passed `check_conf`
    fn from_config(config: &SectionConfig) -> Result<Self>;
}

// =============================================================================
// Backend Kind
// =============================================================================

/// Known backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Unbounded in-memory map
    Memory,
    /// Bounded least-recently-used map
    Lru,
    /// Time-limited in-memory map
    Ttl,
    /// Files on disk with background expiry
    Filesystem,
}

impl BackendKind {
    /// All backend kinds
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Memory,
        BackendKind::Lru,
        BackendKind::Ttl,
        BackendKind::Filesystem,
    ];

    /// Module name used in configuration
    pub fn module_name(self) -> &'static str {
        match self {
            BackendKind::Memory => MemoryBackend::MODULE,
            BackendKind::Lru => LruBackend::MODULE,
            BackendKind::Ttl => TtlBackend::MODULE,
            BackendKind::Filesystem => FsBackend::MODULE,
        }
    }

    /// Resolve the kind named by a section's `module` option
    pub fn for_section(config: &SectionConfig) -> Result<Self> {
        match config.module() {
            Some(module) => module.parse(),
            None => Err(Error::UnknownModule(String::new())),
        }
    }

    /// Validate `config` for this kind
    pub fn check_conf(self, config: &SectionConfig) -> Result<()> {
        match self {
            BackendKind::Memory => MemoryBackend::check_conf(config),
            BackendKind::Lru => LruBackend::check_conf(config),
            BackendKind::Ttl => TtlBackend::check_conf(config),
            BackendKind::Filesystem => FsBackend::check_conf(config),
        }
    }

    /// Construct a backend of this kind
    pub fn build(self, config: &SectionConfig) -> Result<Arc<dyn CacheBackend>> {
        Ok(match self {
            BackendKind::Memory => Arc::new(MemoryBackend::from_config(config)?),
            BackendKind::Lru => Arc::new(LruBackend::from_config(config)?),
            BackendKind::Ttl => Arc::new(TtlBackend::from_config(config)?),
            BackendKind::Filesystem => Arc::new(FsBackend::from_config(config)?),
        })
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.module_name() == s)
            .ok_or_else(|| Error::UnknownModule(s.to_string()))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name())
    }
}

// =============================================================================
// Tests
// =============================================================================
