//! Filesystem Backend
//!
//! Persists each result as a file in a cache directory.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   276598b0b8780c30bdbee1ddfd782c4d95c9f7ac   <- SHA-1 of function + args + kwargs
//!   c9cf300362cc98c797e195a74caae08871087294
//! ```
//!
//! Files hold the JSON-serialized result. There is no index: the directory
//! listing is the cache. Reads and writes refresh the file's access time,
//! which the [`Janitor`] thread compares against the expiration delay.
//!
//! A put writes a `.pending-*` file next to the target and renames it into
//! place. Pending files are ignored by lookups, `len()` and the janitor.

use std::fs::{self, FileTimes, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tracing::{trace, warn};

use super::backend::{CacheBackend, ConfigurableBackend};
use super::janitor::{is_cache_file, Janitor, JanitorHandle, PENDING_PREFIX};
use super::key::CallKey;
use super::stats::{BackendStats, StatsRecorder};
use crate::error::{Error, Result};
use crate::settings::SectionConfig;

const REQUIRED_FIELDS: [&str; 3] = ["dir", "freq", "expirationdelay"];

/// Filesystem backend configuration
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Cache directory path
    pub dir: PathBuf,
    /// Interval between janitor sweeps
    pub freq: Duration,
    /// Time since last access after which a file is deleted
    pub expiration_delay: Duration,
}

impl FsConfig {
    /// Read the configuration from a section
    pub fn from_section(config: &SectionConfig) -> Result<Self> {
        Ok(Self {
            dir: config.path(FsBackend::MODULE, "dir")?,
            freq: Duration::from_secs(config.integer(FsBackend::MODULE, "freq")?),
            expiration_delay: Duration::from_secs(
                config.integer(FsBackend::MODULE, "expirationdelay")?,
            ),
        })
    }
}

/// Filesystem backend (`FsCache`)
#[derive(Debug)]
pub struct FsBackend {
    dir: PathBuf,
    stats: Arc<StatsRecorder>,
    janitor: JanitorHandle,
}

impl FsBackend {
    /// Create the backend and start its janitor thread
    pub fn new(config: FsConfig) -> Result<Self> {
        let stats = Arc::new(StatsRecorder::new());
        let janitor = Janitor::with_stats(&config.dir, config.expiration_delay, Arc::clone(&stats))
            .spawn(config.freq)?;

        Ok(Self {
            dir: config.dir,
            stats,
            janitor,
        })
    }

    /// Get cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &CallKey) -> PathBuf {
        self.dir.join(key.digest())
    }

    /// Check if the janitor thread is still running
    pub fn is_janitor_running(&self) -> bool {
        self.janitor.is_running()
    }

    fn cache_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if is_cache_file(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Set the file's access time to now, leaving its modification time alone
fn touch_accessed(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(SystemTime::now()))
}

impl ConfigurableBackend for FsBackend {
    const MODULE: &'static str = "FsCache";

    fn check_conf(config: &SectionConfig) -> Result<()> {
        config.require_module(Self::MODULE)?;
        config.require_fields(Self::MODULE, &REQUIRED_FIELDS)?;

        let dir = config.path(Self::MODULE, "dir")?;
        if !dir.is_dir() {
            return Err(Error::InvalidCacheDir(dir));
        }

        if config.integer(Self::MODULE, "freq")? == 0 {
            return Err(Error::MalformedValue {
                field: "freq",
                reason: "must be a positive integer".to_string(),
            });
        }
        config.integer(Self::MODULE, "expirationdelay")?;
        Ok(())
    }

    fn from_config(config: &SectionConfig) -> Result<Self> {
        Self::new(FsConfig::from_section(config)?)
    }
}

impl CacheBackend for FsBackend {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn is_cached(&self, key: &CallKey) -> bool {
        let hit = self.path_for(key).is_file();
        self.stats.record_lookup(hit);
        hit
    }

    fn cached(&self, key: &CallKey) -> Result<Value> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotCached(key.composite()))
            }
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_slice(&bytes)?;

        if let Err(e) = touch_accessed(&path) {
            warn!(file = %path.display(), error = %e, "Failed to refresh access time");
        }
        Ok(value)
    }

    fn put_in_cache(&self, key: &CallKey, result: Value) -> Result<Value> {
        let path = self.path_for(key);

        // readers see either the previous blob or the complete new one
        let mut pending = tempfile::Builder::new()
            .prefix(PENDING_PREFIX)
            .tempfile_in(&self.dir)?;
        pending.write_all(&serde_json::to_vec(&result)?)?;
        pending
            .as_file()
            .set_times(FileTimes::new().set_accessed(SystemTime::now()))?;
        pending.persist(&path).map_err(|e| e.error)?;

        self.stats.record_write();
        trace!(key = %key, file = %path.display(), "stored result");
        Ok(result)
    }

    fn len(&self) -> usize {
        match self.cache_files() {
            Ok(files) => files.len(),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list cache directory");
                0
            }
        }
    }

    fn clear(&self) -> Result<()> {
        for path in self.cache_files()? {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }

    fn stop(&self) {
        self.janitor.stop();
    }
}

// =============================================================================
// Tests
// =============================================================================
