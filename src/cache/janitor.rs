//! Filesystem Janitor
//!
//! Background sweeper deleting cache files that have not been accessed for
//! longer than the expiration delay.
//!
//! # Concurrency
//!
//! The janitor shares the cache directory with foreground lookups without
//! any locking. A sweep may delete a file between a caller's `is_cached`
//! and `cached`; the caller then sees [`crate::Error::NotCached`]. A put may
//! also land just after a sweep listed the directory, in which case the new
//! file is judged on its fresh access time and survives.
//!
//! Stopping is cooperative: the flag is checked before every sweep and the
//! wait between sweeps listens for the shutdown signal, but a sweep that has
//! started always runs to completion.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::stats::StatsRecorder;

/// Filename prefix of writes still in flight; such files are never swept
pub(crate) const PENDING_PREFIX: &str = ".pending-";

/// True for regular files holding a stored result
pub(crate) fn is_cache_file(path: &Path) -> bool {
    let pending = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(PENDING_PREFIX));
    !pending && path.is_file()
}

/// Outcome of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Regular files inspected
    pub scanned: usize,
    /// Files deleted as expired
    pub removed: usize,
    /// Reference time of the sweep
    pub swept_at: DateTime<Utc>,
}

/// Sweep logic for one cache directory
#[derive(Debug, Clone)]
pub struct Janitor {
    dir: PathBuf,
    expiration_delay: Duration,
    stats: Arc<StatsRecorder>,
}

impl Janitor {
    /// Create a janitor for `dir`
    pub fn new(dir: impl Into<PathBuf>, expiration_delay: Duration) -> Self {
        Self::with_stats(dir, expiration_delay, Arc::new(StatsRecorder::new()))
    }

    /// Create a janitor reporting expirations into `stats`
    pub fn with_stats(
        dir: impl Into<PathBuf>,
        expiration_delay: Duration,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            dir: dir.into(),
            expiration_delay,
            stats,
        }
    }

    /// True if the file's last access plus the delay is at or before `now`
    ///
    /// A deadline past the representable time range never expires.
    pub fn is_expired(&self, path: &Path, now: SystemTime) -> io::Result<bool> {
        let accessed = fs::metadata(path)?.accessed()?;
        Ok(accessed
            .checked_add(self.expiration_delay)
            .map_or(false, |deadline| deadline <= now))
    }

    /// Delete every expired regular file in the directory
    ///
    /// Failure to list the directory is an error; failures on single files
    /// are logged and skipped.
    pub fn sweep(&self, now: SystemTime) -> io::Result<SweepReport> {
        let mut report = SweepReport {
            scanned: 0,
            removed: 0,
            swept_at: DateTime::<Utc>::from(now),
        };

        for entry in fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Unreadable directory entry");
                    continue;
                }
            };
            if !is_cache_file(&path) {
                continue;
            }
            report.scanned += 1;

            match self.is_expired(&path, now) {
                Ok(true) => match fs::remove_file(&path) {
                    Ok(()) => {
                        report.removed += 1;
                        debug!(file = %path.display(), "Removed expired cache file");
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Failed to remove cache file")
                    }
                },
                Ok(false) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to stat cache file"),
            }
        }

        self.stats.record_expirations(report.removed as u64);
        Ok(report)
    }

    /// Run sweeps every `freq` on a dedicated thread
    pub fn spawn(self, freq: Duration) -> io::Result<JanitorHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("modcache-janitor".to_string())
            .spawn(move || {
                info!(
                    dir = %self.dir.display(),
                    freq_secs = freq.as_secs_f64(),
                    expiration_delay_secs = self.expiration_delay.as_secs_f64(),
                    "Starting cache janitor"
                );

                while flag.load(Ordering::Acquire) {
                    match self.sweep(SystemTime::now()) {
                        Ok(report) if report.removed > 0 => debug!(
                            scanned = report.scanned,
                            removed = report.removed,
                            "Sweep complete"
                        ),
                        Ok(_) => {}
                        Err(e) => warn!(dir = %self.dir.display(), error = %e, "Sweep failed"),
                    }

                    match shutdown_rx.recv_timeout(freq) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                info!(dir = %self.dir.display(), "Cache janitor stopped");
            })?;

        Ok(JanitorHandle {
            running,
            shutdown: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }
}

/// Owner of a running janitor thread
///
/// Dropping the handle stops the thread.
#[derive(Debug)]
pub struct JanitorHandle {
    running: Arc<AtomicBool>,
    shutdown: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl JanitorHandle {
    /// Check if the thread has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal shutdown and wait for the current sweep to finish
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        // dropping the sender wakes the thread out of its wait
        self.shutdown.lock().take();

        if let Some(thread) = self.thread.lock().take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!("Cache janitor thread panicked");
            }
        }
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"bar").unwrap();
        path
    }

    #[test]
    fn test_is_expired() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "expiredfile");
        let janitor = Janitor::new(dir.path(), Duration::from_secs(1));

        let now = SystemTime::now();
        assert!(!janitor.is_expired(&path, now).unwrap());
        assert!(janitor
            .is_expired(&path, now + Duration::from_secs(2))
            .unwrap());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "boundary");
        let janitor = Janitor::new(dir.path(), Duration::from_secs(5));

        let accessed = fs::metadata(&path).unwrap().accessed().unwrap();
        assert!(janitor
            .is_expired(&path, accessed + Duration::from_secs(5))
            .unwrap());
        assert!(!janitor
            .is_expired(&path, accessed + Duration::from_secs(4))
            .unwrap());
    }

    #[test]
    fn test_huge_delay_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "forever");
        let janitor = Janitor::new(dir.path(), Duration::from_secs(u64::MAX));

        assert!(!janitor.is_expired(&path, SystemTime::now()).unwrap());
        let report = janitor.sweep(SystemTime::now()).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_sweep_skips_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pending = write_file(dir.path(), &format!("{}abc", PENDING_PREFIX));
        let stale = write_file(dir.path(), "stale");
        let janitor = Janitor::new(dir.path(), Duration::ZERO);

        let report = janitor.sweep(SystemTime::now()).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 1);
        assert!(pending.exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_sweep_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_file(dir.path(), "old");
        let stats = Arc::new(StatsRecorder::new());
        let janitor = Janitor::with_stats(dir.path(), Duration::from_secs(60), Arc::clone(&stats));

        let report = janitor.sweep(SystemTime::now()).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 0);
        assert!(old.exists());

        let report = janitor
            .sweep(SystemTime::now() + Duration::from_secs(120))
            .unwrap();
        assert_eq!(report.removed, 1);
        assert!(!old.exists());
        assert_eq!(stats.snapshot().expirations, 1);
    }

    #[test]
    fn test_sweep_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let janitor = Janitor::new(dir.path(), Duration::ZERO);

        let report = janitor
            .sweep(SystemTime::now() + Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.scanned, 0);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_sweep_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(dir.path().join("gone"), Duration::ZERO);
        assert!(janitor.sweep(SystemTime::now()).is_err());
    }

    #[test]
    fn test_spawned_janitor_deletes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "stale");

        let handle = Janitor::new(dir.path(), Duration::from_millis(50))
            .spawn(Duration::from_millis(20))
            .unwrap();
        assert!(handle.is_running());

        sleep(Duration::from_millis(300));
        assert!(!path.exists());

        handle.stop();
        assert!(!handle.is_running());

        // no sweeps after stop
        let survivor = write_file(dir.path(), "survivor");
        sleep(Duration::from_millis(150));
        assert!(survivor.exists());
    }

    #[test]
    fn test_stop_wakes_long_wait() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Janitor::new(dir.path(), Duration::from_secs(60))
            .spawn(Duration::from_secs(3600))
            .unwrap();

        let started = std::time::Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
