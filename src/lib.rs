//! modcache - Modular Function Result Cache
//!
//! Memoizes function calls behind a backend chosen by name from
//! configuration, so repeated calls with identical arguments skip
//! recomputation.
//!
//! # Architecture
//!
//! ```text
//! memoize::call ──▶ BackendRegistry::lookup(selector) ──▶ CacheBackend
//!                                                          ├─ MemoryBackend
//!                                                          ├─ LruBackend
//!                                                          ├─ TtlBackend
//!                                                          └─ FsBackend ◀── Janitor thread
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use modcache::{BackendRegistry, CacheSettings, Memoized};
//! use serde_json::json;
//!
//! let settings = CacheSettings::from_file("cache.yaml")?;
//! let registry = Arc::new(BackendRegistry::from_settings(&settings)?);
//!
//! let add = Memoized::new(Arc::clone(&registry), "ram", "add");
//! let sum: i64 = add.call_positional(&[json!(1), json!(2)], || 1 + 2)?;
//! assert_eq!(sum, 3);
//!
//! registry.stop_all();
//! # Ok::<(), modcache::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Backend contract and the four backends
//! - [`error`] - Error types
//! - [`memoize`] - Call-site wrapper
//! - [`registry`] - Selector to backend mapping
//! - [`settings`] - YAML configuration sections

pub mod cache;
pub mod error;
pub mod memoize;
pub mod registry;
pub mod settings;

// Re-export commonly used types
pub use cache::{
    BackendKind, BackendStats, CacheBackend, CallKey, ConfigurableBackend, FsBackend, Kwargs,
    LruBackend, MemoryBackend, TtlBackend,
};
pub use error::{Error, Result};
pub use memoize::Memoized;
pub use registry::BackendRegistry;
pub use settings::{CacheSettings, SectionConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
