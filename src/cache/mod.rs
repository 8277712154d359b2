//! Cache Backends
//!
//! Pluggable storage for memoized call results.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         CacheBackend (trait)                         │
//! ├─────────────────┬─────────────────┬─────────────────┬────────────────┤
//! │ RamCache        │ RamLRUCache     │ TimeLimited-    │ FsCache        │
//! │                 │                 │ RamCache        │                │
//! │ TransientMap    │ TransientMap    │ TransientMap    │ one file per   │
//! │ (unbounded)     │ + recency queue │ + write instant │ key (SHA-1)    │
//! │                 │                 │                 │ + Janitor      │
//! └─────────────────┴─────────────────┴─────────────────┴────────────────┘
//! ```
//!
//! In-memory backends hold one mutex per instance. The filesystem backend
//! takes no lock; its janitor thread and foreground calls touch the
//! directory without coordination (see [`janitor`]).

mod backend;
mod fs;
pub mod janitor;
mod key;
mod lru;
mod stats;
mod transient;
mod ttl;

pub use backend::{BackendKind, CacheBackend, ConfigurableBackend};
pub use fs::{FsBackend, FsConfig};
pub use janitor::{Janitor, JanitorHandle, SweepReport};
pub use key::{CallKey, Kwargs, COMPOSITE_SEPARATOR};
pub use lru::LruBackend;
pub use stats::{BackendStats, StatsRecorder};
pub use transient::{MemoryBackend, TransientMap};
pub use ttl::TtlBackend;
