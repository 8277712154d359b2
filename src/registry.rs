//! Backend Registry
//!
//! Named collection of live backends. A registry is built once from the
//! configuration and then shared (usually behind an `Arc`) with every call
//! site; there is no process-wide instance.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::cache::{BackendKind, CacheBackend};
use crate::error::Result;
use crate::settings::CacheSettings;

/// Selector to backend mapping
#[derive(Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<dyn CacheBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every configured section, then build and register backends
    ///
    /// Nothing is constructed unless all sections pass their checks, so a
    /// bad section never leaves a half-started filesystem janitor behind.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        let selectors = settings.selectors()?;

        let mut plan = Vec::with_capacity(selectors.len());
        for selector in &selectors {
            let section = settings.section_for(selector)?;
            plan.push((selector, section));
        }

        let mut kinds = Vec::with_capacity(plan.len());
        for (selector, section) in &plan {
            let kind = BackendKind::for_section(section)?;
            kind.check_conf(section)?;
            debug!(selector = %selector, module = %kind, "Cache section valid");
            kinds.push(kind);
        }

        let registry = Self::new();
        for ((selector, section), kind) in plan.into_iter().zip(kinds) {
            let backend = match kind.build(section) {
                Ok(backend) => backend,
                Err(e) => {
                    registry.stop_all();
                    return Err(e);
                }
            };
            registry.insert(selector.clone(), backend);
        }

        info!(backends = registry.len(), "Cache registry built");
        Ok(registry)
    }

    /// Insert a backend, returning the one previously under `selector`
    pub fn insert(
        &self,
        selector: impl Into<String>,
        backend: Arc<dyn CacheBackend>,
    ) -> Option<Arc<dyn CacheBackend>> {
        self.backends.insert(selector.into(), backend)
    }

    /// Backend registered under `selector`
    pub fn lookup(&self, selector: &str) -> Option<Arc<dyn CacheBackend>> {
        self.backends
            .get(selector)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Check if `selector` is registered
    pub fn contains(&self, selector: &str) -> bool {
        self.backends.contains_key(selector)
    }

    /// Remove and return the backend under `selector`
    pub fn remove(&self, selector: &str) -> Option<Arc<dyn CacheBackend>> {
        self.backends.remove(selector).map(|(_, backend)| backend)
    }

    /// Registered selectors, sorted
    pub fn selectors(&self) -> Vec<String> {
        let mut selectors: Vec<String> = self
            .backends
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        selectors.sort();
        selectors
    }

    /// Number of registered backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Stop background work of every backend
    pub fn stop_all(&self) {
        for entry in self.backends.iter() {
            entry.value().stop();
        }
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for selector in self.selectors() {
            if let Some(backend) = self.lookup(&selector) {
                map.entry(&selector, &backend.module());
            }
        }
        map.finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
