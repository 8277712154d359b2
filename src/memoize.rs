//! Memoized Calls
//!
//! Routes a function call through the backend registered under a selector.
//!
//! ```text
//! lookup(selector) ── absent ──▶ f()                          (uncached)
//!        │
//!     present ──▶ is_cached? ── yes ──▶ cached()              (hit)
//!                     │
//!                     no ──▶ f() ──▶ put_in_cache(result)     (miss)
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CallKey, Kwargs};
use crate::error::{Error, Result};
use crate::registry::BackendRegistry;

/// Call `f` through the backend registered under `selector`
///
/// With no backend under `selector`, `f` runs once and nothing is stored.
/// If the entry vanishes between the lookup and the read (a concurrent
/// expiry sweep), the result is recomputed and stored again.
pub fn call<T, F>(
    registry: &BackendRegistry,
    selector: &str,
    function: &str,
    args: &[Value],
    kwargs: &Kwargs,
    f: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(backend) = registry.lookup(selector) else {
        return Ok(f());
    };

    let key = CallKey::new(function, args, kwargs);
    if backend.is_cached(&key) {
        match backend.cached(&key) {
            Ok(value) => {
                debug!(selector, key = %key, "cache hit");
                return Ok(serde_json::from_value(value)?);
            }
            Err(Error::NotCached(_)) => {
                warn!(selector, key = %key, "entry expired between lookup and read");
            }
            Err(e) => return Err(e),
        }
    }

    let result = f();
    backend.put_in_cache(&key, serde_json::to_value(&result)?)?;
    debug!(selector, key = %key, "cache miss, stored result");
    Ok(result)
}

/// A function identifier bound to a registry selector
#[derive(Debug, Clone)]
pub struct Memoized {
    registry: Arc<BackendRegistry>,
    selector: String,
    function: String,
}

impl Memoized {
    /// Bind `function` to the backend under `selector`
    pub fn new(
        registry: Arc<BackendRegistry>,
        selector: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            selector: selector.into(),
            function: function.into(),
        }
    }

    /// Get selector
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Get function identifier
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Memoized call with positional and keyword arguments
    pub fn call<T, F>(&self, args: &[Value], kwargs: &Kwargs, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        call(
            &self.registry,
            &self.selector,
            &self.function,
            args,
            kwargs,
            f,
        )
    }

    /// Memoized call with positional arguments only
    pub fn call_positional<T, F>(&self, args: &[Value], f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.call(args, &Kwargs::new(), f)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, LruBackend, MemoryBackend};
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;

    fn registry_with_ram() -> BackendRegistry {
        let registry = BackendRegistry::new();
        registry.insert("ram", Arc::new(MemoryBackend::new()));
        registry
    }

    #[test]
    fn test_miss_then_hit() {
        let registry = registry_with_ram();
        let calls = Cell::new(0);
        let add = |a: i64, b: i64| {
            calls.set(calls.get() + 1);
            a + b
        };

        let args = [json!(1), json!(2)];
        let first: i64 = call(&registry, "ram", "foo", &args, &Kwargs::new(), || add(1, 2)).unwrap();
        let second: i64 =
            call(&registry, "ram", "foo", &args, &Kwargs::new(), || add(1, 2)).unwrap();

        assert_eq!(first, 3);
        assert_eq!(second, 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unknown_selector_runs_uncached() {
        let registry = registry_with_ram();
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value: i64 = call(&registry, "nothing", "foo", &[json!(1)], &Kwargs::new(), || {
                calls.set(calls.get() + 1);
                7
            })
            .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.get(), 3);
        assert!(registry.lookup("ram").unwrap().is_empty());
    }

    #[test]
    fn test_distinct_arguments_are_distinct_entries() {
        let registry = registry_with_ram();
        let square = Memoized::new(Arc::new(registry), "ram", "square");

        let four: i64 = square.call_positional(&[json!(2)], || 4).unwrap();
        let nine: i64 = square.call_positional(&[json!(3)], || 9).unwrap();
        let four_again: i64 = square.call_positional(&[json!(2)], || -1).unwrap();

        assert_eq!((four, nine, four_again), (4, 9, 4));
    }

    #[test]
    fn test_kwargs_are_part_of_the_key() {
        let registry = Arc::new(registry_with_ram());
        let scaled = Memoized::new(registry, "ram", "scaled");

        let mut by_two = Kwargs::new();
        by_two.insert("scale".into(), json!(2));
        let mut by_three = Kwargs::new();
        by_three.insert("scale".into(), json!(3));

        let a: i64 = scaled.call(&[json!(5)], &by_two, || 10).unwrap();
        let b: i64 = scaled.call(&[json!(5)], &by_three, || 15).unwrap();
        assert_eq!((a, b), (10, 15));
    }

    #[test]
    fn test_struct_results_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Report {
            name: String,
            values: Vec<f64>,
            nested: Option<Box<Report>>,
        }

        let registry = Arc::new(registry_with_ram());
        let build = Memoized::new(registry, "ram", "report");
        let make = || Report {
            name: "outer".into(),
            values: vec![1.5, 2.0],
            nested: Some(Box::new(Report {
                name: "inner".into(),
                values: vec![],
                nested: None,
            })),
        };

        let first: Report = build.call_positional(&[], make).unwrap();
        let second: Report = build
            .call_positional(&[], || panic!("should be cached"))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_evicted_entry_is_recomputed() {
        let registry = BackendRegistry::new();
        registry.insert("lru", Arc::new(LruBackend::new(1)));
        let calls = Cell::new(0);
        let run = |arg: i64| -> i64 {
            call(&registry, "lru", "f", &[json!(arg)], &Kwargs::new(), || {
                calls.set(calls.get() + 1);
                arg
            })
            .unwrap()
        };

        run(1);
        run(2);
        run(1);
        assert_eq!(calls.get(), 3);
    }
}
