//! Call Keys
//!
//! Identity of one memoized call: function identifier plus the textual
//! representations of its positional and keyword arguments.
//!
//! Key derivation is representation-based. `1` and `1.0` render differently
//! and therefore never collide, even though they compare equal as numbers.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use sha1::{Digest, Sha1};

/// Keyword arguments, ordered by name so their representation is stable
pub type Kwargs = BTreeMap<String, Value>;

/// Separator between the three components of a composite key
pub const COMPOSITE_SEPARATOR: &str = "||";

/// Cache key - function identifier and argument representations
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallKey {
    /// Function identifier
    function: String,
    /// Compact JSON text of the positional arguments
    args: String,
    /// Compact JSON text of the keyword arguments
    kwargs: String,
}

impl CallKey {
    /// Derive the key of a call
    pub fn new(function: impl Into<String>, args: &[Value], kwargs: &Kwargs) -> Self {
        Self {
            function: function.into(),
            args: args_repr(args),
            kwargs: kwargs_repr(kwargs),
        }
    }

    /// Key for a call without keyword arguments
    pub fn positional(function: impl Into<String>, args: &[Value]) -> Self {
        Self::new(function, args, &Kwargs::new())
    }

    /// Get function identifier
    #[inline]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Get positional arguments representation
    #[inline]
    pub fn args_repr(&self) -> &str {
        &self.args
    }

    /// Get keyword arguments representation
    #[inline]
    pub fn kwargs_repr(&self) -> &str {
        &self.kwargs
    }

    /// `function||args||kwargs`
    pub fn composite(&self) -> String {
        [
            self.function.as_str(),
            self.args.as_str(),
            self.kwargs.as_str(),
        ]
        .join(COMPOSITE_SEPARATOR)
    }

    /// Hex SHA-1 of the concatenated components (40 lowercase chars)
    pub fn digest(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.function.as_bytes());
        hasher.update(self.args.as_bytes());
        hasher.update(self.kwargs.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.function,
            self.args,
            self.kwargs,
            sep = COMPOSITE_SEPARATOR
        )
    }
}

/// Same text `serde_json::to_string` produces for the array
fn args_repr(args: &[Value]) -> String {
    let items: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("[{}]", items.join(","))
}

/// Same text `serde_json::to_string` produces for the object
fn kwargs_repr(kwargs: &Kwargs) -> String {
    let items: Vec<String> = kwargs
        .iter()
        .map(|(name, value)| format!("{}:{}", Value::from(name.as_str()), value))
        .collect();
    format!("{{{}}}", items.join(","))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn kwargs(pairs: &[(&str, Value)]) -> Kwargs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_reprs_match_serde_json() {
        let args = vec![json!(1), json!("two"), json!([3, {"x": null}])];
        let kw = kwargs(&[("b", json!(2.5)), ("a", json!({"k": [true]}))]);
        let key = CallKey::new("f", &args, &kw);

        assert_eq!(key.args_repr(), serde_json::to_string(&args).unwrap());
        assert_eq!(key.kwargs_repr(), serde_json::to_string(&kw).unwrap());
    }

    #[test]
    fn test_composite() {
        let key = CallKey::positional("a", &[json!(1), json!(2)]);
        assert_eq!(key.composite(), "a||[1,2]||{}");
        assert_eq!(key.to_string(), key.composite());
    }

    #[test]
    fn test_digest_known_values() {
        let key = CallKey::positional("a", &[json!(1), json!(2)]);
        assert_eq!(key.digest(), "276598b0b8780c30bdbee1ddfd782c4d95c9f7ac");

        let key = CallKey::new("add", &[json!(1), json!(2)], &kwargs(&[("scale", json!(3))]));
        assert_eq!(key.digest(), "c9cf300362cc98c797e195a74caae08871087294");
    }

    #[test]
    fn test_kwargs_order_does_not_matter() {
        let mut first = Kwargs::new();
        first.insert("x".into(), json!(1));
        first.insert("y".into(), json!(2));
        let mut second = Kwargs::new();
        second.insert("y".into(), json!(2));
        second.insert("x".into(), json!(1));

        assert_eq!(
            CallKey::new("f", &[], &first),
            CallKey::new("f", &[], &second)
        );
    }

    #[test]
    fn test_representation_based_equality() {
        let int = CallKey::positional("f", &[json!(1)]);
        let float = CallKey::positional("f", &[json!(1.0)]);
        assert_ne!(int, float);
        assert_ne!(int.digest(), float.digest());
    }

    proptest! {
        #[test]
        fn prop_digest_is_deterministic(
            function in "[a-z_]{1,12}",
            args in proptest::collection::vec(any::<i64>(), 0..6),
            kw in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..4),
        ) {
            let args: Vec<Value> = args.into_iter().map(Value::from).collect();
            let kw: Kwargs = kw.into_iter().map(|(k, v)| (k, Value::from(v))).collect();

            let first = CallKey::new(function.clone(), &args, &kw);
            let second = CallKey::new(function, &args, &kw);
            prop_assert_eq!(first.digest(), second.digest());
            prop_assert_eq!(first.digest().len(), 40);
            prop_assert!(first.digest().chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn prop_any_component_change_changes_digest(
            function in "[a-z]{1,8}",
            arg in any::<i64>(),
            value in any::<i32>(),
        ) {
            let kw = kwargs(&[("k", Value::from(value))]);
            let base = CallKey::new(function.clone(), &[Value::from(arg)], &kw);

            let renamed = CallKey::new(format!("{}_", function), &[Value::from(arg)], &kw);
            let other_arg =
                CallKey::new(function.clone(), &[Value::from(arg), Value::from(0)], &kw);
            let other_kw = CallKey::new(
                function,
                &[Value::from(arg)],
                &kwargs(&[("k2", Value::from(value))]),
            );

            prop_assert_ne!(base.digest(), renamed.digest());
            prop_assert_ne!(base.digest(), other_arg.digest());
            prop_assert_ne!(base.digest(), other_kw.digest());
        }
    }
}
