//! Cache Settings
//!
//! Section-based cache configuration loaded from YAML.
//!
//! ```yaml
//! ModularCache:
//!   keys: "ram, fscache"
//! Cache_ram:
//!   module: RamCache
//! Cache_fscache:
//!   module: FsCache
//!   dir: /var/cache/modcache
//!   freq: 60
//!   expirationdelay: 3600
//! ```
//!
//! The `ModularCache` section lists the selectors; each selector `name` is
//! configured by the section `Cache_name`. Scalar values may be written as
//! YAML strings or integers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Name of the section listing the configured selectors
pub const MAIN_SECTION: &str = "ModularCache";

/// Prefix of per-selector sections
pub const SECTION_PREFIX: &str = "Cache_";

/// Option of the main section holding the selector list
pub const KEYS_OPTION: &str = "keys";

// =============================================================================
// Section
// =============================================================================

/// Key-value mapping describing one configured cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionConfig(BTreeMap<String, Value>);

impl SectionConfig {
    /// Create an empty section
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value
    pub fn insert(&mut self, option: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(option.into(), value.into());
        self
    }

    /// Get a raw option value
    pub fn get(&self, option: &str) -> Option<&Value> {
        self.0.get(option)
    }

    /// Check if an option is present
    pub fn contains(&self, option: &str) -> bool {
        self.0.contains_key(option)
    }

    /// The `module` option, if it is a string
    pub fn module(&self) -> Option<&str> {
        self.get("module").and_then(Value::as_str)
    }

    /// Fail unless `module` names `expected`
    pub fn require_module(&self, expected: &'static str) -> Result<()> {
        match self.module() {
            Some(module) if module == expected => Ok(()),
            _ => Err(Error::IncoherentSection { expected }),
        }
    }

    /// Fail unless every option in `fields` is present
    pub fn require_fields(&self, module: &'static str, fields: &[&'static str]) -> Result<()> {
        match fields.iter().find(|field| !self.contains(field)) {
            Some(&field) => Err(Error::MissingField { module, field }),
            None => Ok(()),
        }
    }

    /// Read a non-negative integer option
    ///
    /// Accepts JSON/YAML integers and strings holding an integer.
    pub fn integer(&self, module: &'static str, field: &'static str) -> Result<u64> {
        let value = self.get(field).ok_or(Error::MissingField { module, field })?;

        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };

        parsed.ok_or_else(|| Error::MalformedValue {
            field,
            reason: "must be an integer".to_string(),
        })
    }

    /// Read a string option as a path
    pub fn path(&self, module: &'static str, field: &'static str) -> Result<PathBuf> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(PathBuf::from(s)),
            Some(_) => Err(Error::MalformedValue {
                field,
                reason: "must be a path".to_string(),
            }),
            None => Err(Error::MissingField { module, field }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for SectionConfig
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Whole configuration document: section name to section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CacheSettings {
    sections: BTreeMap<String, SectionConfig>,
}

impl CacheSettings {
    /// Parse settings from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Selectors listed in the main section, in declaration order
    pub fn selectors(&self) -> Result<Vec<String>> {
        let main = self
            .sections
            .get(MAIN_SECTION)
            .ok_or(Error::MissingMainSection)?;
        let keys = main.get(KEYS_OPTION).ok_or(Error::MissingKeys)?;

        let malformed = || Error::MalformedValue {
            field: KEYS_OPTION,
            reason: "must be a comma-separated list of names".to_string(),
        };

        let selectors: Vec<String> = match keys {
            Value::String(s) => s.split(',').map(|k| k.trim().to_string()).collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(|k| k.trim().to_string()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(malformed)?,
            _ => return Err(malformed()),
        };

        Ok(selectors.into_iter().filter(|k| !k.is_empty()).collect())
    }

    /// Section configuring `selector`
    pub fn section_for(&self, selector: &str) -> Result<&SectionConfig> {
        let name = format!("{}{}", SECTION_PREFIX, selector);
        self.sections
            .get(&name)
            .ok_or(Error::SectionNotDefined(name))
    }
}

// =============================================================================
// Tests
// =============================================================================
