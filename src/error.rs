//! Error types for modcache

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or using a cache backend
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Section Validation Errors
    // =========================================================================
    /// The `module` field is absent or names another backend
    #[error("not module {expected}")]
    IncoherentSection { expected: &'static str },

    /// A backend-specific required field is absent
    #[error("no {field} in config for {module}")]
    MissingField {
        module: &'static str,
        field: &'static str,
    },

    /// A field is present but does not parse as its required type
    #[error("{field} {reason}")]
    MalformedValue { field: &'static str, reason: String },

    /// The filesystem backend's directory does not exist as a directory
    #[error("{} isn't a cache directory", .0.display())]
    InvalidCacheDir(PathBuf),

    // =========================================================================
    // Configuration File Errors
    // =========================================================================
    /// The main `ModularCache` section is missing
    #[error("no ModularCache section in configuration")]
    MissingMainSection,

    /// The main section has no `keys` option
    #[error("no keys option in ModularCache section")]
    MissingKeys,

    /// A selector listed in `keys` has no matching section
    #[error("no {0} section")]
    SectionNotDefined(String),

    /// The `module` field names no known backend
    #[error("unknown cache module: {0}")]
    UnknownModule(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// `cached` was called for a key with no valid entry
    #[error("no cached entry for {0}")]
    NotCached(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Result (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for the errors `check_conf` raises
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::IncoherentSection { .. }
                | Error::MissingField { .. }
                | Error::MalformedValue { .. }
                | Error::InvalidCacheDir(_)
                | Error::MissingMainSection
                | Error::MissingKeys
                | Error::SectionNotDefined(_)
                | Error::UnknownModule(_)
                | Error::ConfigParse(_)
        )
    }
}
