//! Runtime configuration.
//!
//! The global tables are built from a [`RuntimeConfig`], either passed to
//! [`crate::runtime::central::init`] or read from the environment on first
//! use.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KESTREL_SYMBOL_CAPACITY` | Initial bucket count of the quark table | 17 |
//! | `KESTREL_CONFINE_VERIFY` | Refuse duplicate confinement ("true"/"false") | false |
//! | `KESTREL_LOG` | Log level (off/error/warn/info/debug/trace) | unchanged |
//!
//! # Example
//!
//! ```rust
//! use kestrel::config::RuntimeConfig;
//! use kestrel_log::Level;
//!
//! let config = RuntimeConfig::default()
//!     .with_symbol_capacity(1024)
//!     .with_confine_verify(true)
//!     .with_log_level(Level::Info);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::runtime::symbol::DEFAULT_CAPACITY;
use kestrel_log::{Level, warn};
use std::env;

/// Variable holding the initial symbol table capacity.
pub const SYMBOL_CAPACITY_ENV: &str = "KESTREL_SYMBOL_CAPACITY";

/// Variable enabling duplicate checks in the confinement registry.
pub const CONFINE_VERIFY_ENV: &str = "KESTREL_CONFINE_VERIFY";

/// Settings for the process-wide tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Initial bucket count of the symbol table, rounded up to a prime.
    pub symbol_capacity: usize,

    /// Return the existing handle when an object is confined twice.
    pub confine_verify: bool,

    /// Level applied to the global logger, if any.
    pub log_level: Option<Level>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            symbol_capacity: DEFAULT_CAPACITY,
            confine_verify: false,
            log_level: None,
        }
    }
}

impl RuntimeConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Malformed values are reported and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = RuntimeConfig::default();

        if let Some(raw) = lookup(SYMBOL_CAPACITY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => config.symbol_capacity = capacity,
                _ => warn!("ignoring {}={:?}: expected a positive integer", SYMBOL_CAPACITY_ENV, raw),
            }
        }

        if let Some(raw) = lookup(CONFINE_VERIFY_ENV) {
            match parse_bool(&raw) {
                Some(verify) => config.confine_verify = verify,
                None => warn!("ignoring {}={:?}: expected true or false", CONFINE_VERIFY_ENV, raw),
            }
        }

        if let Some(raw) = lookup(kestrel_log::LOG_ENV) {
            match raw.parse::<Level>() {
                Ok(level) => config.log_level = Some(level),
                Err(err) => warn!("ignoring {}: {}", kestrel_log::LOG_ENV, err),
            }
        }

        config
    }

    /// Sets the initial symbol table capacity.
    #[must_use]
    pub fn with_symbol_capacity(mut self, capacity: usize) -> Self {
        self.symbol_capacity = capacity;
        self
    }

    /// Enables or disables duplicate checks on confinement.
    #[must_use]
    pub fn with_confine_verify(mut self, verify: bool) -> Self {
        self.confine_verify = verify;
        self
    }

    /// Sets the level applied to the global logger.
    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Checks the values before the tables are built.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero symbol capacity.
    pub fn validate(&self) -> Result<()> {
        if self.symbol_capacity == 0 {
            return Err(Error::InvalidConfig {
                key: "symbol_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
