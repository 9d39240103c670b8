//! Error types for the `Kestrel` runtime core.
//!
//! Three kinds of failure surface here: lock contract violations (a thread
//! releasing something it does not hold), not-found conditions such as an
//! unknown quark, and configuration errors detected before the global tables
//! are built.

use std::fmt;

/// Errors that can occur in the `Kestrel` runtime core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A lock was released by a thread that does not own it.
    NotOwner {
        /// The primitive kind ("monitor", "lockrw", ...).
        primitive: &'static str,
    },

    /// A lock was released while nobody held it.
    NotLocked {
        /// The primitive kind ("mutex", "monitor", "lockrw").
        primitive: &'static str,
    },

    /// A thread holding a read share asked for the write lock.
    ///
    /// Granting it would wait on the caller's own read share forever.
    LockUpgrade,

    /// A quark outside the range issued by the symbol table.
    InvalidQuark {
        /// The requested quark.
        quark: u32,
        /// Number of quarks issued so far, including the empty name.
        issued: usize,
    },

    /// The global tables were already built when `init` was called.
    AlreadyInitialized,

    /// A configuration value was rejected.
    InvalidConfig {
        /// The configuration key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl Error {
    /// Returns true for errors that mean the caller broke a lock contract.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::NotOwner { .. } | Error::NotLocked { .. } | Error::LockUpgrade
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotOwner { primitive } => {
                write!(f, "{primitive} released by a thread that does not own it")
            }
            Error::NotLocked { primitive } => {
                write!(f, "{primitive} released while not locked")
            }
            Error::LockUpgrade => {
                write!(f, "write lock requested while holding a read lock")
            }
            Error::InvalidQuark { quark, issued } => {
                write!(f, "Invalid quark {quark}: only {issued} quarks issued")
            }
            Error::AlreadyInitialized => {
                write!(f, "Runtime tables already initialized")
            }
            Error::InvalidConfig { key, reason } => {
                write!(f, "Invalid configuration for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `Kestrel` runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
