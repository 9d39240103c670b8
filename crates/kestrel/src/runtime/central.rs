//! Process-wide tables behind a static facade.
//!
//! The runtime has exactly two pieces of state shared between unrelated
//! objects: the quark table and the confinement registry. Both live in one
//! [`OnceLock`], built on first use from [`RuntimeConfig::from_env`] or
//! earlier by an explicit [`init`].
//!
//! [`shutdown`] is the defined teardown point: it releases every confined
//! object and reports final figures. Quarks stay valid afterwards, since
//! they are handed out for the life of the process.
//!
//! # Example
//!
//! ```rust
//! use kestrel::runtime::central;
//!
//! let q = central::intern("central-doc-example");
//! assert_eq!(central::intern("central-doc-example"), q);
//! assert_eq!(&*central::qmap(q).unwrap(), "central-doc-example");
//! assert!(central::qmap(kestrel::Quark::EMPTY).unwrap().is_empty());
//! ```

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::runtime::confine::{ConfineHandle, ConfinementRegistry};
use crate::runtime::object::{Collectable, Object, ObjectArg, ObjectRef};
use crate::runtime::symbol::{Quark, SymbolStats, SymbolTable};
use kestrel_log::info;
use std::sync::{Arc, OnceLock};

struct Central {
    config: RuntimeConfig,
    symbols: SymbolTable,
    confined: ConfinementRegistry,
}

impl Central {
    fn build(config: RuntimeConfig) -> Self {
        if let Some(level) = config.log_level {
            kestrel_log::set_level(level);
        }
        info!(
            "runtime tables ready (symbol capacity {}, confine verify {})",
            config.symbol_capacity, config.confine_verify
        );
        Central {
            symbols: SymbolTable::with_capacity(config.symbol_capacity),
            confined: ConfinementRegistry::new(config.confine_verify),
            config,
        }
    }
}

static CENTRAL: OnceLock<Central> = OnceLock::new();

fn central() -> &'static Central {
    CENTRAL.get_or_init(|| Central::build(RuntimeConfig::from_env()))
}

/// Builds the global tables from `config`.
///
/// # Errors
///
/// `InvalidConfig` if the configuration does not validate,
/// `AlreadyInitialized` if the tables exist already (explicitly or through
/// an earlier call to any function of this module).
pub fn init(config: RuntimeConfig) -> Result<()> {
    config.validate()?;
    let mut built = false;
    CENTRAL.get_or_init(|| {
        built = true;
        Central::build(config)
    });
    if built {
        Ok(())
    } else {
        Err(Error::AlreadyInitialized)
    }
}

/// Returns true once the global tables exist.
pub fn is_initialized() -> bool {
    CENTRAL.get().is_some()
}

/// Configuration the global tables were built with.
pub fn config() -> &'static RuntimeConfig {
    &central().config
}

/// Interns `name` in the global quark table.
pub fn intern(name: &str) -> Quark {
    central().symbols.intern(name)
}

/// Resolves a quark issued by [`intern`].
///
/// # Errors
///
/// `InvalidQuark` if the quark was never issued.
pub fn qmap(quark: Quark) -> Result<Arc<str>> {
    central().symbols.qmap(quark)
}

/// Quark of `name` if it was interned.
pub fn lookup(name: &str) -> Option<Quark> {
    central().symbols.lookup(name)
}

/// Usage figures of the global quark table.
pub fn symbol_stats() -> SymbolStats {
    central().symbols.stats()
}

/// Pins `obj` in the global confinement registry.
pub fn confine<T: Collectable>(obj: &ObjectRef<T>) -> ConfineHandle {
    central().confined.confine(obj)
}

/// Releases a pin taken with [`confine`].
///
/// Returns false for a nil or stale handle, or an object that does not
/// match the handle.
pub fn untangle<'a, T: Object + ?Sized>(
    obj: impl ObjectArg<'a, T>,
    handle: impl Into<Option<ConfineHandle>>,
) -> bool {
    central().confined.untangle(obj, handle)
}

/// Returns true if `obj` is pinned in the global registry.
pub fn is_confined<T: Object + ?Sized>(obj: &ObjectRef<T>) -> bool {
    central().confined.is_confined(obj)
}

/// Number of objects pinned in the global registry.
pub fn confined_count() -> usize {
    central().confined.len()
}

/// Tears down the confinement registry and reports final figures.
///
/// Returns the number of pins released. Does nothing if the tables were
/// never built.
pub fn shutdown() -> usize {
    let Some(central) = CENTRAL.get() else {
        return 0;
    };
    let released = central.confined.clear();
    let stats = central.symbols.stats();
    info!(
        "runtime shutdown: released {} confined objects, {} quarks in {} buckets",
        released, stats.names, stats.capacity
    );
    released
}
