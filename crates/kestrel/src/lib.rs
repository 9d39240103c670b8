//! `Kestrel`: object lifecycle core for a managed runtime
//!
//! `Kestrel` provides the pieces every object in a managed runtime leans on:
//!
//! - **Locking** with a plain mutex, a reentrant monitor and a
//!   writer-priority read/write lock
//! - **Sharing counts** with five explicit verbs (`iref`, `dref`, `cref`,
//!   `tref`, `uref`) and exactly-once destruction
//! - **Quarks**: interned names as dense integers with a reverse map
//! - **Confinement**: pinning collectable objects against collection
//!
//! # Architecture
//!
//! - [`sync`]: the three locking primitives
//! - [`runtime`]: objects, the symbol table, the confinement registry and the
//!   process-wide facade over the last two
//! - [`config`]: settings for the process-wide tables
//!
//! # Example
//!
//! ```rust
//! use kestrel::{Object, ObjectRef, cref, dref, iref, intern, qmap};
//!
//! struct Buffer;
//!
//! impl Object for Buffer {
//!     fn repr(&self) -> &'static str {
//!         "Buffer"
//!     }
//! }
//!
//! let buffer = ObjectRef::shared(Buffer);
//! let owner = iref(&buffer).unwrap();
//! assert!(!cref(&buffer));
//! assert!(dref(owner));
//!
//! let q = intern("crate-doc-example");
//! assert_eq!(&*qmap(q).unwrap(), "crate-doc-example");
//! ```

pub mod config;
pub mod error;
pub mod runtime;
pub mod sync;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use runtime::central::{confine, init, intern, lookup, qmap, shutdown, untangle};
pub use runtime::{
    Collectable, ConfineHandle, ConfinementRegistry, Object, ObjectId, ObjectRef, Quark, Storage,
    SymbolTable, cref, dref, iref, tref, uref,
};
pub use sync::{Lockrw, Monitor, Mutex};
