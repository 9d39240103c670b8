//! Kestrel runtime module.
//!
//! The object lifecycle core, layered on [`crate::sync`]:
//!
//! - [`object`]: reference-counted objects and the five counting verbs
//! - [`symbol`]: quark interning with a reverse map
//! - [`confine`]: registry pinning collectable objects against collection
//! - [`central`]: process-wide instances of the two tables
//!
//! # Example
//!
//! ```rust
//! use kestrel::runtime::{Object, ObjectRef, dref, iref};
//!
//! struct Point;
//!
//! impl Object for Point {
//!     fn repr(&self) -> &'static str {
//!         "Point"
//!     }
//! }
//!
//! let p = ObjectRef::shared(Point);
//! let alias = iref(&p).unwrap();
//! assert_eq!(p.refcount(), Some(1));
//! assert!(dref(alias));
//! assert!(p.is_destroyed());
//! ```

pub mod central;
pub mod confine;
pub mod object;
pub mod symbol;

pub use confine::{ConfineHandle, ConfinementRegistry};
pub use object::{
    Collectable, Object, ObjectArg, ObjectId, ObjectRef, OwnedObjectArg, Storage, cref, dref,
    iref, tref, uref,
};
pub use symbol::{Quark, SymbolStats, SymbolTable};
