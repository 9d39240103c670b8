//! Locking primitives used throughout the runtime.
//!
//! All three primitives are built on `std::sync::Mutex` and
//! `std::sync::Condvar` and keep their own small state machine:
//!
//! - [`Mutex`]: plain non-reentrant lock with explicit `lock`/`unlock`.
//! - [`Monitor`]: reentrant lock keyed by the owning thread.
//! - [`Lockrw`]: writer-priority read/write lock with recursive writers.
//!
//! None of them supports timeouts or cancellation. Every acquire must be
//! paired with a release; the scoped guards do this on drop.
//!
//! # Poisoning
//!
//! The internal state mutex guards only counters and an owner id, which are
//! updated without any call that can panic. A poisoned state mutex therefore
//! still holds consistent state and is recovered rather than reported.

pub mod lockrw;
pub mod monitor;
pub mod mutex;

pub use lockrw::{Lockrw, LockrwGuard};
pub use monitor::{Monitor, MonitorGuard};
pub use mutex::{Mutex, MutexGuard};

use crate::error::Error;
use kestrel_log::error;
use std::sync::{Condvar, MutexGuard as StateGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Locks a primitive's internal state.
pub(crate) fn lock_state<S>(state: &std::sync::Mutex<S>) -> StateGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Blocks on `cvar`, reacquiring the state lock on wakeup.
pub(crate) fn wait_state<'a, S>(
    cvar: &Condvar,
    guard: StateGuard<'a, S>,
) -> StateGuard<'a, S> {
    cvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Identity of the calling thread.
#[inline]
pub(crate) fn current_thread() -> ThreadId {
    thread::current().id()
}

/// Logs a contract violation and hands the error back for propagation.
pub(crate) fn violation(err: Error) -> Error {
    error!("lock contract violation: {}", err);

    #[cfg(feature = "lock_backtrace")]
    {
        let trace = backtrace::Backtrace::new();
        error!("violation backtrace:\n{:?}", trace);
    }

    err
}
