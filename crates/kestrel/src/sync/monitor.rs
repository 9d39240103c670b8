//! Reentrant mutual exclusion keyed by thread identity.
//!
//! A [`Monitor`] is claimed by one thread at a time. The owner may enter
//! again without blocking; each `enter` raises the depth and each `leave`
//! lowers it. The monitor is free again when the depth returns to zero, at
//! which point one blocked thread is woken.
//!
//! Every shared object's reference count is guarded by its own monitor.

use super::{current_thread, lock_state, violation, wait_state};
use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Condvar;
use std::thread::ThreadId;

#[derive(Debug, Default)]
struct MonitorState {
    depth: usize,
    owner: Option<ThreadId>,
}

/// Reentrant lock.
///
/// # Example
///
/// ```rust
/// use kestrel::sync::Monitor;
///
/// let monitor = Monitor::new();
/// monitor.enter();
/// monitor.enter(); // same thread: does not block
/// assert_eq!(monitor.depth(), 2);
/// monitor.leave().unwrap();
/// monitor.leave().unwrap();
/// assert_eq!(monitor.depth(), 0);
/// ```
#[derive(Default)]
pub struct Monitor {
    state: std::sync::Mutex<MonitorState>,
    cvar: Condvar,
}

impl Monitor {
    /// Creates an unclaimed monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the monitor, blocking while another thread owns it.
    pub fn enter(&self) {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        if state.owner == Some(me) {
            state.depth += 1;
            return;
        }
        while state.depth > 0 {
            state = wait_state(&self.cvar, state);
        }
        state.owner = Some(me);
        state.depth = 1;
    }

    /// Claims the monitor if it is free or already owned by the caller.
    pub fn try_enter(&self) -> bool {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        if state.owner == Some(me) {
            state.depth += 1;
            true
        } else if state.depth == 0 {
            state.owner = Some(me);
            state.depth = 1;
            true
        } else {
            false
        }
    }

    /// Releases one level of ownership.
    ///
    /// # Errors
    ///
    /// `NotLocked` if the monitor is free, `NotOwner` if another thread owns
    /// it. Both leave the monitor untouched.
    pub fn leave(&self) -> Result<()> {
        let me = current_thread();
        let released = {
            let mut state = lock_state(&self.state);
            if state.depth == 0 {
                drop(state);
                return Err(violation(Error::NotLocked {
                    primitive: "monitor",
                }));
            }
            if state.owner != Some(me) {
                drop(state);
                return Err(violation(Error::NotOwner {
                    primitive: "monitor",
                }));
            }
            state.depth -= 1;
            if state.depth == 0 {
                state.owner = None;
                true
            } else {
                false
            }
        };
        if released {
            self.cvar.notify_one();
        }
        Ok(())
    }

    /// Enters the monitor and returns a guard that leaves on drop.
    pub fn guard(&self) -> MonitorGuard<'_> {
        self.enter();
        MonitorGuard {
            monitor: self,
            _not_send: PhantomData,
        }
    }

    /// Current nesting depth; zero when unclaimed.
    pub fn depth(&self) -> usize {
        lock_state(&self.state).depth
    }

    /// Returns true if the calling thread owns the monitor.
    pub fn is_owned_by_current(&self) -> bool {
        lock_state(&self.state).owner == Some(current_thread())
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("Monitor")
            .field("depth", &state.depth)
            .field("owner", &state.owner)
            .finish()
    }
}

/// One level of monitor ownership, released on drop.
pub struct MonitorGuard<'a> {
    monitor: &'a Monitor,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        let _ = self.monitor.leave();
    }
}
