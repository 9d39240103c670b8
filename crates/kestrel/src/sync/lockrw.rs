//! Writer-priority read/write lock with recursive writers.
//!
//! [`Lockrw`] admits either any number of readers or one writer thread. The
//! writer may re-enter with `wrlock`, and may read under its own lock; both
//! are accounted as write recursion. A thread that already holds a read
//! share may take another one without waiting.
//!
//! # Writer priority
//!
//! Once a writer is waiting, new readers queue behind it. When the lock
//! drains, a waiting writer is woken before any waiting reader. Writes are
//! rare in the runtime and are unblocked quickly this way; readers cannot
//! starve because each writer releases back to them once no other writer is
//! queued.
//!
//! # Adaptive lock
//!
//! `arlock` is for callers that cannot tell in advance whether they need
//! exclusive access: if a writer is active it behaves as `wrlock`, otherwise
//! it grants a read share at once, ignoring queued writers.

use super::{current_thread, lock_state, violation, wait_state};
use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Condvar;
use std::thread::ThreadId;

#[derive(Debug, Default)]
struct RwState {
    /// Write depth of `owner`.
    wcount: usize,
    /// Read shares over all reader threads.
    rcount: usize,
    /// Threads blocked in `rdlock`.
    waitrd: usize,
    /// Threads blocked in `wrlock`/`arlock`.
    waitwr: usize,
    owner: Option<ThreadId>,
    /// Read shares per thread.
    readers: Vec<(ThreadId, usize)>,
}

impl RwState {
    fn is_writer(&self, me: ThreadId) -> bool {
        self.wcount > 0 && self.owner == Some(me)
    }

    fn holds_read(&self, me: ThreadId) -> bool {
        self.readers.iter().any(|(tid, _)| *tid == me)
    }

    fn add_reader(&mut self, me: ThreadId) {
        self.rcount += 1;
        match self.readers.iter_mut().find(|(tid, _)| *tid == me) {
            Some((_, shares)) => *shares += 1,
            None => self.readers.push((me, 1)),
        }
    }

    fn remove_reader(&mut self, me: ThreadId) -> bool {
        let Some(pos) = self.readers.iter().position(|(tid, _)| *tid == me) else {
            return false;
        };
        self.rcount -= 1;
        self.readers[pos].1 -= 1;
        if self.readers[pos].1 == 0 {
            self.readers.swap_remove(pos);
        }
        true
    }
}

/// Which condition variable to signal once the state lock is dropped.
enum Wake {
    None,
    Writer,
    Readers,
}

/// Read/write lock with writer priority.
///
/// # Example
///
/// ```rust
/// use kestrel::sync::Lockrw;
///
/// let lock = Lockrw::new();
/// lock.wrlock().unwrap();
/// lock.wrlock().unwrap(); // recursive write
/// lock.rdlock();          // writer may read
/// assert_eq!(lock.writer_depth(), 3);
/// for _ in 0..3 {
///     lock.unlock().unwrap();
/// }
/// assert_eq!(lock.writer_depth(), 0);
/// ```
#[derive(Default)]
pub struct Lockrw {
    state: std::sync::Mutex<RwState>,
    rcond: Condvar,
    wcond: Condvar,
}

impl Lockrw {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a read share.
    ///
    /// Granted at once if the caller is the writer or already reads;
    /// otherwise waits while a writer holds the lock or is queued.
    pub fn rdlock(&self) {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        if state.is_writer(me) {
            state.wcount += 1;
            return;
        }
        if !state.holds_read(me) {
            while state.wcount > 0 || state.waitwr > 0 {
                state.waitrd += 1;
                state = wait_state(&self.rcond, state);
                state.waitrd -= 1;
            }
        }
        state.add_reader(me);
    }

    /// Acquires the write lock.
    ///
    /// Granted at once if the caller is already the writer; otherwise waits
    /// until no reader and no other writer remains.
    ///
    /// # Errors
    ///
    /// `LockUpgrade` if the caller holds a read share.
    pub fn wrlock(&self) -> Result<()> {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        if state.is_writer(me) {
            state.wcount += 1;
            return Ok(());
        }
        if state.holds_read(me) {
            drop(state);
            return Err(violation(Error::LockUpgrade));
        }
        while state.rcount > 0 || state.wcount > 0 {
            state.waitwr += 1;
            state = wait_state(&self.wcond, state);
            state.waitwr -= 1;
        }
        state.wcount = 1;
        state.owner = Some(me);
        Ok(())
    }

    /// Adaptive acquire: `wrlock` while a writer is active, else a read share
    /// granted without waiting.
    ///
    /// # Errors
    ///
    /// `LockUpgrade` in the same case as [`Lockrw::wrlock`].
    pub fn arlock(&self) -> Result<()> {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        if state.wcount == 0 {
            state.add_reader(me);
            return Ok(());
        }
        drop(state);
        self.wrlock()
    }

    /// Releases one acquisition held by the caller.
    ///
    /// A writer's recursion is released first. When the write depth or the
    /// read count reaches zero, a waiting writer is woken, or all waiting
    /// readers if no writer waits.
    ///
    /// # Errors
    ///
    /// `NotLocked` if the lock is free, `NotOwner` if the caller holds
    /// nothing while others do.
    pub fn unlock(&self) -> Result<()> {
        let me = current_thread();
        let wake = {
            let mut state = lock_state(&self.state);
            let drained = if state.is_writer(me) {
                state.wcount -= 1;
                if state.wcount == 0 {
                    state.owner = None;
                }
                state.wcount == 0
            } else if state.remove_reader(me) {
                state.rcount == 0
            } else if state.wcount == 0 && state.rcount == 0 {
                drop(state);
                return Err(violation(Error::NotLocked { primitive: "lockrw" }));
            } else {
                drop(state);
                return Err(violation(Error::NotOwner { primitive: "lockrw" }));
            };

            if !drained {
                Wake::None
            } else if state.waitwr > 0 {
                Wake::Writer
            } else if state.waitrd > 0 {
                Wake::Readers
            } else {
                Wake::None
            }
        };

        match wake {
            Wake::Writer => self.wcond.notify_one(),
            Wake::Readers => self.rcond.notify_all(),
            Wake::None => {}
        }
        Ok(())
    }

    /// Takes a read share released when the guard drops.
    pub fn read(&self) -> LockrwGuard<'_> {
        self.rdlock();
        LockrwGuard::new(self)
    }

    /// Takes the write lock, released when the guard drops.
    ///
    /// # Errors
    ///
    /// As [`Lockrw::wrlock`].
    pub fn write(&self) -> Result<LockrwGuard<'_>> {
        self.wrlock()?;
        Ok(LockrwGuard::new(self))
    }

    /// Adaptive acquire released when the guard drops.
    ///
    /// # Errors
    ///
    /// As [`Lockrw::arlock`].
    pub fn adaptive(&self) -> Result<LockrwGuard<'_>> {
        self.arlock()?;
        Ok(LockrwGuard::new(self))
    }

    /// Number of read shares currently held.
    pub fn readers(&self) -> usize {
        lock_state(&self.state).rcount
    }

    /// Write depth of the current writer; zero when no writer.
    pub fn writer_depth(&self) -> usize {
        lock_state(&self.state).wcount
    }

    /// Number of threads waiting for the write lock.
    pub fn waiting_writers(&self) -> usize {
        lock_state(&self.state).waitwr
    }

    /// Number of threads waiting for a read share.
    pub fn waiting_readers(&self) -> usize {
        lock_state(&self.state).waitrd
    }

    /// Returns true if the calling thread holds the write lock.
    pub fn is_write_owner(&self) -> bool {
        lock_state(&self.state).is_writer(current_thread())
    }
}

impl fmt::Debug for Lockrw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("Lockrw")
            .field("wcount", &state.wcount)
            .field("rcount", &state.rcount)
            .field("waitrd", &state.waitrd)
            .field("waitwr", &state.waitwr)
            .field("owner", &state.owner)
            .finish()
    }
}

/// One acquisition of a [`Lockrw`], released on drop.
pub struct LockrwGuard<'a> {
    lock: &'a Lockrw,
    _not_send: PhantomData<*const ()>,
}

impl<'a> LockrwGuard<'a> {
    fn new(lock: &'a Lockrw) -> Self {
        LockrwGuard {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl Drop for LockrwGuard<'_> {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}
