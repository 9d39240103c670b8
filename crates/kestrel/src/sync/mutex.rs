//! Non-reentrant mutual exclusion.
//!
//! [`Mutex`] is the thin lock the global tables are built on. It can carry
//! the data it protects, reachable only through a [`MutexGuard`]. The unit
//! form `Mutex<()>` additionally exposes the raw `lock`/`unlock`/`try_lock`
//! verbs for callers that pair acquire and release by hand.
//!
//! Unlike `std::sync::Mutex`, the lock records its owning thread so that an
//! `unlock` from the wrong thread is reported instead of corrupting the lock.

use super::{current_thread, lock_state, violation, wait_state};
use crate::error::{Error, Result};
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Condvar;
use std::thread::ThreadId;

#[derive(Debug, Default)]
struct MutexState {
    locked: bool,
    owner: Option<ThreadId>,
}

/// A non-reentrant lock, optionally carrying protected data.
///
/// # Example
///
/// ```rust
/// use kestrel::sync::Mutex;
///
/// let counter = Mutex::new(0u32);
/// *counter.guard() += 1;
/// assert_eq!(*counter.guard(), 1);
///
/// let bare = Mutex::default();
/// bare.lock();
/// assert!(!bare.try_lock());
/// bare.unlock().unwrap();
/// ```
pub struct Mutex<T: ?Sized = ()> {
    state: std::sync::Mutex<MutexState>,
    cvar: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: the data is only reachable through a MutexGuard, and at most one
// guard exists at a time because `acquire` blocks while `locked` is set.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates an unlocked mutex protecting `value`.
    pub fn new(value: T) -> Self {
        Mutex {
            state: std::sync::Mutex::new(MutexState::default()),
            cvar: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    fn acquire(&self) {
        let me = current_thread();
        let mut state = lock_state(&self.state);
        while state.locked {
            state = wait_state(&self.cvar, state);
        }
        state.locked = true;
        state.owner = Some(me);
    }

    fn try_acquire(&self) -> bool {
        let mut state = lock_state(&self.state);
        if state.locked {
            return false;
        }
        state.locked = true;
        state.owner = Some(current_thread());
        true
    }

    fn release(&self) -> Result<()> {
        let me = current_thread();
        {
            let mut state = lock_state(&self.state);
            if !state.locked {
                drop(state);
                return Err(violation(Error::NotLocked { primitive: "mutex" }));
            }
            if state.owner != Some(me) {
                drop(state);
                return Err(violation(Error::NotOwner { primitive: "mutex" }));
            }
            state.locked = false;
            state.owner = None;
        }
        self.cvar.notify_one();
        Ok(())
    }

    /// Blocks until the lock is free and returns a guard over the data.
    pub fn guard(&self) -> MutexGuard<'_, T> {
        self.acquire();
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Returns a guard if the lock is free, without blocking.
    pub fn try_guard(&self) -> Option<MutexGuard<'_, T>> {
        self.try_acquire().then(|| MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Returns true if some thread holds the lock.
    pub fn is_locked(&self) -> bool {
        lock_state(&self.state).locked
    }
}

impl Mutex<()> {
    /// Blocks until the lock is acquired by the calling thread.
    pub fn lock(&self) {
        self.acquire();
    }

    /// Acquires the lock if it is free. Returns false if it is held.
    pub fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    /// Releases the lock.
    ///
    /// # Errors
    ///
    /// `NotLocked` if the mutex is not held, `NotOwner` if another thread
    /// holds it.
    pub fn unlock(&self) -> Result<()> {
        self.release()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("Mutex")
            .field("locked", &state.locked)
            .field("owner", &state.owner)
            .finish_non_exhaustive()
    }
}

/// Scoped access to the data of a [`Mutex`]; unlocks on drop.
///
/// Guards stay on the thread that created them.
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard is the only one alive while the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`, plus `&mut self` rules out a second borrow
        // through this guard.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // The guard was created on this thread, so release cannot fail
        // unless someone unlocked the mutex behind the guard's back.
        let _ = self.mutex.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_lock_unlock() {
        let mutex = Mutex::default();
        mutex.lock();
        assert!(mutex.is_locked());
        mutex.unlock().unwrap();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_try_lock_when_held() {
        let mutex = Mutex::default();
        assert!(mutex.try_lock());
        assert!(!mutex.try_lock());
        mutex.unlock().unwrap();
        assert!(mutex.try_lock());
        mutex.unlock().unwrap();
    }

    #[test]
    fn test_unlock_unlocked_is_error() {
        let mutex = Mutex::default();
        assert_eq!(
            mutex.unlock(),
            Err(Error::NotLocked { primitive: "mutex" })
        );
    }

    #[test]
    fn test_unlock_from_other_thread_is_error() {
        let mutex = Arc::new(Mutex::default());
        mutex.lock();

        let other = Arc::clone(&mutex);
        let result = thread::spawn(move || other.unlock()).join().unwrap();
        assert_eq!(result, Err(Error::NotOwner { primitive: "mutex" }));

        // Still held by this thread
        assert!(mutex.is_locked());
        mutex.unlock().unwrap();
    }

    #[test]
    fn test_guard_protects_data() {
        let counter = Arc::new(Mutex::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *counter.guard() += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*counter.guard(), 8000);
        assert!(!counter.is_locked());
    }

    #[test]
    fn test_lock_blocks_second_thread() {
        let mutex = Arc::new(Mutex::default());
        let acquired = Arc::new(AtomicBool::new(false));
        mutex.lock();

        let handle = {
            let mutex = Arc::clone(&mutex);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                mutex.lock();
                acquired.store(true, Ordering::SeqCst);
                mutex.unlock().unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        mutex.unlock().unwrap();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_guard() {
        let mutex = Mutex::new(vec![1, 2, 3]);
        let guard = mutex.try_guard().unwrap();
        assert!(mutex.try_guard().is_none());
        assert_eq!(guard.len(), 3);
        drop(guard);
        assert!(mutex.try_guard().is_some());
    }
}
