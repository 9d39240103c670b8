//! Object lifecycle: sharing counts and per-object locking.
//!
//! Every runtime object lives behind an [`ObjectRef`]. A shared object
//! carries an explicit sharing count, guarded by its own [`Monitor`], and is
//! destroyed exactly once when that count falls to zero. A scoped object has
//! no count and is destroyed when its last handle goes away.
//!
//! # Ownership verbs
//!
//! The five free functions below are the only way to change a sharing
//! count:
//!
//! | verb     | effect                                                     |
//! |----------|------------------------------------------------------------|
//! | [`iref`] | a new owner starts holding the object                      |
//! | [`dref`] | an owner lets go; destroys the object at zero              |
//! | [`cref`] | destroys the object only if nobody owns it                 |
//! | [`tref`] | an owner lets go without destroying (ownership in transit) |
//! | [`uref`] | true if at most one owner exists                           |
//!
//! All of them accept a nil object (`None`) and do nothing with it.
//!
//! A new shared object starts with a count of zero: the handle returned by
//! the constructor is not an owner. Owners are introduced with `iref`.
//!
//! # Destruction
//!
//! Destroying an object runs its [`Object::destroy`] hook; the hook never
//! runs while the object's monitor is held. The memory behind the object
//! stays valid until the last handle is dropped, so a stale handle can
//! still observe [`ObjectRef::is_destroyed`].
//!
//! # Locking
//!
//! Each object also owns a [`Lockrw`] for its field state. It is independent
//! of the monitor guarding the count, so changing the count never contends
//! with readers or writers of the object's fields.

use crate::error::Result;
use crate::sync::{Lockrw, LockrwGuard, Monitor};
use kestrel_log::{debug, error, trace};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Base capability of every runtime object.
pub trait Object: Send + Sync + 'static {
    /// Class name used in diagnostics.
    fn repr(&self) -> &'static str;

    /// Releases what the object holds. Runs exactly once per object.
    fn destroy(&self) {}
}

/// Objects that may be pinned in the confinement registry.
pub trait Collectable: Object {}

/// Construction-time choice of lifetime management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// No sharing count; destroyed when the last handle drops.
    Scoped,
    /// Carries a sharing count driven by the ownership verbs.
    Shared,
}

/// Identity of an object, stable while any handle to it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Raw address value.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

struct RefCount {
    monitor: Monitor,
    /// Only read or written while `monitor` is held.
    count: AtomicI64,
}

struct ObjectCell<T: Object + ?Sized> {
    rc: Option<RefCount>,
    lock: Lockrw,
    destroyed: AtomicBool,
    value: T,
}

impl<T: Object + ?Sized> ObjectCell<T> {
    /// Marks the cell destroyed. Only the first caller gets true.
    fn claim_destroy(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    fn run_destroy(&self) {
        trace!("destroying {} object", self.value.repr());
        self.value.destroy();
    }
}

impl<T: Object + ?Sized> Drop for ObjectCell<T> {
    fn drop(&mut self) {
        match &self.rc {
            None => {
                if self.claim_destroy() {
                    self.run_destroy();
                }
            }
            Some(rc) if !self.destroyed.load(Ordering::Acquire) => {
                debug!(
                    "{} object released with sharing count {}",
                    self.value.repr(),
                    rc.count.load(Ordering::Relaxed)
                );
            }
            Some(_) => {}
        }
    }
}

/// Handle to a runtime object.
///
/// Handles are not owners by themselves; the sharing count is changed only
/// through the ownership verbs. `iref` hands out a new handle for the new
/// owner, and `dref`/`tref` consume the handle of the owner letting go.
///
/// # Example
///
/// ```rust
/// use kestrel::{Object, ObjectRef, dref, iref, uref};
///
/// struct Point(i32, i32);
///
/// impl Object for Point {
///     fn repr(&self) -> &'static str {
///         "Point"
///     }
/// }
///
/// let point = ObjectRef::shared(Point(1, 2));
/// assert_eq!(point.refcount(), Some(0));
///
/// let owner = iref(&point).unwrap();
/// assert!(uref(&point));
/// assert_eq!(owner.0, 1);
///
/// assert!(dref(owner)); // count reached zero
/// assert!(point.is_destroyed());
/// ```
pub struct ObjectRef<T: Object + ?Sized> {
    cell: Arc<ObjectCell<T>>,
}

impl<T: Object> ObjectRef<T> {
    /// Creates an object with the given storage.
    pub fn new(value: T, storage: Storage) -> Self {
        let rc = match storage {
            Storage::Scoped => None,
            Storage::Shared => Some(RefCount {
                monitor: Monitor::new(),
                count: AtomicI64::new(0),
            }),
        };
        ObjectRef {
            cell: Arc::new(ObjectCell {
                rc,
                lock: Lockrw::new(),
                destroyed: AtomicBool::new(false),
                value,
            }),
        }
    }

    /// Creates a reference-counted object with a count of zero.
    pub fn shared(value: T) -> Self {
        Self::new(value, Storage::Shared)
    }

    /// Creates an object without a sharing count.
    pub fn scoped(value: T) -> Self {
        Self::new(value, Storage::Scoped)
    }

    /// Converts into a handle to the polymorphic base.
    #[must_use]
    pub fn upcast(self) -> ObjectRef<dyn Object> {
        ObjectRef { cell: self.cell }
    }
}

impl<T: Object + ?Sized> ObjectRef<T> {
    /// A second handle to the same object. The count is not touched.
    pub(crate) fn alias(&self) -> Self {
        ObjectRef {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Lifetime management chosen at construction.
    pub fn storage(&self) -> Storage {
        if self.cell.rc.is_some() {
            Storage::Shared
        } else {
            Storage::Scoped
        }
    }

    /// Current sharing count, or `None` for a scoped object.
    pub fn refcount(&self) -> Option<i64> {
        self.cell.rc.as_ref().map(|rc| {
            let _guard = rc.monitor.guard();
            rc.count.load(Ordering::Relaxed)
        })
    }

    /// Returns true once the destroy hook has been claimed.
    pub fn is_destroyed(&self) -> bool {
        self.cell.destroyed.load(Ordering::Acquire)
    }

    /// Class name of the object.
    pub fn repr(&self) -> &'static str {
        self.cell.value.repr()
    }

    /// Identity of the object.
    pub fn id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.cell).cast::<()>() as usize)
    }

    /// Returns true if both handles designate the same object.
    pub fn ptr_eq<U: Object + ?Sized>(this: &Self, other: &ObjectRef<U>) -> bool {
        this.id() == other.id()
    }

    /// Acquires a read share of the object's lock.
    pub fn rdlock(&self) {
        self.cell.lock.rdlock();
    }

    /// Acquires the object's write lock.
    ///
    /// # Errors
    ///
    /// `LockUpgrade` if the caller holds a read share of this object.
    pub fn wrlock(&self) -> Result<()> {
        self.cell.lock.wrlock()
    }

    /// Adaptive acquire of the object's lock; see [`Lockrw::arlock`].
    ///
    /// # Errors
    ///
    /// As [`ObjectRef::wrlock`].
    pub fn arlock(&self) -> Result<()> {
        self.cell.lock.arlock()
    }

    /// Releases one acquisition of the object's lock.
    ///
    /// # Errors
    ///
    /// `NotLocked`/`NotOwner` when the caller holds nothing.
    pub fn unlock(&self) -> Result<()> {
        self.cell.lock.unlock()
    }

    /// Scoped read share of the object's lock.
    pub fn read(&self) -> LockrwGuard<'_> {
        self.cell.lock.read()
    }

    /// Scoped write lock on the object.
    ///
    /// # Errors
    ///
    /// As [`ObjectRef::wrlock`].
    pub fn write(&self) -> Result<LockrwGuard<'_>> {
        self.cell.lock.write()
    }

    /// Scoped adaptive lock on the object.
    ///
    /// # Errors
    ///
    /// As [`ObjectRef::wrlock`].
    pub fn adaptive(&self) -> Result<LockrwGuard<'_>> {
        self.cell.lock.adaptive()
    }
}

impl<T: Object + ?Sized> Deref for ObjectRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.cell.value
    }
}

impl<T: Object + ?Sized> fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("repr", &self.repr())
            .field("storage", &self.storage())
            .field("refcount", &self.refcount())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// A borrowed object argument that may be nil.
pub trait ObjectArg<'a, T: Object + ?Sized> {
    /// The handle, or `None` for nil.
    fn as_object(self) -> Option<&'a ObjectRef<T>>;
}

impl<'a, T: Object + ?Sized> ObjectArg<'a, T> for &'a ObjectRef<T> {
    fn as_object(self) -> Option<&'a ObjectRef<T>> {
        Some(self)
    }
}

impl<'a, T: Object + ?Sized> ObjectArg<'a, T> for Option<&'a ObjectRef<T>> {
    fn as_object(self) -> Option<&'a ObjectRef<T>> {
        self
    }
}

/// An owned object argument that may be nil.
pub trait OwnedObjectArg<T: Object + ?Sized> {
    /// The handle, or `None` for nil.
    fn into_object(self) -> Option<ObjectRef<T>>;
}

impl<T: Object + ?Sized> OwnedObjectArg<T> for ObjectRef<T> {
    fn into_object(self) -> Option<ObjectRef<T>> {
        Some(self)
    }
}

impl<T: Object + ?Sized> OwnedObjectArg<T> for Option<ObjectRef<T>> {
    fn into_object(self) -> Option<ObjectRef<T>> {
        self
    }
}

/// Adds an owner and returns its handle.
///
/// Scoped objects get a handle without any count change.
pub fn iref<'a, T: Object + ?Sized>(obj: impl ObjectArg<'a, T>) -> Option<ObjectRef<T>> {
    let obj = obj.as_object()?;
    if let Some(rc) = &obj.cell.rc {
        if obj.is_destroyed() {
            error!("iref on destroyed {} object", obj.repr());
        }
        let _guard = rc.monitor.guard();
        rc.count.fetch_add(1, Ordering::Relaxed);
    }
    Some(obj.alias())
}

/// Removes an owner, destroying the object when the count falls to zero.
///
/// Returns true if this call destroyed the object.
pub fn dref<T: Object + ?Sized>(obj: impl OwnedObjectArg<T>) -> bool {
    let Some(obj) = obj.into_object() else {
        return false;
    };
    let Some(rc) = &obj.cell.rc else {
        return false;
    };
    let doomed = {
        let _guard = rc.monitor.guard();
        let count = rc.count.fetch_sub(1, Ordering::Relaxed) - 1;
        count <= 0 && obj.cell.claim_destroy()
    };
    if doomed {
        obj.cell.run_destroy();
    }
    doomed
}

/// Destroys the object if its count is already zero or below.
///
/// The check and the decision are taken under the object's monitor, so a
/// concurrent `iref` either lands first and saves the object, or comes
/// after the destruction was decided.
///
/// Returns true if this call destroyed the object.
pub fn cref<'a, T: Object + ?Sized>(obj: impl ObjectArg<'a, T>) -> bool {
    let Some(obj) = obj.as_object() else {
        return false;
    };
    let Some(rc) = &obj.cell.rc else {
        return false;
    };
    let doomed = {
        let _guard = rc.monitor.guard();
        rc.count.load(Ordering::Relaxed) <= 0 && obj.cell.claim_destroy()
    };
    if doomed {
        obj.cell.run_destroy();
    }
    doomed
}

/// Removes an owner without ever destroying the object.
///
/// The handle is returned so it can be passed on to the next owner.
pub fn tref<T: Object + ?Sized>(obj: impl OwnedObjectArg<T>) -> Option<ObjectRef<T>> {
    let obj = obj.into_object()?;
    if let Some(rc) = &obj.cell.rc {
        let _guard = rc.monitor.guard();
        rc.count.fetch_sub(1, Ordering::Relaxed);
    }
    Some(obj)
}

/// Returns true if the object has at most one owner.
///
/// Nil and scoped objects are unique by definition.
pub fn uref<'a, T: Object + ?Sized>(obj: impl ObjectArg<'a, T>) -> bool {
    match obj.as_object() {
        None => true,
        Some(obj) => obj.refcount().is_none_or(|count| count <= 1),
    }
}
