//! Confinement: pinning collectable objects behind opaque handles.
//!
//! Some holders of an object do not take part in the `iref`/`dref`
//! protocol (a foreign callback table, a pending event). Confining the
//! object records it in a process-wide registry so that it stays reachable
//! until the holder untangles it. The registry keeps the object's memory
//! alive but never touches its sharing count.
//!
//! Nodes form a doubly-linked list threaded through a slot vector, newest
//! first. A [`ConfineHandle`] names a slot plus the slot's generation, so a
//! handle that was already untangled is recognised as stale and refused
//! instead of unlinking whatever reused the slot.

use crate::runtime::object::{Collectable, Object, ObjectArg, ObjectRef};
use crate::sync::Mutex;
use kestrel_log::{debug, warn};
use std::fmt;

/// Opaque token returned by [`ConfinementRegistry::confine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfineHandle {
    slot: usize,
    generation: u64,
}

struct ConfineNode {
    object: ObjectRef<dyn Object>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    node: Option<ConfineNode>,
}

#[derive(Default)]
struct RegistryState {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    len: usize,
}

impl RegistryState {
    fn node(&self, slot: usize) -> Option<&ConfineNode> {
        self.slots.get(slot).and_then(|s| s.node.as_ref())
    }

    fn find<T: Object + ?Sized>(&self, obj: &ObjectRef<T>) -> Option<ConfineHandle> {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let node = self.node(slot)?;
            if ObjectRef::ptr_eq(&node.object, obj) {
                return Some(ConfineHandle {
                    slot,
                    generation: self.slots[slot].generation,
                });
            }
            cursor = node.next;
        }
        None
    }

    fn link_front(&mut self, object: ObjectRef<dyn Object>) -> ConfineHandle {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let next = self.head;
        if let Some(node) = next.and_then(|head| self.slots[head].node.as_mut()) {
            node.prev = Some(slot);
        }
        self.slots[slot].node = Some(ConfineNode {
            object,
            prev: None,
            next,
        });
        self.head = Some(slot);
        self.len += 1;
        ConfineHandle {
            slot,
            generation: self.slots[slot].generation,
        }
    }

    fn unlink(&mut self, slot: usize) -> Option<ConfineNode> {
        let node = self.slots[slot].node.take()?;
        match node.prev {
            Some(prev) => {
                if let Some(p) = self.slots[prev].node.as_mut() {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        if let Some(n) = node.next.and_then(|next| self.slots[next].node.as_mut()) {
            n.prev = node.prev;
        }
        self.slots[slot].generation = self.slots[slot].generation.wrapping_add(1);
        self.free.push(slot);
        self.len -= 1;
        Some(node)
    }
}

/// Registry of confined objects.
///
/// # Example
///
/// ```rust
/// use kestrel::runtime::confine::ConfinementRegistry;
/// use kestrel::{Collectable, Object, ObjectRef};
///
/// struct Callback;
///
/// impl Object for Callback {
///     fn repr(&self) -> &'static str {
///         "Callback"
///     }
/// }
/// impl Collectable for Callback {}
///
/// let registry = ConfinementRegistry::new(false);
/// let cb = ObjectRef::shared(Callback);
///
/// let handle = registry.confine(&cb);
/// assert!(registry.is_confined(&cb));
/// assert!(registry.untangle(&cb, handle));
/// assert!(!registry.untangle(&cb, handle)); // already gone
/// ```
pub struct ConfinementRegistry {
    verify: bool,
    state: Mutex<RegistryState>,
}

impl ConfinementRegistry {
    /// Creates an empty registry.
    ///
    /// With `verify` set, confining an object that is already confined
    /// returns the existing handle instead of adding a second node.
    #[must_use]
    pub fn new(verify: bool) -> Self {
        ConfinementRegistry {
            verify,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Returns true if duplicate confinement is checked.
    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Pins `obj` and returns the handle that releases it.
    pub fn confine<T: Collectable>(&self, obj: &ObjectRef<T>) -> ConfineHandle {
        let mut state = self.state.guard();
        if self.verify {
            if let Some(handle) = state.find(obj) {
                debug!("{} object already confined", obj.repr());
                return handle;
            }
        }
        state.link_front(obj.alias().upcast())
    }

    /// Releases the node named by `handle`.
    ///
    /// When `obj` is given, the node must hold that very object. Returns
    /// false, leaving the registry unchanged, for a nil or stale handle or a
    /// mismatched object.
    pub fn untangle<'a, T: Object + ?Sized>(
        &self,
        obj: impl ObjectArg<'a, T>,
        handle: impl Into<Option<ConfineHandle>>,
    ) -> bool {
        let Some(handle) = handle.into() else {
            debug!("untangle with nil handle");
            return false;
        };
        let obj = obj.as_object();

        let released = {
            let mut state = self.state.guard();
            let live = state.slots.get(handle.slot).is_some_and(|slot| {
                slot.generation == handle.generation && slot.node.is_some()
            });
            if !live {
                drop(state);
                debug!("untangle with stale handle {:?}", handle);
                return false;
            }
            if let Some(obj) = obj {
                let held = state
                    .node(handle.slot)
                    .filter(|node| !ObjectRef::ptr_eq(&node.object, obj))
                    .map(|node| node.object.repr());
                if let Some(held) = held {
                    drop(state);
                    warn!(
                        "untangle mismatch: handle holds a {} object, caller passed a {} object",
                        held,
                        obj.repr()
                    );
                    return false;
                }
            }
            state.unlink(handle.slot)
        };
        // The pin is dropped outside the registry lock.
        released.is_some()
    }

    /// Returns true if some node holds `obj`.
    pub fn is_confined<T: Object + ?Sized>(&self, obj: &ObjectRef<T>) -> bool {
        self.state.guard().find(obj).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.state.guard().len
    }

    /// Returns true if no object is confined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every node; outstanding handles become stale.
    ///
    /// Returns the number of nodes released.
    pub fn clear(&self) -> usize {
        let released: Vec<ConfineNode> = {
            let mut state = self.state.guard();
            let mut nodes = Vec::with_capacity(state.len);
            while let Some(head) = state.head {
                match state.unlink(head) {
                    Some(node) => nodes.push(node),
                    None => break,
                }
            }
            nodes
        };
        released.len()
    }
}

impl Default for ConfinementRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for ConfinementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfinementRegistry")
            .field("verify", &self.verify)
            .field("len", &self.len())
            .finish()
    }
}
