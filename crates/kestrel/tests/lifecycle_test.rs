//! End-to-end lifecycle tests.
//!
//! These tests drive the public API the way a runtime would:
//! - sharing counts across owners and threads
//! - interning names alongside object lifetimes
//! - confinement keeping an object alive past its last owner

mod common;

use common::{create_probe, create_shared_probe, destroy_count};
use kestrel::runtime::central;
use kestrel::{
    ConfineHandle, ConfinementRegistry, Error, ObjectRef, Quark, Storage, SymbolTable, cref, dref,
    iref, tref, uref,
};

// ============================================================================
// Sharing Counts
// ============================================================================

#[test]
fn test_two_owners_release_in_turn() {
    let (a, destroyed) = create_shared_probe("A");

    let first = iref(&a).unwrap();
    let second = iref(&a).unwrap();
    assert_eq!(a.refcount(), Some(2));
    assert!(!uref(&a));

    assert!(!dref(first));
    assert_eq!(a.refcount(), Some(1));
    assert!(uref(&a));
    assert_eq!(destroy_count(&destroyed), 0);

    assert!(dref(second));
    assert!(a.is_destroyed());
    assert_eq!(destroy_count(&destroyed), 1);
}

#[test]
fn test_transfer_then_collect() {
    let (a, destroyed) = create_shared_probe("A");
    let owner = iref(&a).unwrap();

    // Owner hands the object off without destroying it
    let in_transit = tref(owner).unwrap();
    assert_eq!(a.refcount(), Some(0));
    assert!(!a.is_destroyed());

    // Nobody picked it up, so a collection pass reclaims it
    assert!(cref(&in_transit));
    assert_eq!(destroy_count(&destroyed), 1);
    assert!(!cref(&in_transit));
}

#[test]
fn test_transfer_to_new_owner() {
    let (a, destroyed) = create_shared_probe("A");
    let owner = iref(&a).unwrap();

    let in_transit = tref(owner).unwrap();
    let receiver = iref(&in_transit).unwrap();
    assert_eq!(a.refcount(), Some(1));
    assert!(!cref(&a));

    assert!(dref(receiver));
    assert_eq!(destroy_count(&destroyed), 1);
}

#[test]
fn test_nil_everywhere() {
    let none: Option<&ObjectRef<common::Probe>> = None;
    assert!(iref(none).is_none());
    assert!(!cref(none));
    assert!(uref(none));
    assert!(!dref(None::<ObjectRef<common::Probe>>));
    assert!(tref(None::<ObjectRef<common::Probe>>).is_none());
}

#[test]
fn test_scoped_object_destroyed_on_last_drop() {
    let (scoped, destroyed) = create_probe("S", Storage::Scoped);
    let alias = iref(&scoped).unwrap();

    assert_eq!(scoped.refcount(), None);
    assert!(uref(&scoped));
    assert!(!cref(&scoped));
    assert!(!dref(alias));

    assert_eq!(destroy_count(&destroyed), 0);
    drop(scoped);
    assert_eq!(destroy_count(&destroyed), 1);
}

#[test]
fn test_upcast_objects_share_count() {
    let (a, destroyed) = create_shared_probe("A");
    let owner = iref(&a).unwrap().upcast();
    assert_eq!(a.refcount(), Some(1));
    assert_eq!(owner.repr(), "A");
    assert!(ObjectRef::ptr_eq(&owner, &a));

    assert!(dref(owner));
    assert_eq!(destroy_count(&destroyed), 1);
}

// ============================================================================
// Symbols
// ============================================================================

#[test]
fn test_fresh_table_issues_dense_quarks() {
    let table = SymbolTable::new();

    let alpha = table.intern("alpha");
    let beta = table.intern("beta");
    assert_eq!(alpha, Quark::new(1));
    assert_eq!(beta, Quark::new(2));
    assert_eq!(table.intern("alpha"), alpha);

    assert_eq!(&*table.qmap(alpha).unwrap(), "alpha");
    assert_eq!(&*table.qmap(Quark::EMPTY).unwrap(), "");
    assert_eq!(
        table.qmap(Quark::new(3)),
        Err(Error::InvalidQuark { quark: 3, issued: 3 })
    );
}

#[test]
fn test_global_quarks_round_trip() {
    let q = central::intern("lifecycle-global-name");
    assert!(!q.is_empty());
    assert_eq!(central::lookup("lifecycle-global-name"), Some(q));
    assert_eq!(&*central::qmap(q).unwrap(), "lifecycle-global-name");
    assert_eq!(central::lookup("lifecycle-never-interned"), None);
    assert_eq!(central::intern(""), Quark::EMPTY);
}

#[test]
fn test_init_after_first_use_is_rejected() {
    let _ = central::intern("lifecycle-force-init");
    assert_eq!(
        central::init(kestrel::RuntimeConfig::default()),
        Err(Error::AlreadyInitialized)
    );
}

// ============================================================================
// Confinement
// ============================================================================

#[test]
fn test_confined_object_survives_until_untangled() {
    let registry = ConfinementRegistry::new(false);
    let (a, destroyed) = create_shared_probe("A");
    let owner = iref(&a).unwrap();

    let handle = registry.confine(&a);
    assert!(dref(owner));
    assert_eq!(destroy_count(&destroyed), 1);

    // The pin keeps the memory reachable, not the count
    assert!(registry.is_confined(&a));
    assert!(registry.untangle(&a, handle));
    assert!(registry.is_empty());
}

#[test]
fn test_untangle_rejects_foreign_object() {
    let registry = ConfinementRegistry::new(false);
    let (a, _) = create_shared_probe("A");
    let (b, _) = create_shared_probe("B");

    let handle = registry.confine(&a);
    assert!(!registry.untangle(&b, handle));
    assert!(registry.is_confined(&a));
    assert!(registry.untangle(None::<&ObjectRef<common::Probe>>, handle));
    assert!(!registry.untangle(&a, None::<ConfineHandle>));
}

#[test]
fn test_verify_mode_returns_existing_handle() {
    let registry = ConfinementRegistry::new(true);
    let (a, _) = create_shared_probe("A");

    let first = registry.confine(&a);
    let second = registry.confine(&a);
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_global_confinement() {
    let (a, _) = create_shared_probe("G");
    let handle = central::confine(&a);
    assert!(central::is_confined(&a));
    assert!(central::untangle(&a, handle));
    assert!(!central::is_confined(&a));
}
