#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod support;

use smartref::{Shared, Weak};
use support::{Tally, Token, Tracking};

#[test]
fn copy_assign_releases_previous_block() {
    support::init_logging();

    let first_alloc = Tracking::new();
    let second_alloc = Tracking::new();
    let tally = Tally::new();

    let first = Shared::new_in(tally.token(), first_alloc.clone());
    let second = Shared::new_in(tally.token(), second_alloc.clone());
    let mut w1 = Shared::downgrade(&first);
    let w2 = Shared::downgrade(&second);
    drop(first);
    assert_eq!(tally.count(), 1);
    // `w1` is the last reference to the first block.
    assert_eq!(first_alloc.live(), 1);
    assert!(w1.expired());

    w1 = w2.clone();
    assert_eq!(first_alloc.live(), 0);
    assert_eq!(first_alloc.deallocations(), 1);
    assert_eq!(Shared::weak_count(&second), 2);
    assert!(w1.ptr_eq(&w2));
    assert_eq!(w1.use_count(), 1);

    drop(second);
    drop(w1);
    assert_eq!(second_alloc.live(), 1);
    drop(w2);
    assert_eq!(second_alloc.live(), 0);
    assert_eq!(tally.count(), 2);
}

#[test]
fn move_assign_releases_previous_block() {
    support::init_logging();

    let first_alloc = Tracking::new();
    let second_alloc = Tracking::new();
    let tally = Tally::new();

    let first = Shared::new_in(tally.token(), first_alloc.clone());
    let second = Shared::new_in(tally.token(), second_alloc.clone());
    let mut w1 = Shared::downgrade(&first);
    let w2 = Shared::downgrade(&second);
    drop(first);
    assert!(w1.expired());

    w1 = w2;
    assert_eq!(first_alloc.live(), 0);
    // A move transfers the observer without touching the count.
    assert_eq!(Shared::weak_count(&second), 1);
    assert!(!w1.expired());

    drop(second);
    assert_eq!(second_alloc.live(), 1);
    drop(w1);
    assert_eq!(second_alloc.live(), 0);
}

#[test]
fn assign_over_live_observer_keeps_object_alive() {
    support::init_logging();

    let alloc = Tracking::new();
    let tally = Tally::new();
    let owner = Shared::new_in(tally.token(), alloc.clone());
    let mut observer = Shared::downgrade(&owner);
    assert_eq!(Shared::weak_count(&owner), 1);
    assert!(!observer.expired());

    observer = Weak::<Token>::new();
    assert!(observer.expired());
    assert_eq!(Shared::weak_count(&owner), 0);
    assert_eq!(tally.count(), 0);
    assert_eq!(alloc.live(), 1);

    drop(owner);
    assert_eq!(tally.count(), 1);
    assert_eq!(alloc.live(), 0);
}
