#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod support;

use std::cell::Cell;
use std::convert::Infallible;
use std::ptr::NonNull;
use std::rc::Rc;

use smartref::{AllocError, ConstructError, DefaultDelete, Shared};
use support::{Tally, Tracking};

#[test]
fn in_place_allocation_failure() {
    support::init_logging();

    let alloc = Tracking::failing();
    let tally = Tally::new();

    let result = Shared::try_new_in(tally.token(), alloc.clone());
    assert_eq!(result.err(), Some(AllocError));
    // The value handed to the factory is dropped with the failed call.
    assert_eq!(tally.count(), 1);
    assert_eq!(alloc.allocations(), 0);
    assert_eq!(alloc.live(), 0);
}

#[test]
fn constructor_is_not_called_without_storage() {
    support::init_logging();

    let alloc = Tracking::failing();
    let called = Cell::new(false);

    let result = Shared::<u8>::try_new_with_in(alloc.clone(), || {
        called.set(true);
        Ok::<_, Infallible>(1)
    });
    assert!(matches!(result, Err(ConstructError::Alloc(AllocError))));
    assert!(!called.get());
    assert_eq!(alloc.live(), 0);
}

#[test]
fn adopt_allocation_failure_leaves_pointer_with_caller() {
    support::init_logging();

    let alloc = Tracking::failing();
    let calls = Rc::new(Cell::new(0_usize));
    let ptr = NonNull::from(Box::leak(Box::new(String::from("kept"))));
    let deleter = {
        let calls = Rc::clone(&calls);
        move |_: NonNull<String>| calls.set(calls.get() + 1)
    };

    // SAFETY: `ptr` is a live, uniquely owned allocation.
    let result = unsafe { Shared::try_from_raw_in(ptr, deleter, alloc.clone()) };
    assert_eq!(result.err(), Some(AllocError));
    assert_eq!(calls.get(), 0);
    // The deleter was dropped without being called.
    assert_eq!(Rc::strong_count(&calls), 1);

    // SAFETY: adoption failed, so the caller still owns the box.
    let reclaimed = unsafe { Box::from_raw(ptr.as_ptr()) };
    assert_eq!(*reclaimed, "kept");
}

#[test]
fn reset_with_allocation_failure_empties_the_handle() {
    support::init_logging();

    let tally = Tally::new();
    let mut shared = Shared::new(tally.token());
    let ptr = NonNull::from(Box::leak(Box::new(tally.token())));

    // SAFETY: `DefaultDelete` pairs with `Box::leak`.
    let result = unsafe { Shared::reset_with(&mut shared, ptr, DefaultDelete, Tracking::failing()) };
    assert_eq!(result, Err(AllocError));
    assert!(Shared::is_empty(&shared));
    // The previous referent was released before the allocation was tried.
    assert_eq!(tally.count(), 1);

    // SAFETY: adoption failed, so the caller still owns the box.
    drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    assert_eq!(tally.count(), 2);
}
