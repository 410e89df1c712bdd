#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod support;

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use smartref::{ConstructError, EmptyError, SelfWeak, Shared, SharedFromThis};
use support::{Tally, Token, Tracking};

struct Widget {
    this: SelfWeak<Widget>,
    name: &'static str,
    _token: Option<Token>,
}

impl Widget {
    fn new(name: &'static str) -> Self {
        Self {
            this: SelfWeak::new(),
            name,
            _token: None,
        }
    }

    fn counted(name: &'static str, tally: &Tally) -> Self {
        Self {
            _token: Some(tally.token()),
            ..Self::new(name)
        }
    }
}

impl SharedFromThis for Widget {
    fn self_weak(&self) -> &SelfWeak<Self> {
        &self.this
    }
}

#[test]
fn shared_from_this_aliases_the_owner() {
    support::init_logging();

    let widget = Shared::new_enabled(Widget::new("enabled"));
    let before = Shared::use_count(&widget);

    let again = widget.shared_from_this().unwrap();
    assert_eq!(Shared::use_count(&again), before + 1);
    assert_eq!(Shared::as_ptr(&widget), Shared::as_ptr(&again));
    assert!(Shared::ptr_eq(&widget, &again));
    assert_eq!(again.name, "enabled");
}

#[test]
fn shared_from_this_on_adopted_object_fails() {
    support::init_logging();

    let widget = Shared::from_box(Box::new(Widget::new("boxed")));
    assert_eq!(widget.shared_from_this().err(), Some(EmptyError));
    assert!(widget.weak_from_this().expired());
    assert_eq!(Shared::use_count(&widget), 1);
}

#[test]
fn shared_from_this_on_unmanaged_object_fails() {
    support::init_logging();

    let widget = Widget::new("stack");
    assert_eq!(widget.shared_from_this().err(), Some(EmptyError));
}

#[test]
fn enabled_object_is_destroyed_once() {
    support::init_logging();

    let alloc = Tracking::new();
    let tally = Tally::new();
    let widget = Shared::new_enabled_in(Widget::counted("tracked", &tally), alloc.clone());
    // The self back reference is a weak observer, not an owner.
    assert_eq!(Shared::use_count(&widget), 1);
    assert_eq!(Shared::weak_count(&widget), 1);

    let observer = widget.weak_from_this();
    drop(widget);
    assert_eq!(tally.count(), 1);
    assert!(observer.expired());
    assert_eq!(alloc.live(), 1);

    drop(observer);
    assert_eq!(tally.count(), 1);
    assert_eq!(alloc.live(), 0);
}

#[test]
fn fallible_enabled_factories() {
    support::init_logging();

    let widget = Shared::try_new_enabled_in(Widget::new("fallible"), Tracking::new()).unwrap();
    assert!(widget.shared_from_this().is_ok());

    let widget = Shared::try_new_enabled_with_in(Tracking::new(), || Ok::<_, Infallible>(Widget::new("built"))).unwrap();
    assert_eq!(widget.shared_from_this().unwrap().name, "built");

    let alloc = Tracking::new();
    let failed = Shared::try_new_enabled_with_in(alloc.clone(), || Err::<Widget, _>("refused"));
    assert!(matches!(failed, Err(ConstructError::Construct("refused"))));
    assert_eq!(alloc.live(), 0);
}

struct Probe {
    this: SelfWeak<Probe>,
    seen_in_drop: Rc<Cell<Option<bool>>>,
}

impl SharedFromThis for Probe {
    fn self_weak(&self) -> &SelfWeak<Self> {
        &self.this
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.seen_in_drop.set(Some(self.shared_from_this().is_ok()));
    }
}

#[test]
fn shared_from_this_fails_during_destruction() {
    support::init_logging();

    let alloc = Tracking::new();
    let seen_in_drop = Rc::new(Cell::new(None));
    let probe = Shared::new_enabled_in(
        Probe {
            this: SelfWeak::new(),
            seen_in_drop: Rc::clone(&seen_in_drop),
        },
        alloc.clone(),
    );
    drop(probe);

    assert_eq!(seen_in_drop.get(), Some(false));
    assert_eq!(alloc.live(), 0);
}
