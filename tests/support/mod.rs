#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::hash::BuildHasherDefault;
use std::ptr::NonNull;
use std::rc::Rc;

use rustc_hash::FxHasher;
use smartref::{AllocError, Allocator, Global};

type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasherDefault<FxHasher>>;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env("SMARTREF_LOG")
        .is_test(true)
        .try_init();
}

#[derive(Debug, Default)]
struct Ledger {
    live: HashMap<usize, Layout>,
    allocations: usize,
    deallocations: usize,
    failing: bool,
}

/// An allocator that records every block it hands out and panics on double
/// frees and layout mismatches.
#[derive(Debug, Clone, Default)]
pub struct Tracking {
    ledger: Rc<RefCell<Ledger>>,
}

impl Tracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator whose every allocation fails.
    pub fn failing() -> Self {
        let alloc = Self::new();
        alloc.ledger.borrow_mut().failing = true;
        alloc
    }

    pub fn live(&self) -> usize {
        self.ledger.borrow().live.len()
    }

    pub fn allocations(&self) -> usize {
        self.ledger.borrow().allocations
    }

    pub fn deallocations(&self) -> usize {
        self.ledger.borrow().deallocations
    }

    /// Returns `true` if `ptr` lies inside a block this allocator still owns.
    pub fn owns<T: ?Sized>(&self, ptr: NonNull<T>) -> bool {
        let addr = ptr.cast::<u8>().as_ptr() as usize;
        self.ledger
            .borrow()
            .live
            .iter()
            .any(|(&start, layout)| (start..start + layout.size()).contains(&addr))
    }
}

unsafe impl Allocator for Tracking {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.failing {
            return Err(AllocError);
        }
        let ptr = Global.allocate(layout)?;
        let previous = ledger.live.insert(ptr.as_ptr() as usize, layout);
        assert!(previous.is_none(), "allocator handed out a live address");
        ledger.allocations += 1;
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let mut ledger = self.ledger.borrow_mut();
        match ledger.live.remove(&(ptr.as_ptr() as usize)) {
            Some(recorded) => assert_eq!(recorded, layout, "deallocated with a different layout"),
            None => panic!("double free or foreign pointer {ptr:p}"),
        }
        ledger.deallocations += 1;
        drop(ledger);
        Global.deallocate(ptr, layout);
    }
}

/// Counts how many of its tokens have been dropped.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    drops: Rc<Cell<usize>>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Token {
        Token { tally: self.clone() }
    }

    pub fn count(&self) -> usize {
        self.drops.get()
    }
}

#[derive(Debug)]
pub struct Token {
    tally: Tally,
}

impl Drop for Token {
    fn drop(&mut self) {
        self.tally.drops.set(self.tally.drops.get() + 1);
    }
}
