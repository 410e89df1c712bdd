use crate::block::Header;

/// Counter bookkeeping shared by everything that can reach a control block
/// header.
///
/// These are plain `Cell` updates. All handles to one block must be used
/// from a single thread, which `Shared` and `Weak` enforce by being neither
/// `Send` nor `Sync`.
pub(crate) trait BlockPtr {
    fn header(&self) -> &Header;

    #[inline]
    fn shared(&self) -> usize {
        self.header().shared.get()
    }

    #[inline]
    fn inc_shared(&self) {
        // We want to abort on overflow instead of dropping the value.
        let shared_count = self.shared();
        if shared_count == 0 || shared_count >= usize::MAX - 1 {
            overflow();
        }
        self.header().shared.set(shared_count + 1);
    }

    /// Increment the shared count only if the object is still alive.
    ///
    /// This is the only way an observer turns into an owner, so a count that
    /// has reached zero is never resurrected.
    #[inline]
    fn try_inc_shared(&self) -> bool {
        if self.shared() == 0 {
            return false;
        }
        self.inc_shared();
        true
    }

    /// Returns `true` if this decrement released the last owner.
    #[inline]
    fn dec_shared(&self) -> bool {
        let shared_count = self.shared();
        debug_assert!(shared_count > 0, "shared count underflow");
        let shared_count = shared_count.saturating_sub(1);
        self.header().shared.set(shared_count);
        shared_count == 0
    }

    #[inline]
    fn weak(&self) -> usize {
        self.header().weak.get()
    }

    #[inline]
    fn inc_weak(&self) {
        // Unlike `std::rc`, owners do not hold an implicit weak reference, so
        // zero is a valid starting point here.
        let weak_count = self.weak();
        if weak_count >= usize::MAX - 1 {
            overflow();
        }
        self.header().weak.set(weak_count + 1);
    }

    /// Returns `true` if this decrement released the last observer.
    #[inline]
    fn dec_weak(&self) -> bool {
        let weak_count = self.weak();
        debug_assert!(weak_count > 0, "weak count underflow");
        let weak_count = weak_count.saturating_sub(1);
        self.header().weak.set(weak_count);
        weak_count == 0
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.shared() == 0
    }
}

impl BlockPtr for Header {
    #[inline]
    fn header(&self) -> &Header {
        self
    }
}

#[cold]
#[inline(never)]
fn overflow() -> ! {
    #[cfg(feature = "std")]
    {
        std::process::abort()
    }
    #[cfg(not(feature = "std"))]
    {
        panic!("smartref reference count overflow")
    }
}
