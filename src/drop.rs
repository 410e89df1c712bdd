use crate::block::BlockRef;
use crate::ptr::BlockPtr;
use crate::{Shared, Weak};

impl<T: ?Sized> Drop for Shared<T> {
    /// Drops the [`Shared`].
    ///
    /// This will decrement the shared count. If the shared count reaches zero
    /// then the only other references (if any) are [`Weak`], so the managed
    /// object is destroyed. If there are also no [`Weak`]s left, the control
    /// block is freed as well.
    ///
    /// Dropping an empty `Shared` does nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// struct Foo;
    ///
    /// impl Drop for Foo {
    ///     fn drop(&mut self) {
    ///         println!("dropped!");
    ///     }
    /// }
    ///
    /// let foo  = Shared::new(Foo);
    /// let foo2 = Shared::clone(&foo);
    ///
    /// drop(foo);    // Doesn't print anything
    /// drop(foo2);   // Prints "dropped!"
    /// ```
    ///
    /// # Ordering
    ///
    /// The managed object is always destroyed before its control block is
    /// freed, regardless of whether the last [`Shared`] or the last
    /// [`Weak`] goes away first. The object's destructor may itself drop
    /// [`Weak`]s pointing at its own control block (a [`SelfWeak`] does
    /// exactly this); the block stays allocated until the destructor returns.
    ///
    /// If the destructor or deleter panics, the control block is still freed
    /// once no [`Weak`] remains.
    ///
    /// [`SelfWeak`]: crate::SelfWeak
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: `self` held one shared count on `raw.block`, which is
            // given up here exactly once.
            unsafe {
                release_shared(raw.block);
            }
        }
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    /// Drops the [`Weak`].
    ///
    /// This will decrement the weak count. If both the weak and the shared
    /// count are zero, the control block is freed. Dropping a `Weak` never
    /// destroys the managed object.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// let foo = Shared::new(5);
    /// let weak_foo = Shared::downgrade(&foo);
    /// let other_weak_foo = weak_foo.clone();
    ///
    /// drop(weak_foo);   // Doesn't print anything
    /// drop(foo);        // Destroys the value
    ///
    /// assert!(Shared::is_empty(&other_weak_foo.lock()));
    /// ```
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: `self` held one weak count on `raw.block`, which is
            // given up here exactly once.
            unsafe {
                release_weak(raw.block);
            }
        }
    }
}

unsafe fn release_shared(block: BlockRef) {
    if !block.dec_shared() {
        return;
    }
    // Hold the block while the managed object is destroyed. Its destructor
    // may release weak handles into this same block, and on unwind the hold
    // still runs so the block is not leaked.
    block.inc_weak();
    let _hold = WeakHold(block);
    trace!("smartref destroying managed object of block {:p}", block);
    block.destroy_managed_object();
}

unsafe fn release_weak(block: BlockRef) {
    if block.dec_weak() && block.is_expired() {
        trace!("smartref deallocating block {:p}", block);
        block.destroy_self();
    }
}

// A transient weak count owned by the `Shared` that is destroying the
// managed object.
struct WeakHold(BlockRef);

impl Drop for WeakHold {
    fn drop(&mut self) {
        // SAFETY: `release_shared` took this weak count before creating the
        // hold.
        unsafe {
            release_weak(self.0);
        }
    }
}
