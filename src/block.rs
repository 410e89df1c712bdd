use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;

use crate::ptr::BlockPtr;

mod adopting;
mod in_place;

pub(crate) use adopting::AdoptingBlock;
pub(crate) use in_place::InPlaceBlock;

/// The cleanup strategy of a concrete control block.
///
/// Both primitives are reached only through the erased function pointers
/// stored in the block's [`Header`].
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a [`Header`] built by
/// [`Header::new`] for `Self` as their first field, so a pointer to the header
/// is also a pointer to the block.
pub(crate) unsafe trait ControlBlock: Sized {
    /// Run the managed object's destructor or deleter.
    ///
    /// # Safety
    ///
    /// Called at most once, when the shared count drops to zero, and before
    /// [`destroy_self`](ControlBlock::destroy_self).
    unsafe fn destroy_managed_object(this: NonNull<Self>);

    /// Release the block's own memory through the allocator that created it.
    ///
    /// # Safety
    ///
    /// Called at most once, when both counts are zero. This must be the last
    /// access to the block.
    unsafe fn destroy_self(this: NonNull<Self>);
}

/// The type-erased prefix of every control block: the two liveness counters
/// and the block's cleanup strategy.
#[repr(C)]
pub(crate) struct Header {
    pub(crate) shared: Cell<usize>,
    pub(crate) weak: Cell<usize>,
    destroy_managed_object: unsafe fn(NonNull<Header>),
    destroy_self: unsafe fn(NonNull<Header>),
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("shared", &self.shared.get())
            .field("weak", &self.weak.get())
            .finish_non_exhaustive()
    }
}

impl Header {
    /// A header for a freshly created block owned by one `Shared`.
    pub(crate) fn new<B: ControlBlock>() -> Self {
        Self {
            shared: Cell::new(1),
            weak: Cell::new(0),
            destroy_managed_object: destroy_managed_object_erased::<B>,
            destroy_self: destroy_self_erased::<B>,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        unsafe fn noop(_: NonNull<Header>) {}

        Self {
            shared: Cell::new(1),
            weak: Cell::new(0),
            destroy_managed_object: noop,
            destroy_self: noop,
        }
    }
}

unsafe fn destroy_managed_object_erased<B: ControlBlock>(header: NonNull<Header>) {
    B::destroy_managed_object(header.cast::<B>());
}

unsafe fn destroy_self_erased<B: ControlBlock>(header: NonNull<Header>) {
    B::destroy_self(header.cast::<B>());
}

/// A copyable, type-erased reference to a live control block.
///
/// A `BlockRef` carries no count of its own; the handle holding it is
/// responsible for the shared or weak count that keeps the block alive.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockRef {
    ptr: NonNull<Header>,
}

impl fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}

impl fmt::Pointer for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}

impl BlockRef {
    /// Erase a freshly created block.
    ///
    /// # Safety
    ///
    /// `block` must point to a live, initialized block.
    #[inline]
    pub(crate) unsafe fn from_block<B: ControlBlock>(block: NonNull<B>) -> Self {
        Self { ptr: block.cast() }
    }

    /// Run the managed object's cleanup strategy.
    ///
    /// # Safety
    ///
    /// See [`ControlBlock::destroy_managed_object`].
    #[inline]
    pub(crate) unsafe fn destroy_managed_object(self) {
        let destroy = self.header().destroy_managed_object;
        destroy(self.ptr);
    }

    /// Free the block.
    ///
    /// # Safety
    ///
    /// See [`ControlBlock::destroy_self`]. `self` and every copy of it dangle
    /// after this call.
    #[inline]
    pub(crate) unsafe fn destroy_self(self) {
        let destroy = self.header().destroy_self;
        destroy(self.ptr);
    }
}

impl BlockPtr for BlockRef {
    #[inline]
    fn header(&self) -> &Header {
        // SAFETY: a `BlockRef` is only reachable through a handle that holds
        // a shared or weak count, which keeps the block allocated.
        unsafe { self.ptr.as_ref() }
    }
}
