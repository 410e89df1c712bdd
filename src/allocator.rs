use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::{self, NonNull};

use crate::error::AllocError;

/// A source of memory for control blocks.
///
/// An allocator handed to [`Shared`] is stored inside the control block it
/// allocated and is used once more, to free that same block, after both the
/// shared and weak counts reach zero. For an adopted object the allocator
/// only ever sees the block; the object itself is released by its
/// [`Deleter`].
///
/// Allocators stored in a block are erased from the handle's type, so they
/// must be `'static`.
///
/// # Safety
///
/// Memory returned by [`allocate`] must be valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and must remain valid
/// until it is passed to [`deallocate`] on this allocator or a clone of it.
///
/// [`Shared`]: crate::Shared
/// [`Deleter`]: crate::Deleter
/// [`allocate`]: Allocator::allocate
/// [`deallocate`]: Allocator::deallocate
pub unsafe trait Allocator {
    /// Allocate a region of memory fitting `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the request cannot be satisfied.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Release a region previously returned by [`allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`] on this allocator with
    /// the same `layout`, and must not have been deallocated already.
    ///
    /// [`allocate`]: Allocator::allocate
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

unsafe impl<A> Allocator for &A
where
    A: Allocator + ?Sized,
{
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout);
    }
}

/// The global memory allocator.
///
/// This forwards to whatever allocator is registered with
/// `#[global_allocator]`, and is the allocator used by [`Shared::new`] and
/// [`Shared::from_box`].
///
/// [`Shared::new`]: crate::Shared::new
/// [`Shared::from_box`]: crate::Shared::from_box
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Zero-sized regions are never handed to the global allocator.
            // A well-aligned dangling pointer is a valid empty region.
            let dangling = ptr::null_mut::<u8>().wrapping_add(layout.align());
            return NonNull::new(dangling).ok_or(AllocError);
        }
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}
