use alloc::alloc::Layout;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use super::{ControlBlock, Header};
use crate::allocator::Allocator;
use crate::deleter::Deleter;
use crate::error::AllocError;

/// A control block that takes over an object allocated elsewhere.
///
/// The block stores the adopted pointer, the deleter that destroys it and
/// the allocator that allocated the block. The allocator never touches the
/// managed object.
#[repr(C)]
pub(crate) struct AdoptingBlock<T: ?Sized, D, A> {
    header: Header,
    ptr: NonNull<T>,
    // Consumed by `destroy_managed_object`.
    deleter: ManuallyDrop<D>,
    // Consumed by `destroy_self`.
    alloc: ManuallyDrop<A>,
}

impl<T, D, A> AdoptingBlock<T, D, A>
where
    T: ?Sized,
    D: Deleter<T>,
    A: Allocator,
{
    /// Allocate a block adopting `ptr` with a shared count of one.
    ///
    /// If the allocator fails, nothing is constructed, `deleter` and `alloc`
    /// are dropped, and `ptr` is left untouched for the caller to reclaim.
    pub(crate) fn allocate(ptr: NonNull<T>, deleter: D, alloc: A) -> Result<NonNull<Self>, AllocError> {
        let layout = Layout::new::<Self>();
        let block = match alloc.allocate(layout) {
            Ok(block) => block.cast::<Self>(),
            Err(err) => {
                debug!(
                    "smartref failed to allocate {} byte adopting block",
                    layout.size()
                );
                return Err(err);
            }
        };
        let value = Self {
            header: Header::new::<Self>(),
            ptr,
            deleter: ManuallyDrop::new(deleter),
            alloc: ManuallyDrop::new(alloc),
        };
        // SAFETY: `block` is freshly allocated with the layout of `Self`.
        unsafe {
            block.as_ptr().write(value);
        }
        trace!("smartref adopted {:p} into block {:p}", ptr, block);
        Ok(block)
    }
}

unsafe impl<T, D, A> ControlBlock for AdoptingBlock<T, D, A>
where
    T: ?Sized,
    D: Deleter<T>,
    A: Allocator,
{
    unsafe fn destroy_managed_object(this: NonNull<Self>) {
        let this = this.as_ptr();
        let ptr = (*this).ptr;
        let deleter = ManuallyDrop::take(&mut (*this).deleter);
        deleter.delete(ptr);
    }

    unsafe fn destroy_self(this: NonNull<Self>) {
        // The deleter was consumed when the managed object was destroyed, and
        // the header and pointer have no destructors.
        let alloc = ManuallyDrop::take(&mut (*this.as_ptr()).alloc);
        alloc.deallocate(this.cast(), Layout::new::<Self>());
    }
}
