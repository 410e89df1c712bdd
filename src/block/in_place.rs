use alloc::alloc::Layout;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr::{self, NonNull};

use super::{ControlBlock, Header};
use crate::allocator::Allocator;
use crate::error::ConstructError;

/// A control block sharing one allocation with the object it manages.
///
/// The object lives in `value`, directly after the block's bookkeeping, and
/// its address is computed from the block's address.
#[repr(C)]
pub(crate) struct InPlaceBlock<T, A> {
    header: Header,
    // Consumed by `destroy_self`.
    alloc: ManuallyDrop<A>,
    // Initialized while the shared count is non-zero.
    value: MaybeUninit<T>,
}

impl<T, A: Allocator> InPlaceBlock<T, A> {
    /// Allocate a combined block and object region, write the block header,
    /// then construct the object with `construct`.
    ///
    /// If `construct` fails or panics, the region is released before the
    /// failure propagates and no block survives.
    pub(crate) fn try_allocate_with<F, E>(alloc: A, construct: F) -> Result<NonNull<Self>, ConstructError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let layout = Layout::new::<Self>();
        let block = match alloc.allocate(layout) {
            Ok(block) => block.cast::<Self>(),
            Err(err) => {
                debug!(
                    "smartref failed to allocate {} byte in-place block",
                    layout.size()
                );
                return Err(ConstructError::Alloc(err));
            }
        };
        let raw = block.as_ptr();
        // SAFETY: `block` is freshly allocated with the layout of `Self`.
        unsafe {
            ptr::addr_of_mut!((*raw).header).write(Header::new::<Self>());
        }

        let rollback = Rollback {
            region: block.cast::<u8>(),
            layout,
            alloc: &alloc,
        };
        let value = construct().map_err(ConstructError::Construct)?;
        mem::forget(rollback);

        // SAFETY: `block` is allocated and its header is initialized; the
        // remaining fields are written exactly once here.
        unsafe {
            ptr::addr_of_mut!((*raw).value).write(MaybeUninit::new(value));
            ptr::addr_of_mut!((*raw).alloc).write(ManuallyDrop::new(alloc));
        }
        trace!("smartref constructed object in place in block {:p}", block);
        Ok(block)
    }

    /// The address of the managed object inside `block`.
    #[inline]
    pub(crate) fn value_ptr(block: NonNull<Self>) -> NonNull<T> {
        // SAFETY: projecting a field of a non-null block pointer yields a
        // non-null pointer. No reference to the block is created.
        unsafe {
            let value = ptr::addr_of_mut!((*block.as_ptr()).value);
            NonNull::new_unchecked(value.cast::<T>())
        }
    }
}

unsafe impl<T, A: Allocator> ControlBlock for InPlaceBlock<T, A> {
    unsafe fn destroy_managed_object(this: NonNull<Self>) {
        ptr::drop_in_place(Self::value_ptr(this).as_ptr());
    }

    unsafe fn destroy_self(this: NonNull<Self>) {
        // `value` was dropped in place already and `MaybeUninit` does not drop
        // it again.
        let alloc = ManuallyDrop::take(&mut (*this.as_ptr()).alloc);
        alloc.deallocate(this.cast(), Layout::new::<Self>());
    }
}

// Releases a half-built in-place block if the object's constructor returns an
// error or unwinds.
struct Rollback<'a, A: Allocator> {
    region: NonNull<u8>,
    layout: Layout,
    alloc: &'a A,
}

impl<A: Allocator> Drop for Rollback<'_, A> {
    fn drop(&mut self) {
        trace!(
            "smartref in-place construction failed, releasing {:p}",
            self.region
        );
        // SAFETY: `region` was allocated by `alloc` with `layout` and no
        // object was written into it.
        unsafe {
            self.alloc.deallocate(self.region, self.layout);
        }
    }
}
