use alloc::boxed::Box;
use core::ptr::NonNull;

/// The cleanup strategy for an adopted object.
///
/// A deleter is stored in the control block created by [`Shared::from_raw_in`]
/// and friends and is consumed exactly once, when the last [`Shared`] owning
/// the object is dropped. It is never invoked if the block could not be
/// allocated.
///
/// Any `FnOnce(NonNull<T>)` closure is a deleter. Deleters stored in a block
/// are erased from the handle's type, so they must be `'static`.
///
/// [`Shared`]: crate::Shared
/// [`Shared::from_raw_in`]: crate::Shared::from_raw_in
pub trait Deleter<T: ?Sized> {
    /// Destroy the object at `ptr` and release its memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was paired with at adoption,
    /// and no reference to the object may be used after this call.
    unsafe fn delete(self, ptr: NonNull<T>);
}

impl<T, F> Deleter<T> for F
where
    T: ?Sized,
    F: FnOnce(NonNull<T>),
{
    #[inline]
    unsafe fn delete(self, ptr: NonNull<T>) {
        self(ptr);
    }
}

/// The deleter for objects allocated with [`Box`].
///
/// This is the deleter used by [`Shared::from_box`] and
/// [`Shared::reset_to`].
///
/// [`Shared::from_box`]: crate::Shared::from_box
/// [`Shared::reset_to`]: crate::Shared::reset_to
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(self, ptr: NonNull<T>) {
        // SAFETY: the caller pairs `DefaultDelete` only with pointers obtained
        // from `Box::into_raw`.
        drop(Box::from_raw(ptr.as_ptr()));
    }
}
