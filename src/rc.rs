use alloc::alloc::{handle_alloc_error, Layout};
use alloc::boxed::Box;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::convert::Infallible;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::allocator::{Allocator, Global};
use crate::block::{AdoptingBlock, BlockRef, InPlaceBlock};
use crate::deleter::{DefaultDelete, Deleter};
use crate::error::{AllocError, ConstructError, EmptyError};
use crate::ptr::BlockPtr;


/// The pair every non-empty handle carries: the control block holding the
/// counts and the address of the object the handle points at.
///
/// Both live in one `Option` so a handle is either fully populated or fully
/// empty.
pub(crate) struct Raw<T: ?Sized> {
    pub(crate) block: BlockRef,
    pub(crate) ptr: NonNull<T>,
}

impl<T: ?Sized> Clone for Raw<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Raw<T> {}

/// A single-threaded reference-counting pointer which may be empty.
///
/// `Shared<T>` provides shared ownership of a value of type `T` allocated on
/// the heap. Invoking [`clone`] on a `Shared` produces a new handle to the
/// same value and increments its use count. When the last `Shared` pointing
/// at a value is dropped, the value is destroyed. The control block holding
/// the counts is freed once no [`Weak`] observes it either.
///
/// A `Shared` is created either by constructing the value in place, in the
/// same allocation as its control block ([`Shared::new`],
/// [`Shared::new_in`], [`Shared::try_new_with_in`]), or by adopting an
/// object allocated elsewhere together with a [`Deleter`]
/// ([`Shared::from_box`], [`Shared::from_raw_in`]).
///
/// The inherent functions of `Shared` are associated functions, so they do
/// not shadow methods of `T` reached through [`Deref`]:
///
/// ```
/// use smartref::Shared;
///
/// let five = Shared::new(5);
/// let also_five = Shared::clone(&five);
/// assert_eq!(Shared::use_count(&five), 2);
/// assert_eq!(*also_five, 5);
/// ```
///
/// Like `std::rc::Rc`, a cycle of `Shared` handles is never reclaimed. Use
/// [`Weak`] for back references.
///
/// [`clone`]: Clone::clone
pub struct Shared<T: ?Sized> {
    pub(crate) raw: Option<Raw<T>>,
    // Dropping a `Shared` may drop a `T`.
    phantom: PhantomData<T>,
}

/// Construct `value` in place with the global allocator.
///
/// This is equivalent to [`Shared::new`].
///
/// ```
/// let greeting = smartref::make_shared(String::from("hello"));
/// assert_eq!(greeting.as_str(), "hello");
/// ```
#[must_use]
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// Construct `value` in place in storage obtained from `alloc`.
///
/// This is equivalent to [`Shared::new_in`].
#[must_use]
pub fn allocate_shared<T, A>(alloc: A, value: T) -> Shared<T>
where
    A: Allocator + 'static,
{
    Shared::new_in(value, alloc)
}

impl<T> Shared<T> {
    /// Construct a new `Shared<T>` holding `value`.
    ///
    /// The value and its control block share a single allocation from the
    /// global allocator.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// let five = Shared::new(5);
    /// assert_eq!(Shared::use_count(&five), 1);
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::new_in(value, Global)
    }

    /// Construct a new `Shared<T>`, returning an error if allocation fails.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the global allocator fails. `value` is
    /// dropped in that case.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Global)
    }

    /// Construct a new `Shared<T>` in storage obtained from `alloc`.
    ///
    /// `alloc` is stored in the control block and frees the combined block
    /// and value region once both counts reach zero.
    #[must_use]
    pub fn new_in<A>(value: T, alloc: A) -> Self
    where
        A: Allocator + 'static,
    {
        match Self::try_new_in(value, alloc) {
            Ok(this) => this,
            Err(_) => handle_alloc_error(Layout::new::<InPlaceBlock<T, A>>()),
        }
    }

    /// Construct a new `Shared<T>` in storage obtained from `alloc`,
    /// returning an error if allocation fails.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` fails. `value` is dropped in that
    /// case.
    pub fn try_new_in<A>(value: T, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + 'static,
    {
        match Self::try_new_with_in(alloc, move || Ok::<T, Infallible>(value)) {
            Ok(this) => Ok(this),
            Err(ConstructError::Alloc(err)) => Err(err),
            Err(ConstructError::Construct(never)) => match never {},
        }
    }

    /// Construct the value with `construct` directly in the global
    /// allocator's storage.
    ///
    /// # Errors
    ///
    /// See [`Shared::try_new_with_in`].
    pub fn try_new_with<F, E>(construct: F) -> Result<Self, ConstructError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Self::try_new_with_in(Global, construct)
    }

    /// Allocate a combined control block and value region from `alloc`, then
    /// construct the value with `construct`.
    ///
    /// The control block is written first; the value is constructed only
    /// once storage for it exists. If `construct` returns an error or
    /// panics, the region is returned to `alloc` before the failure
    /// propagates, and no control block survives.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructError::Alloc`] if `alloc` fails, in which case
    /// `construct` is never called, and [`ConstructError::Construct`] if
    /// `construct` fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartref::{ConstructError, Global, Shared};
    ///
    /// let parsed = Shared::try_new_with_in(Global, || "42".parse::<u32>());
    /// assert_eq!(parsed.as_deref(), Ok(&42));
    ///
    /// let failed = Shared::try_new_with_in(Global, || "forty-two".parse::<u32>());
    /// assert!(matches!(failed, Err(ConstructError::Construct(_))));
    /// ```
    pub fn try_new_with_in<A, F, E>(alloc: A, construct: F) -> Result<Self, ConstructError<E>>
    where
        A: Allocator + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let block = InPlaceBlock::try_allocate_with(alloc, construct)?;
        let ptr = InPlaceBlock::value_ptr(block);
        // SAFETY: `try_allocate_with` returned a fully initialized block with
        // a shared count of one, which this handle takes over.
        let block = unsafe { BlockRef::from_block(block) };
        Ok(Self::from_raw_parts(block, ptr))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Build a handle from a block whose shared count already accounts for
    /// it.
    #[inline]
    pub(crate) fn from_raw_parts(block: BlockRef, ptr: NonNull<T>) -> Self {
        Self {
            raw: Some(Raw { block, ptr }),
            phantom: PhantomData,
        }
    }

    /// An empty `Shared` that owns nothing.
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// let empty = Shared::<u8>::empty();
    /// assert!(Shared::is_empty(&empty));
    /// assert_eq!(Shared::use_count(&empty), 0);
    /// ```
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: None,
            phantom: PhantomData,
        }
    }

    /// Take ownership of a boxed value.
    ///
    /// A separate control block is allocated from the global allocator and
    /// the box is freed by [`DefaultDelete`] when the last owner is dropped.
    /// `T` may be unsized.
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// let name: Shared<str> = Shared::from_box(Box::from("smartref"));
    /// assert_eq!(&*name, "smartref");
    /// ```
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self
    where
        T: 'static,
    {
        let ptr = NonNull::from(Box::leak(value));
        // SAFETY: `ptr` came from `Box::leak`, which is the pairing
        // `DefaultDelete` requires, and nothing else owns it.
        unsafe { Self::from_raw_in(ptr, DefaultDelete, Global) }
    }

    /// Adopt an object allocated elsewhere, destroying it with `deleter`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads for as long as any `Shared` owns it, and
    /// calling `deleter` with `ptr` exactly once must be sound.
    pub unsafe fn from_raw_with<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        Self::from_raw_in(ptr, deleter, Global)
    }

    /// Adopt an object allocated elsewhere, destroying it with `deleter` and
    /// allocating the control block from `alloc`.
    ///
    /// # Safety
    ///
    /// See [`Shared::from_raw_with`].
    pub unsafe fn from_raw_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Self
    where
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        match Self::try_from_raw_in(ptr, deleter, alloc) {
            Ok(this) => this,
            Err(_) => handle_alloc_error(Layout::new::<AdoptingBlock<T, D, A>>()),
        }
    }

    /// Adopt an object allocated elsewhere, returning an error if the control
    /// block cannot be allocated.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` fails. Nothing is constructed, the
    /// deleter is dropped without being called, and the caller remains
    /// responsible for `ptr`.
    ///
    /// # Safety
    ///
    /// See [`Shared::from_raw_with`].
    pub unsafe fn try_from_raw_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Result<Self, AllocError>
    where
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        let block = AdoptingBlock::allocate(ptr, deleter, alloc)?;
        Ok(Self::from_raw_parts(BlockRef::from_block(block), ptr))
    }

    /// Returns `true` if `this` owns nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// A reference to the managed object, or `None` if `this` is empty.
    #[inline]
    #[must_use]
    pub fn get(this: &Self) -> Option<&T> {
        // SAFETY: a non-empty `Shared` holds a shared count, which keeps the
        // object alive at least as long as the borrow of `this`.
        this.raw.as_ref().map(|raw| unsafe { raw.ptr.as_ref() })
    }

    /// A reference to the managed object.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyError`] if `this` is empty.
    #[inline]
    pub fn try_get(this: &Self) -> Result<&T, EmptyError> {
        Self::get(this).ok_or(EmptyError)
    }

    /// The address of the managed object, or `None` if `this` is empty.
    #[inline]
    #[must_use]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.raw.map(|raw| raw.ptr)
    }

    /// The number of `Shared` handles owning the managed object, or zero if
    /// `this` is empty.
    #[inline]
    #[must_use]
    pub fn use_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.block.shared())
    }

    /// The number of [`Weak`] handles observing the managed object, or zero
    /// if `this` is empty.
    #[inline]
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.block.weak())
    }

    /// Returns `true` if both handles point at the same address, or both are
    /// empty.
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.raw, other.raw) {
            (Some(left), Some(right)) => ptr::addr_eq(left.ptr.as_ptr(), right.ptr.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Exchange the referents of two handles without touching any count.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    /// Move the referent out of `this`, leaving it empty. No count changes.
    #[inline]
    #[must_use]
    pub fn take(this: &mut Self) -> Self {
        mem::take(this)
    }

    /// Release the referent of `this`, leaving it empty.
    ///
    /// If `this` was the last owner, the managed object is destroyed before
    /// this function returns.
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(Self::take(this));
    }

    /// Release the referent of `this`, then adopt `value`.
    ///
    /// The previous referent is released before the new control block is
    /// allocated.
    pub fn reset_to(this: &mut Self, value: Box<T>)
    where
        T: 'static,
    {
        Self::reset(this);
        *this = Self::from_box(value);
    }

    /// Release the referent of `this`, then adopt `ptr` with any deleter and
    /// allocator pairing.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the new control block cannot be allocated.
    /// `this` is left empty and the caller remains responsible for `ptr`.
    ///
    /// # Safety
    ///
    /// See [`Shared::from_raw_with`].
    pub unsafe fn reset_with<D, A>(this: &mut Self, ptr: NonNull<T>, deleter: D, alloc: A) -> Result<(), AllocError>
    where
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        Self::reset(this);
        *this = Self::try_from_raw_in(ptr, deleter, alloc)?;
        Ok(())
    }

    /// Create a [`Weak`] observer of the managed object.
    ///
    /// Downgrading an empty `Shared` yields an empty `Weak`.
    ///
    /// ```
    /// use smartref::Shared;
    ///
    /// let five = Shared::new(5);
    /// let weak_five = Shared::downgrade(&five);
    /// assert_eq!(Shared::weak_count(&five), 1);
    /// assert_eq!(weak_five.use_count(), 1);
    /// ```
    #[must_use]
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak::from(this)
    }

    /// Re-target `this` at a value reachable from the managed object while
    /// keeping the same control block.
    ///
    /// The returned handle keeps the whole managed object alive. This is how
    /// a handle to a concrete type becomes a handle to a trait object it
    /// implements, or a handle to one of its fields. No count changes.
    /// [`Weak::project`] does the same for observers.
    ///
    /// ```
    /// use std::fmt::Display;
    ///
    /// use smartref::Shared;
    ///
    /// let number = Shared::new(42_u8);
    /// let display = Shared::project::<dyn Display, _>(number, |n| n);
    /// assert_eq!(display.to_string(), "42");
    /// assert_eq!(Shared::use_count(&display), 1);
    /// ```
    pub fn project<U, F>(this: Self, f: F) -> Shared<U>
    where
        T: 'static,
        U: ?Sized,
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        let Some(raw) = this.raw else {
            return Shared::empty();
        };
        // SAFETY: `this` holds a shared count for the duration of the call.
        let target = NonNull::from(f(unsafe { raw.ptr.as_ref() }));
        // The count held by `this` moves to the projected handle.
        mem::forget(this);
        Shared::from_raw_parts(raw.block, target)
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    /// Make another owner of the same managed object.
    ///
    /// Cloning an empty `Shared` yields an empty `Shared`.
    #[inline]
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.inc_shared();
        }
        Self {
            raw: self.raw,
            phantom: PhantomData,
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    /// An empty `Shared`.
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// Dereference the managed object.
    ///
    /// Panics with [`EmptyError`]'s message if the handle is empty. Use
    /// [`Shared::get`] or [`Shared::try_get`] for a checked access.
    #[inline]
    fn deref(&self) -> &T {
        match Self::try_get(self) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: ?Sized> AsRef<T> for Shared<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Borrow<T> for Shared<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + 'static> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("(empty)"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("(empty)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::as_ptr(self) {
            Some(ptr) => fmt::Pointer::fmt(&ptr, f),
            None => fmt::Pointer::fmt(&ptr::null::<u8>(), f),
        }
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Shared<T> {
    /// Equality of the managed values. Two empty handles are equal.
    fn eq(&self, other: &Self) -> bool {
        Self::get(self) == Self::get(other)
    }
}

impl<T: ?Sized + Eq> Eq for Shared<T> {}

impl<T: ?Sized + PartialOrd> PartialOrd for Shared<T> {
    /// Ordering of the managed values. An empty handle sorts first.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Self::get(self).partial_cmp(&Self::get(other))
    }
}

impl<T: ?Sized + Ord> Ord for Shared<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::get(self).cmp(&Self::get(other))
    }
}

impl<T: ?Sized + Hash> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::get(self).hash(state);
    }
}

/// A non-owning observer of an object managed by [`Shared`].
///
/// A `Weak` does not keep the managed object alive, but it keeps the control
/// block allocated so it can always answer whether the object still exists.
/// The only way to reach the object is [`lock`], which yields a new owner
/// while the object is alive and an empty [`Shared`] afterwards.
///
/// ```
/// use smartref::Shared;
///
/// let owner = Shared::new(String::from("observed"));
/// let observer = Shared::downgrade(&owner);
/// assert!(!observer.expired());
///
/// drop(owner);
/// assert!(observer.expired());
/// assert!(smartref::Shared::is_empty(&observer.lock()));
/// ```
///
/// [`lock`]: Weak::lock
pub struct Weak<T: ?Sized> {
    pub(crate) raw: Option<Raw<T>>,
}

impl<T: ?Sized> Weak<T> {
    /// An empty `Weak` observing nothing. It is always expired.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: None }
    }

    /// Try to become an owner of the observed object.
    ///
    /// Returns a `Shared` with the use count incremented by one if the object
    /// is alive, or an empty `Shared` if it has been destroyed or `self` is
    /// empty.
    #[must_use]
    pub fn lock(&self) -> Shared<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Like [`lock`](Weak::lock), but returns `None` instead of an empty
    /// `Shared`.
    #[must_use]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let raw = self.raw?;
        if raw.block.try_inc_shared() {
            Some(Shared::from_raw_parts(raw.block, raw.ptr))
        } else {
            None
        }
    }

    /// Returns `true` if the observed object has been destroyed or `self` is
    /// empty. Once true, this stays true.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.raw.map_or(true, |raw| raw.block.is_expired())
    }

    /// The number of [`Shared`] handles owning the observed object, or zero.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.shared())
    }

    /// The number of `Weak` handles observing the same control block, or
    /// zero if `self` is empty.
    ///
    /// While the observed object's destructor runs, the releasing owner
    /// holds one additional weak reference.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.weak())
    }

    /// Returns `true` if both observe the same address, or both are empty.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.raw, other.raw) {
            (Some(left), Some(right)) => ptr::addr_eq(left.ptr.as_ptr(), right.ptr.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Exchange the observed blocks of two handles without touching any
    /// count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Stop observing, leaving `self` empty.
    pub fn reset(&mut self) {
        drop(mem::take(self));
    }

    /// Observe a value reachable from the observed object through the same
    /// control block. See [`Shared::project`].
    ///
    /// The object must be alive for `f` to reach into it, so projecting an
    /// expired or empty `Weak` yields an empty `Weak`.
    ///
    /// ```
    /// use std::fmt::Display;
    ///
    /// use smartref::Shared;
    ///
    /// let number = Shared::new(7_u32);
    /// let weak = Shared::downgrade(&number);
    /// let display = weak.project::<dyn Display, _>(|n| n);
    /// assert_eq!(display.lock().to_string(), "7");
    /// assert_eq!(Shared::weak_count(&number), 2);
    ///
    /// drop(number);
    /// assert!(display.expired());
    /// ```
    #[must_use]
    pub fn project<U, F>(&self, f: F) -> Weak<U>
    where
        T: 'static,
        U: ?Sized,
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        match self.upgrade() {
            Some(shared) => Shared::downgrade(&Shared::project(shared, f)),
            None => Weak::new(),
        }
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    fn from(shared: &Shared<T>) -> Self {
        if let Some(raw) = shared.raw {
            raw.block.inc_weak();
        }
        Self { raw: shared.raw }
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.inc_weak();
        }
        Self { raw: self.raw }
    }
}

impl<T: ?Sized> Default for Weak<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}
