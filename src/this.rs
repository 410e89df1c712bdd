use core::cell::OnceCell;
use core::fmt;

use crate::allocator::{Allocator, Global};
use crate::error::{AllocError, ConstructError, EmptyError};
use crate::{Shared, Weak};

/// Lets an object managed by [`Shared`] obtain a new owning handle to
/// itself.
///
/// An implementor embeds a [`SelfWeak`] and returns it from
/// [`self_weak`](SharedFromThis::self_weak). The `SelfWeak` is wired up only
/// by the enabling factories ([`Shared::new_enabled`] and friends), before
/// they return. Objects created with [`Shared::new`] or adopted with
/// [`Shared::from_box`] are never wired, and
/// [`shared_from_this`](SharedFromThis::shared_from_this) fails for them.
///
/// # Examples
///
/// ```
/// use smartref::{SelfWeak, Shared, SharedFromThis};
///
/// struct Session {
///     this: SelfWeak<Session>,
///     id: u32,
/// }
///
/// impl SharedFromThis for Session {
///     fn self_weak(&self) -> &SelfWeak<Self> {
///         &self.this
///     }
/// }
///
/// let session = Shared::new_enabled(Session { this: SelfWeak::new(), id: 7 });
/// let again = session.shared_from_this().unwrap();
/// assert_eq!(again.id, 7);
/// assert_eq!(Shared::use_count(&session), 2);
/// assert!(Shared::ptr_eq(&session, &again));
/// ```
pub trait SharedFromThis: Sized {
    /// The private back reference embedded in this object.
    fn self_weak(&self) -> &SelfWeak<Self>;

    /// A new owning handle to this object.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyError`] if this object was not created by an enabling
    /// factory, or if its last owner is already gone (for example, when
    /// called from the object's own destructor).
    fn shared_from_this(&self) -> Result<Shared<Self>, EmptyError> {
        self.self_weak().upgrade().ok_or(EmptyError)
    }

    /// A new observer of this object. Empty if this object was not created by
    /// an enabling factory.
    fn weak_from_this(&self) -> Weak<Self> {
        self.self_weak().weak.get().cloned().unwrap_or_default()
    }
}

/// The private [`Weak`] an object uses to find its own control block.
///
/// `SelfWeak` never owns the object. Cloning one produces an unwired
/// `SelfWeak`, because a copied object is a different object.
pub struct SelfWeak<T> {
    weak: OnceCell<Weak<T>>,
}

impl<T> SelfWeak<T> {
    /// An unwired back reference, to be embedded in a new object.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            weak: OnceCell::new(),
        }
    }

    /// Returns `true` if an enabling factory has wired this back reference.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.weak.get().is_some()
    }

    fn upgrade(&self) -> Option<Shared<T>> {
        self.weak.get()?.upgrade()
    }

    fn wire(&self, weak: Weak<T>) {
        if self.weak.set(weak).is_err() {
            debug!("smartref SelfWeak was already wired, keeping the first owner");
        }
    }
}

impl<T> Clone for SelfWeak<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Default for SelfWeak<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SelfWeak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfWeak")
            .field("wired", &self.is_wired())
            .finish()
    }
}

impl<T: SharedFromThis> Shared<T> {
    /// Construct `value` in place and wire its [`SelfWeak`] so that
    /// [`SharedFromThis::shared_from_this`] works.
    #[must_use]
    pub fn new_enabled(value: T) -> Self {
        Self::new_enabled_in(value, Global)
    }

    /// Like [`Shared::new_enabled`], in storage obtained from `alloc`.
    #[must_use]
    pub fn new_enabled_in<A>(value: T, alloc: A) -> Self
    where
        A: Allocator + 'static,
    {
        let this = Self::new_in(value, alloc);
        wire(&this);
        this
    }

    /// Like [`Shared::new_enabled_in`], returning an error if allocation
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `alloc` fails.
    pub fn try_new_enabled_in<A>(value: T, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + 'static,
    {
        let this = Self::try_new_in(value, alloc)?;
        wire(&this);
        Ok(this)
    }

    /// Like [`Shared::try_new_with_in`], wiring the constructed object's
    /// [`SelfWeak`] before returning.
    ///
    /// # Errors
    ///
    /// See [`Shared::try_new_with_in`].
    pub fn try_new_enabled_with_in<A, F, E>(alloc: A, construct: F) -> Result<Self, ConstructError<E>>
    where
        A: Allocator + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let this = Self::try_new_with_in(alloc, construct)?;
        wire(&this);
        Ok(this)
    }
}

fn wire<T: SharedFromThis>(this: &Shared<T>) {
    if let Some(value) = Shared::get(this) {
        value.self_weak().wire(Shared::downgrade(this));
    }
}
