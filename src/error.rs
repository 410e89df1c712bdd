use core::fmt;

/// The error returned when an [`Allocator`] cannot satisfy a request for a
/// control block.
///
/// When this error is returned nothing has been constructed: no control
/// block exists and no memory remains allocated.
///
/// [`Allocator`]: crate::Allocator
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation for a control block failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// The error returned when an empty or unwired handle is used where a live
/// object is required.
///
/// This is returned by [`Shared::try_get`] on an empty [`Shared`] and by
/// [`SharedFromThis::shared_from_this`] on an object that was not created by
/// an enabling factory or whose last owner has already been dropped.
///
/// [`Shared`]: crate::Shared
/// [`Shared::try_get`]: crate::Shared::try_get
/// [`SharedFromThis::shared_from_this`]: crate::SharedFromThis::shared_from_this
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmptyError;

impl fmt::Display for EmptyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("handle does not refer to a live object")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EmptyError {}

/// The error returned by the fallible in-place factories.
///
/// Either the allocator failed before the object was constructed, or the
/// object's constructor failed. In both cases the combined block and object
/// storage has been released before the error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructError<E> {
    /// The allocator could not provide storage for the block and object.
    Alloc(AllocError),
    /// The constructor of the managed object failed.
    Construct(E),
}

impl<E> From<AllocError> for ConstructError<E> {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}

impl<E: fmt::Display> fmt::Display for ConstructError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc(err) => fmt::Display::fmt(err, f),
            Self::Construct(err) => write!(f, "constructing the managed object failed: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for ConstructError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Alloc(err) => Some(err),
            Self::Construct(err) => Some(err),
        }
    }
}
