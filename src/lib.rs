#![cfg_attr(not(feature = "std"), no_std)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(unknown_lints)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]

//! Single-threaded shared and weak reference-counting handles with custom
//! deleters and allocators.
//!
//! The type [`Shared<T>`] provides shared ownership of a value of type `T`,
//! allocated on the heap. Invoking [`clone`] on [`Shared`] produces a new
//! owner of the same value. When the last [`Shared`] owning a value is
//! dropped, the value is destroyed.
//!
//! [`clone`]: Clone::clone
//!
//! A [`Weak`] observes a value without owning it. It can always tell whether
//! the value still exists, and [`Weak::lock`] turns it back into an owner
//! while it does.
//!
//! # Control blocks
//!
//! Every managed value is paired with a control block holding two counts:
//! the number of [`Shared`] owners and the number of [`Weak`] observers. The
//! value is destroyed exactly once, when the shared count drops to zero. The
//! control block itself is freed exactly once, when both counts are zero,
//! whichever reaches zero last.
//!
//! There are two kinds of control block:
//!
//! - An in-place block allocates the control block and the value together
//!   and constructs the value directly in that storage. This is what
//!   [`Shared::new`], [`Shared::new_in`] and [`Shared::try_new_with_in`]
//!   create.
//! - An adopting block takes over an object allocated elsewhere, together
//!   with the [`Deleter`] that destroys it. This is what
//!   [`Shared::from_box`] and [`Shared::from_raw_in`] create.
//!
//! Both kinds of block are allocated through an [`Allocator`]; [`Global`]
//! is the default.
//!
//! ```
//! use smartref::{Shared, Weak};
//!
//! let first = Shared::new(String::from("managed"));
//! let second = Shared::clone(&first);
//! assert_eq!(Shared::use_count(&second), 2);
//!
//! drop(first);
//! assert_eq!(Shared::use_count(&second), 1);
//!
//! let observer: Weak<String> = Shared::downgrade(&second);
//! drop(second);
//! assert!(observer.expired());
//! assert_eq!(observer.use_count(), 0);
//! ```
//!
//! # Obtaining a handle to yourself
//!
//! A type implementing [`SharedFromThis`] embeds a [`SelfWeak`]. When it is
//! created with [`Shared::new_enabled`], the back reference is wired before
//! the factory returns and [`SharedFromThis::shared_from_this`] yields new
//! owners of the object from a plain `&self`.
//!
//! # Cycles
//!
//! A cycle of [`Shared`] handles is never reclaimed. This is a known
//! limitation of reference counting, not something this crate tries to
//! detect. Break cycles with [`Weak`].
//!
//! # Threads
//!
//! Counts are updated without atomics. [`Shared`] and [`Weak`] are neither
//! `Send` nor `Sync`, so every handle to one control block stays on one
//! thread.
//!
//! # Features
//!
//! - `std` (default): implement `std::error::Error` for the error types and
//!   abort the process on reference count overflow. Without it the crate is
//!   `no_std` and only requires `alloc`.

#![doc(html_root_url = "https://docs.rs/smartref/0.1.0")]

// Ensure code blocks in README.md compile
#[cfg(doctest)]
#[doc = include_str!("../README.md")]
mod readme {}

extern crate alloc;
#[macro_use]
extern crate log;

mod allocator;
mod block;
mod deleter;
mod drop;
mod error;
mod ptr;
mod rc;
mod this;

pub use allocator::{Allocator, Global};
pub use deleter::{DefaultDelete, Deleter};
pub use error::{AllocError, ConstructError, EmptyError};
pub use rc::{allocate_shared, make_shared, Shared, Weak};
pub use this::{SelfWeak, SharedFromThis};

/// Conventional alias for [`Shared`].
pub type SharedPtr<T> = Shared<T>;

/// Conventional alias for [`Weak`].
pub type WeakPtr<T> = Weak<T>;
