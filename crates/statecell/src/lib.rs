#![forbid(unsafe_code)]

//! Observable value cells with bounded undo history.
//!
//! A [`StateCell<T>`] is a single mutable value whose changes are
//! broadcast synchronously to subscribers, with:
//!
//! - a bounded linear undo/redo log (default 10 entries),
//! - read-only derived projections ([`StateCell::select`]), gated by a
//!   caller-supplied equality so equal-but-rebuilt projections don't
//!   re-broadcast,
//! - N-ary joins ([`StateCell::join`], [`join2`], [`join3`]) whose value
//!   is the ordered tuple of the sources' values,
//! - an optional reducer for action-style updates
//!   ([`StateCell::dispatch`]).
//!
//! # Architecture
//!
//! `StateCell<T>` is a cheap clonable handle over `Rc<RefCell<..>>`
//! shared state: one [`timeline`] (current value + history) and one
//! [`registry`] (ordered subscribers with deferred removal). Everything
//! is single-threaded and synchronous; mutation and notification happen
//! on the caller's stack, re-entrantly.
//!
//! Derived and joined cells are ordinary `StateCell`s with the
//! read-only flag set and one internal subscription per source, so
//! composition nests arbitrarily.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order; subscribing
//!    replays the current value synchronously before `subscribe`
//!    returns.
//! 2. Setting an equal value is a no-op: no history entry, no
//!    broadcast.
//! 3. Unsubscribing from inside a callback is deferred: the callback
//!    receives the in-flight broadcast in full and none after it.
//! 4. Every mutator on a derived or joined cell fails with
//!    [`StateError::ReadOnly`].
//!
//! # Example
//!
//! ```
//! use statecell::StateCell;
//!
//! let counter = StateCell::new(0);
//! let doubled = counter.select(|n| n * 2);
//!
//! counter.increment(5)?;
//! assert_eq!(doubled.get(), 10);
//!
//! assert!(counter.undo()?);
//! assert_eq!(counter.get(), 0);
//! assert_eq!(doubled.get(), 0);
//! # Ok::<(), statecell::StateError>(())
//! ```

pub mod cell;
pub mod compose;
pub mod error;
pub mod registry;
pub mod timeline;

pub use cell::{Mutation, StateCell};
pub use compose::{join2, join3};
pub use error::StateError;
pub use registry::{SubId, Subscription, Unsubscriber};
pub use timeline::DEFAULT_MAX_HISTORY;
