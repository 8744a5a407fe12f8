//! The public observable cell.
//!
//! [`StateCell<T>`] composes one [`Timeline`] (current value + bounded
//! undo history) with one [`SubscriberRegistry`] (ordered observers with
//! deferred removal) behind a cheaply clonable `Rc<RefCell<..>>` handle.
//! Cloning the handle aliases the same cell.
//!
//! Every successful mutation broadcasts synchronously, in-call, before
//! the mutator returns; there is no batching or deferral. Callbacks may
//! re-enter the cell (read it, mutate other cells, subscribe,
//! unsubscribe) — the registry snapshot and deferred-removal queue keep
//! iteration stable. A callback that sets its *own* source cell during
//! its own broadcast recurses; bounding that is the caller's job.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Setting a value equal (under the cell's equality) to the current
//!    value is a no-op: no history entry, no broadcast.
//! 3. `subscribe` invokes the callback synchronously once with the
//!    current value before returning.
//! 4. Read-only cells (from `select`/`join`) reject every public mutator
//!    with [`StateError::ReadOnly`]; the engines write through the
//!    internal force-apply path instead.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::ops::Add;
use std::rc::{Rc, Weak};

use crate::error::StateError;
use crate::registry::{SubId, Subscriber, SubscriberRegistry, Subscription, Unsubscriber};
use crate::timeline::{DEFAULT_MAX_HISTORY, Timeline};

/// A next value for a cell: either a literal or a pure transform of the
/// current value.
pub enum Mutation<T: 'static> {
    /// Use this value as-is.
    Value(T),
    /// Compute the next value from the current one.
    Compute(Box<dyn FnOnce(&T) -> T>),
}

impl<T: 'static> Mutation<T> {
    /// Build the transform arm from a closure.
    pub fn compute(f: impl FnOnce(&T) -> T + 'static) -> Self {
        Self::Compute(Box::new(f))
    }

    fn resolve(self, current: &T) -> T {
        match self {
            Self::Value(value) => value,
            Self::Compute(f) => f(current),
        }
    }
}

impl<T: 'static> From<T> for Mutation<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: 'static> fmt::Debug for Mutation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Mutation::Value(..)"),
            Self::Compute(_) => f.write_str("Mutation::Compute(..)"),
        }
    }
}

/// Reducer stored type-erased; the action is downcast back to the type
/// it was attached with.
pub(crate) type Reducer<T> = Rc<dyn Fn(&T, Box<dyn Any>) -> Result<T, StateError>>;

pub(crate) struct Inner<T: 'static> {
    pub(crate) timeline: Timeline<T>,
    pub(crate) registry: SubscriberRegistry<T>,
    /// Equality used for the set no-op check and re-broadcast gating.
    /// `PartialEq` for primary cells; caller-supplied for derived ones.
    pub(crate) eq: Rc<dyn Fn(&T, &T) -> bool>,
    pub(crate) reducer: Option<Reducer<T>>,
    pub(crate) read_only: bool,
    /// Keeps upstream cells and internal subscription guards alive for
    /// derived and joined cells.
    pub(crate) upstream: Vec<Box<dyn Any>>,
}

/// Observable value cell with bounded undo/redo history.
///
/// See the [crate docs](crate) for the full contract.
pub struct StateCell<T: 'static> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: 'static> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StateCell")
            .field("value", inner.timeline.current())
            .field("read_only", &inner.read_only)
            .field("history_len", &inner.timeline.len())
            .field("subscribers", &inner.registry.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> StateCell<T> {
    /// Create a writable cell with the default history bound.
    pub fn new(initial: T) -> Self {
        Self::with_max_history(initial, DEFAULT_MAX_HISTORY)
    }

    /// Create a writable cell retaining at most `max_history` values
    /// (clamped to at least 1).
    pub fn with_max_history(initial: T, max_history: usize) -> Self {
        Self::construct(initial, max_history, Rc::new(|a: &T, b: &T| a == b), false)
    }

    /// Create a writable cell with a reducer attached for
    /// [`dispatch`](StateCell::dispatch).
    pub fn with_reducer<A: 'static>(initial: T, reducer: impl Fn(&T, A) -> T + 'static) -> Self {
        let cell = Self::new(initial);
        cell.set_reducer(reducer);
        cell
    }
}

impl<T: Clone + 'static> StateCell<T> {
    fn construct(
        initial: T,
        max_history: usize,
        eq: Rc<dyn Fn(&T, &T) -> bool>,
        read_only: bool,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                timeline: Timeline::new(initial, max_history),
                registry: SubscriberRegistry::new(),
                eq,
                reducer: None,
                read_only,
                upstream: Vec::new(),
            })),
        }
    }

    /// Read-only cell used by the derivation and join engines. The
    /// engine writes through [`force_apply`](StateCell::force_apply).
    pub(crate) fn read_only_with_eq(initial: T, eq: Rc<dyn Fn(&T, &T) -> bool>) -> Self {
        Self::construct(initial, DEFAULT_MAX_HISTORY, eq, true)
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<Inner<T>>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<Inner<T>>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn retain_upstream(&self, item: Box<dyn Any>) {
        self.inner.borrow_mut().upstream.push(item);
    }

    /// Current value, cloned out.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().timeline.current().clone()
    }

    /// Borrowed access to the current value, without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure mutates this cell (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.inner.borrow().timeline.current())
    }

    /// The value this cell was constructed with.
    #[must_use]
    pub fn initial(&self) -> T {
        self.inner.borrow().timeline.initial().clone()
    }

    /// Whether this cell rejects external mutation (`select`/`join`
    /// results do).
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.borrow().read_only
    }

    /// Whether `undo` would move. Always false on read-only cells.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.read_only && inner.timeline.can_undo()
    }

    /// Whether `redo` would move. Always false on read-only cells.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.read_only && inner.timeline.can_redo()
    }

    /// Number of values currently retained in history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.borrow().timeline.len()
    }

    /// Configured history bound.
    #[must_use]
    pub fn max_history(&self) -> usize {
        self.inner.borrow().timeline.max_entries()
    }

    /// Set the next value, either literally or via a transform:
    /// `cell.set(5)` or `cell.set(Mutation::compute(|v| v + 1))`.
    ///
    /// Setting a value equal to the current one (under the cell's
    /// equality) is a no-op: no history entry, no broadcast.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn set(&self, value: impl Into<Mutation<T>>) -> Result<(), StateError> {
        self.check_writable()?;
        self.force_apply(value.into());
        Ok(())
    }

    /// Sugar for `set(Mutation::compute(f))`.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn set_with(&self, f: impl FnOnce(&T) -> T + 'static) -> Result<(), StateError> {
        self.set(Mutation::compute(f))
    }

    /// Set back to the initial value, subject to the same no-op check
    /// as `set`.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn reset(&self) -> Result<(), StateError> {
        self.check_writable()?;
        let initial = self.initial();
        self.force_apply(Mutation::Value(initial));
        Ok(())
    }

    /// Step the history cursor back one value. Returns whether a move
    /// happened; if it did, subscribers are broadcast the newly-current
    /// value.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn undo(&self) -> Result<bool, StateError> {
        let moved = {
            let mut inner = self.inner.borrow_mut();
            if inner.read_only {
                return Err(StateError::ReadOnly);
            }
            inner.timeline.undo()
        };
        if moved {
            tracing::debug!("undo");
            self.broadcast();
        }
        Ok(moved)
    }

    /// Step the history cursor forward one value. Returns whether a
    /// move happened; if it did, subscribers are broadcast the
    /// newly-current value.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn redo(&self) -> Result<bool, StateError> {
        let moved = {
            let mut inner = self.inner.borrow_mut();
            if inner.read_only {
                return Err(StateError::ReadOnly);
            }
            inner.timeline.redo()
        };
        if moved {
            tracing::debug!("redo");
            self.broadcast();
        }
        Ok(moved)
    }

    /// Attach (or replace) the reducer used by `dispatch`. The action
    /// type is fixed here; dispatching any other type is an error.
    pub fn set_reducer<A: 'static>(&self, reducer: impl Fn(&T, A) -> T + 'static) {
        self.inner.borrow_mut().reducer = Some(Rc::new(move |current, action: Box<dyn Any>| {
            match action.downcast::<A>() {
                Ok(action) => Ok(reducer(current, *action)),
                Err(_) => Err(StateError::ActionType {
                    expected: std::any::type_name::<A>(),
                }),
            }
        }));
    }

    /// Run the attached reducer over the current value and the action,
    /// then set the result (subject to the usual no-op check).
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell,
    /// [`StateError::NoReducer`] if none is attached, and
    /// [`StateError::ActionType`] if `A` differs from the type the
    /// reducer was attached with.
    pub fn dispatch<A: 'static>(&self, action: A) -> Result<(), StateError> {
        let (reducer, current) = {
            let inner = self.inner.borrow();
            if inner.read_only {
                return Err(StateError::ReadOnly);
            }
            let reducer = inner.reducer.clone().ok_or(StateError::NoReducer)?;
            (reducer, inner.timeline.current().clone())
        };
        let next = reducer(&current, Box::new(action))?;
        self.force_apply(Mutation::Value(next));
        Ok(())
    }

    /// Register an observer under a fresh id.
    ///
    /// The callback is invoked synchronously once with the current value
    /// before this returns (no missed initial state), and thereafter on
    /// every broadcast, in registration order. The second argument lets
    /// the callback unsubscribe itself; removal is deferred to just
    /// before the next broadcast.
    pub fn subscribe(&self, callback: impl Fn(&T, &Unsubscriber) + 'static) -> Subscription {
        let id = self.inner.borrow_mut().registry.fresh_id();
        self.subscribe_as(id, callback)
    }

    /// Register an observer under a caller-chosen id, for later id-based
    /// [`unsubscribe`](StateCell::unsubscribe). Ids are keys: every
    /// registration under an id is removed together.
    pub fn subscribe_as(
        &self,
        id: impl Into<SubId>,
        callback: impl Fn(&T, &Unsubscriber) + 'static,
    ) -> Subscription {
        let id = id.into();
        let subscriber: Subscriber<T> = Rc::new(callback);
        let (current, pending) = {
            let mut inner = self.inner.borrow_mut();
            inner.registry.insert(id.clone(), Rc::clone(&subscriber));
            (
                inner.timeline.current().clone(),
                inner.registry.pending_handle(),
            )
        };
        // Replay the current value before returning.
        subscriber(&current, &Unsubscriber::new(id.clone(), pending.clone()));
        Subscription::new(id, pending)
    }

    /// Queue the given ids for removal before the next broadcast.
    /// Unknown ids are ignored.
    pub fn unsubscribe<I>(&self, ids: impl IntoIterator<Item = I>)
    where
        I: Into<SubId>,
    {
        let inner = self.inner.borrow();
        for id in ids {
            inner.registry.queue_removal(id.into());
        }
    }

    /// Apply a mutation regardless of the read-only flag. This is the
    /// write path the derivation and join engines use; public mutators
    /// funnel here after their checks. Returns whether the value
    /// changed (and was broadcast).
    pub(crate) fn force_apply(&self, mutation: Mutation<T>) -> bool {
        let (current, eq) = {
            let inner = self.inner.borrow();
            (inner.timeline.current().clone(), Rc::clone(&inner.eq))
        };
        let next = mutation.resolve(&current);
        if eq(&current, &next) {
            return false;
        }
        self.inner.borrow_mut().timeline.push(next);
        self.broadcast();
        true
    }

    /// Flush queued removals, then notify every remaining subscriber
    /// with the current value, in registration order.
    fn broadcast(&self) {
        let (value, batch, pending) = {
            let mut inner = self.inner.borrow_mut();
            inner.registry.flush();
            (
                inner.timeline.current().clone(),
                inner.registry.snapshot(),
                inner.registry.pending_handle(),
            )
        };
        tracing::trace!(subscribers = batch.len(), "broadcast");
        for (id, subscriber) in batch {
            subscriber(&value, &Unsubscriber::new(id, pending.clone()));
        }
    }

    fn check_writable(&self) -> Result<(), StateError> {
        if self.inner.borrow().read_only {
            Err(StateError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl StateCell<bool> {
    /// Flip the current boolean.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn toggle(&self) -> Result<(), StateError> {
        self.set(Mutation::compute(|v: &bool| !*v))
    }
}

impl<T> StateCell<T>
where
    T: Clone + Add<Output = T> + 'static,
{
    /// Add `amount` to the current value.
    ///
    /// # Errors
    ///
    /// [`StateError::ReadOnly`] on a derived or joined cell.
    pub fn increment(&self, amount: T) -> Result<(), StateError> {
        self.set(Mutation::compute(move |v: &T| v.clone() + amount))
    }
}
