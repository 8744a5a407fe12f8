//! Subscriber bookkeeping with deferred removal.
//!
//! The registry keeps subscribers in insertion order (which is also the
//! broadcast order) and never mutates that list while a broadcast is in
//! flight. Removal requests — from a dropped [`Subscription`], an
//! [`Unsubscriber`] invoked inside a callback, or an explicit id — are
//! queued and flushed immediately before the *next* broadcast begins.
//! This two-phase mark/flush pattern is what makes unsubscribing from
//! inside a notification callback safe.
//!
//! # Invariants
//!
//! 1. Broadcast order is registration order.
//! 2. A callback that requests unsubscription during a broadcast still
//!    receives that broadcast in full and none after it.
//! 3. Queuing an id any number of times removes it exactly once on the
//!    next flush; queuing an unknown id is a no-op.
//! 4. Ids are keys, not registrations: removing an id removes every
//!    callback registered under it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Identifier for a subscription.
///
/// Auto ids are allocated from a per-registry counter; named ids let the
/// caller unsubscribe later without holding the [`Subscription`] guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubId {
    /// Allocated by the registry.
    Auto(u64),
    /// Supplied by the caller.
    Named(String),
}

impl From<&str> for SubId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for SubId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl std::fmt::Display for SubId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto(n) => write!(f, "#{n}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

pub(crate) type Subscriber<T> = Rc<dyn Fn(&T, &Unsubscriber)>;

/// Shared queue of ids awaiting removal.
type PendingQueue = Rc<RefCell<Vec<SubId>>>;

/// Handle passed to every callback so it can unsubscribe itself.
///
/// Requests are deferred: the callback keeps receiving the broadcast it
/// is currently in, and is dropped before the next one.
pub struct Unsubscriber {
    id: SubId,
    pending: Weak<RefCell<Vec<SubId>>>,
}

impl Unsubscriber {
    pub(crate) fn new(id: SubId, pending: Weak<RefCell<Vec<SubId>>>) -> Self {
        Self { id, pending }
    }

    /// Queue this subscription for removal before the next broadcast.
    pub fn unsubscribe(&self) {
        if let Some(pending) = self.pending.upgrade() {
            pending.borrow_mut().push(self.id.clone());
        }
    }

    /// Id of the subscription this handle belongs to.
    #[must_use]
    pub fn id(&self) -> &SubId {
        &self.id
    }
}

/// RAII guard for an active subscription.
///
/// Dropping the guard queues the subscription for removal. Call
/// [`detach`](Subscription::detach) to keep the registration alive and
/// manage it later by id.
#[must_use = "dropping a Subscription unsubscribes; call detach() to keep it alive"]
pub struct Subscription {
    id: SubId,
    pending: Weak<RefCell<Vec<SubId>>>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(id: SubId, pending: Weak<RefCell<Vec<SubId>>>) -> Self {
        Self {
            id,
            pending,
            detached: false,
        }
    }

    /// Id this subscription was registered under.
    #[must_use]
    pub fn id(&self) -> &SubId {
        &self.id
    }

    /// Queue removal now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}

    /// Keep the registration alive past this guard's lifetime and return
    /// its id for later [`StateCell::unsubscribe`](crate::StateCell::unsubscribe).
    pub fn detach(mut self) -> SubId {
        self.detached = true;
        self.id.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(pending) = self.pending.upgrade() {
            pending.borrow_mut().push(self.id.clone());
        }
    }
}

/// Ordered subscriber list plus the deferred-removal queue.
pub(crate) struct SubscriberRegistry<T> {
    subscribers: Vec<(SubId, Subscriber<T>)>,
    pending: PendingQueue,
    next_auto: u64,
}

impl<T> SubscriberRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            pending: Rc::new(RefCell::new(Vec::new())),
            next_auto: 0,
        }
    }

    pub(crate) fn fresh_id(&mut self) -> SubId {
        let id = SubId::Auto(self.next_auto);
        self.next_auto += 1;
        id
    }

    pub(crate) fn insert(&mut self, id: SubId, subscriber: Subscriber<T>) {
        self.subscribers.push((id, subscriber));
    }

    /// Queue an id for removal on the next flush. Unknown ids are fine.
    pub(crate) fn queue_removal(&self, id: SubId) {
        self.pending.borrow_mut().push(id);
    }

    /// Apply all queued removals. Called immediately before a broadcast,
    /// never during one.
    pub(crate) fn flush(&mut self) {
        let queued = std::mem::take(&mut *self.pending.borrow_mut());
        if queued.is_empty() {
            return;
        }
        self.subscribers.retain(|(id, _)| !queued.contains(id));
    }

    /// Clone out the subscriber list so callbacks can be invoked without
    /// borrowing the registry (callbacks may re-enter it).
    pub(crate) fn snapshot(&self) -> Vec<(SubId, Subscriber<T>)> {
        self.subscribers
            .iter()
            .map(|(id, subscriber)| (id.clone(), Rc::clone(subscriber)))
            .collect()
    }

    pub(crate) fn pending_handle(&self) -> Weak<RefCell<Vec<SubId>>> {
        Rc::downgrade(&self.pending)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}
