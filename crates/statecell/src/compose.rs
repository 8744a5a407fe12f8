//! Derived projections and N-ary joins.
//!
//! Both engines produce ordinary read-only [`StateCell`]s driven by a
//! single internal subscription per source, so composition nests
//! arbitrarily: a join of projections, a projection of a join, and so
//! on. The engines write through the internal force-apply path, which
//! is what lets them update a cell whose public mutators are locked.
//!
//! # Invariants
//!
//! 1. A derived cell's value is always `selector(v)` for some value `v`
//!    the source held, starting with the source's value at creation
//!    time (eager initialization — there is no placeholder state).
//! 2. A derived cell re-broadcasts only when the new projection differs
//!    from the previous one under the supplied equality.
//! 3. A joined cell's element order always matches the order the
//!    sources were passed in, never the order they last changed in.
//!
//! # Failure Modes
//!
//! - **Source dropped**: the internal callback holds only weak
//!   references; once an upstream cell is gone the subscription
//!   unsubscribes itself and the derived cell retains its last value.
//!   (While the derived cell itself is alive it keeps its sources
//!   alive, so this only happens to detached handles.)

use std::rc::Rc;

use crate::cell::{Mutation, StateCell};
use crate::registry::Unsubscriber;

impl<T: Clone + 'static> StateCell<T> {
    /// Read-only cell tracking `selector(source)`, re-broadcasting only
    /// when the projection changes under `PartialEq`.
    pub fn select<U>(&self, selector: impl Fn(&T) -> U + 'static) -> StateCell<U>
    where
        U: Clone + PartialEq + 'static,
    {
        self.select_with(selector, |a, b| a == b)
    }

    /// [`select`](StateCell::select) with a caller-supplied equality.
    ///
    /// The equality function is the suppression lever: a selector that
    /// rebuilds an equal-but-new aggregate will not re-broadcast as long
    /// as `equal` recognizes the two as the same.
    pub fn select_with<U: Clone + 'static>(
        &self,
        selector: impl Fn(&T) -> U + 'static,
        equal: impl Fn(&U, &U) -> bool + 'static,
    ) -> StateCell<U> {
        let initial = self.with(|v| selector(v));
        let derived = StateCell::read_only_with_eq(initial, Rc::new(equal));

        let weak = derived.downgrade();
        let sub = self.subscribe(move |value, unsub| {
            let Some(inner) = weak.upgrade() else {
                unsub.unsubscribe();
                return;
            };
            let projected = selector(value);
            StateCell::from_inner(inner).force_apply(Mutation::Value(projected));
        });

        derived.retain_upstream(Box::new(sub));
        derived.retain_upstream(Box::new(self.clone()));
        derived
    }
}

impl<T: Clone + PartialEq + 'static> StateCell<T> {
    /// Read-only cell whose value is the ordered sequence of the
    /// sources' values, re-broadcasting only when that sequence changes
    /// element-wise.
    pub fn join(sources: &[StateCell<T>]) -> StateCell<Vec<T>> {
        let initial: Vec<T> = sources.iter().map(StateCell::get).collect();
        let joined =
            StateCell::read_only_with_eq(initial, Rc::new(|a: &Vec<T>, b: &Vec<T>| a == b));

        let weak_joined = joined.downgrade();
        let weak_sources: Vec<_> = sources.iter().map(StateCell::downgrade).collect();
        for source in sources {
            let weak_joined = weak_joined.clone();
            let weak_sources = weak_sources.clone();
            let sub = source.subscribe(move |_, unsub| {
                let Some(joined_inner) = weak_joined.upgrade() else {
                    unsub.unsubscribe();
                    return;
                };
                let mut latest = Vec::with_capacity(weak_sources.len());
                for weak in &weak_sources {
                    let Some(source_inner) = weak.upgrade() else {
                        return;
                    };
                    latest.push(StateCell::from_inner(source_inner).get());
                }
                StateCell::from_inner(joined_inner).force_apply(Mutation::Value(latest));
            });
            joined.retain_upstream(Box::new(sub));
            joined.retain_upstream(Box::new(source.clone()));
        }
        joined
    }
}

/// Join two cells of different value types into a read-only pair cell.
pub fn join2<A, B>(a: &StateCell<A>, b: &StateCell<B>) -> StateCell<(A, B)>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
{
    let joined =
        StateCell::read_only_with_eq((a.get(), b.get()), Rc::new(|x: &(A, B), y: &(A, B)| x == y));

    let recompute: Rc<dyn Fn(&Unsubscriber)> = {
        let weak_joined = joined.downgrade();
        let weak_a = a.downgrade();
        let weak_b = b.downgrade();
        Rc::new(move |unsub| {
            let Some(joined_inner) = weak_joined.upgrade() else {
                unsub.unsubscribe();
                return;
            };
            let (Some(inner_a), Some(inner_b)) = (weak_a.upgrade(), weak_b.upgrade()) else {
                return;
            };
            let latest = (
                StateCell::from_inner(inner_a).get(),
                StateCell::from_inner(inner_b).get(),
            );
            StateCell::from_inner(joined_inner).force_apply(Mutation::Value(latest));
        })
    };

    let hook_a = Rc::clone(&recompute);
    joined.retain_upstream(Box::new(a.subscribe(move |_, unsub| hook_a(unsub))));
    let hook_b = Rc::clone(&recompute);
    joined.retain_upstream(Box::new(b.subscribe(move |_, unsub| hook_b(unsub))));
    joined.retain_upstream(Box::new(a.clone()));
    joined.retain_upstream(Box::new(b.clone()));
    joined
}

/// Join three cells of different value types into a read-only triple
/// cell.
pub fn join3<A, B, C>(a: &StateCell<A>, b: &StateCell<B>, c: &StateCell<C>) -> StateCell<(A, B, C)>
where
    A: Clone + PartialEq + 'static,
    B: Clone + PartialEq + 'static,
    C: Clone + PartialEq + 'static,
{
    let joined = StateCell::read_only_with_eq(
        (a.get(), b.get(), c.get()),
        Rc::new(|x: &(A, B, C), y: &(A, B, C)| x == y),
    );

    let recompute: Rc<dyn Fn(&Unsubscriber)> = {
        let weak_joined = joined.downgrade();
        let weak_a = a.downgrade();
        let weak_b = b.downgrade();
        let weak_c = c.downgrade();
        Rc::new(move |unsub| {
            let Some(joined_inner) = weak_joined.upgrade() else {
                unsub.unsubscribe();
                return;
            };
            let (Some(inner_a), Some(inner_b), Some(inner_c)) =
                (weak_a.upgrade(), weak_b.upgrade(), weak_c.upgrade())
            else {
                return;
            };
            let latest = (
                StateCell::from_inner(inner_a).get(),
                StateCell::from_inner(inner_b).get(),
                StateCell::from_inner(inner_c).get(),
            );
            StateCell::from_inner(joined_inner).force_apply(Mutation::Value(latest));
        })
    };

    let hook_a = Rc::clone(&recompute);
    joined.retain_upstream(Box::new(a.subscribe(move |_, unsub| hook_a(unsub))));
    let hook_b = Rc::clone(&recompute);
    joined.retain_upstream(Box::new(b.subscribe(move |_, unsub| hook_b(unsub))));
    let hook_c = Rc::clone(&recompute);
    joined.retain_upstream(Box::new(c.subscribe(move |_, unsub| hook_c(unsub))));
    joined.retain_upstream(Box::new(a.clone()));
    joined.retain_upstream(Box::new(b.clone()));
    joined.retain_upstream(Box::new(c.clone()));
    joined
}
