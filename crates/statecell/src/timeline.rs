//! Bounded linear undo log backing every state cell.
//!
//! A [`Timeline`] holds the cell's initial value, a bounded history of
//! past values, and a cursor marking the current one. It is a classic
//! linear undo log, not a tree: pushing while "in the past" discards the
//! redo tail.
//!
//! # Invariants
//!
//! 1. `history[cursor]` is always the current value; the cursor is always
//!    in bounds.
//! 2. `can_undo() ⇔ cursor > 0` and `can_redo() ⇔ cursor < len - 1`.
//! 3. A push while `can_redo()` truncates every entry after the cursor
//!    before appending.
//! 4. When a push would exceed `max_entries`, the oldest entry is dropped
//!    and the cursor stays on the same logical "latest" slot; otherwise
//!    the cursor advances by one.
//!
//! Read-only policy lives a layer up in [`StateCell`](crate::StateCell):
//! the timeline itself is always writable so the derivation and join
//! engines can reuse it while enforcing read-only above it.

use std::collections::VecDeque;

/// Default number of history entries retained per cell.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Current value plus bounded undo/redo history.
#[derive(Debug, Clone)]
pub(crate) struct Timeline<T> {
    /// Value the cell was constructed with. Never replaced.
    initial: T,
    /// Retained values, oldest first. Never empty.
    entries: VecDeque<T>,
    /// Index of the current value within `entries`.
    cursor: usize,
    /// History bound; at least 1.
    max_entries: usize,
}

impl<T> Timeline<T> {
    pub(crate) fn new(initial: T, max_entries: usize) -> Self
    where
        T: Clone,
    {
        let mut entries = VecDeque::with_capacity(max_entries.max(1));
        entries.push_back(initial.clone());
        Self {
            initial,
            entries,
            cursor: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub(crate) fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub(crate) fn initial(&self) -> &T {
        &self.initial
    }

    pub(crate) fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub(crate) fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Append a new current value, discarding any redo tail and evicting
    /// the oldest entry once the bound is reached.
    ///
    /// Equality with the current value is checked by the caller; the
    /// timeline records whatever it is given.
    pub(crate) fn push(&mut self, value: T) {
        if self.can_redo() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(value);
        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        } else {
            self.cursor += 1;
        }
    }

    /// Move the cursor one step back. Returns whether a move happened.
    pub(crate) fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Move the cursor one step forward. Returns whether a move happened.
    pub(crate) fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial() {
        let t = Timeline::new(7, DEFAULT_MAX_HISTORY);
        assert_eq!(*t.current(), 7);
        assert_eq!(*t.initial(), 7);
        assert!(!t.can_undo());
        assert!(!t.can_redo());
    }

    #[test]
    fn push_advances_cursor() {
        let mut t = Timeline::new(0, DEFAULT_MAX_HISTORY);
        t.push(1);
        t.push(2);
        assert_eq!(*t.current(), 2);
        assert!(t.can_undo());
        assert!(!t.can_redo());
    }

    #[test]
    fn undo_walks_back_to_initial() {
        let mut t = Timeline::new(0, DEFAULT_MAX_HISTORY);
        for i in 1..=4 {
            t.push(i);
        }
        for expected in (0..4).rev() {
            assert!(t.undo());
            assert_eq!(*t.current(), expected);
        }
        assert!(!t.undo());
        assert_eq!(*t.current(), 0);
    }

    #[test]
    fn redo_replays_forward() {
        let mut t = Timeline::new(0, DEFAULT_MAX_HISTORY);
        t.push(1);
        t.push(2);
        assert!(t.undo());
        assert!(t.undo());
        assert!(t.redo());
        assert_eq!(*t.current(), 1);
        assert!(t.redo());
        assert_eq!(*t.current(), 2);
        assert!(!t.redo());
    }

    #[test]
    fn push_truncates_redo_tail() {
        let mut t = Timeline::new(0, DEFAULT_MAX_HISTORY);
        t.push(1);
        t.push(2);
        assert!(t.undo());
        t.push(9);
        assert_eq!(*t.current(), 9);
        assert!(!t.can_redo());
        // 0, 1, 9
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn bound_drops_oldest_without_advancing_cursor() {
        let mut t = Timeline::new(0, 3);
        t.push(1);
        t.push(2);
        assert_eq!(t.len(), 3);
        t.push(3);
        // 0 evicted; cursor still points at the latest slot.
        assert_eq!(t.len(), 3);
        assert_eq!(*t.current(), 3);
        assert!(t.undo());
        assert_eq!(*t.current(), 2);
        assert!(t.undo());
        assert_eq!(*t.current(), 1);
        assert!(!t.undo());
    }

    #[test]
    fn zero_bound_is_clamped_to_one() {
        let mut t = Timeline::new(0, 0);
        t.push(1);
        assert_eq!(*t.current(), 1);
        assert_eq!(t.len(), 1);
        assert!(!t.can_undo());
    }
}
