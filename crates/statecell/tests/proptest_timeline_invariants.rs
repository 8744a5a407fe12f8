//! Property-based invariant tests for the bounded undo log and the
//! broadcast contract, driven through the public `StateCell` API.
//!
//! Verifies, for arbitrary operation sequences:
//!
//! 1. `get()` always matches an independent reference model
//! 2. `can_undo`/`can_redo` always match the model
//! 3. `history_len()` never exceeds the configured bound
//! 4. Broadcast count equals the number of value-changing operations
//!    (equal sets and failed undo/redo are silent)
//! 5. After `k < max` distinct sets, exactly `k` undos succeed and land
//!    on the initial value
//! 6. A set after undo truncates the redo tail
//! 7. A joined cell always equals the element-wise gets of its sources

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use statecell::StateCell;

// ── Reference model ──────────────────────────────────────────────────

/// Straight-line reimplementation of the spec'd history semantics,
/// used as an oracle.
struct Model {
    history: Vec<i32>,
    cursor: usize,
    max: usize,
}

impl Model {
    fn new(initial: i32, max: usize) -> Self {
        Self {
            history: vec![initial],
            cursor: 0,
            max,
        }
    }

    fn current(&self) -> i32 {
        self.history[self.cursor]
    }

    fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Returns whether the value changed (a broadcast happened).
    fn set(&mut self, value: i32) -> bool {
        if value == self.current() {
            return false;
        }
        self.history.truncate(self.cursor + 1);
        self.history.push(value);
        if self.history.len() > self.max {
            self.history.remove(0);
        } else {
            self.cursor += 1;
        }
        true
    }

    fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Set(i32),
    Undo,
    Redo,
    Reset,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        // Small range so equal-value sets actually occur.
        (0..8i32).prop_map(Op::Set),
        Just(Op::Undo),
        Just(Op::Redo),
        Just(Op::Reset),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(), 0..=60)
}

// ═════════════════════════════════════════════════════════════════════════
// 1.-4. Cell agrees with the model; broadcasts only on change
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn matches_reference_model(ops in arb_ops(), max in 1usize..=6) {
        let initial = 0;
        let cell = StateCell::with_max_history(initial, max);
        let mut model = Model::new(initial, max);

        let broadcasts = Rc::new(Cell::new(0u32));
        let sink = Rc::clone(&broadcasts);
        cell.subscribe(move |_, _| sink.set(sink.get() + 1)).detach();
        let mut expected_broadcasts = 1; // replay on subscribe

        for op in ops {
            match op {
                Op::Set(v) => {
                    cell.set(v).unwrap();
                    if model.set(v) {
                        expected_broadcasts += 1;
                    }
                }
                Op::Undo => {
                    let moved = cell.undo().unwrap();
                    prop_assert_eq!(moved, model.undo());
                    if moved {
                        expected_broadcasts += 1;
                    }
                }
                Op::Redo => {
                    let moved = cell.redo().unwrap();
                    prop_assert_eq!(moved, model.redo());
                    if moved {
                        expected_broadcasts += 1;
                    }
                }
                Op::Reset => {
                    cell.reset().unwrap();
                    if model.set(initial) {
                        expected_broadcasts += 1;
                    }
                }
            }
            prop_assert_eq!(cell.get(), model.current());
            prop_assert_eq!(cell.can_undo(), model.can_undo());
            prop_assert_eq!(cell.can_redo(), model.can_redo());
            prop_assert!(cell.history_len() <= max);
            prop_assert_eq!(broadcasts.get(), expected_broadcasts);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. k distinct sets under the bound -> k undos back to the initial value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn undo_walks_back_to_initial(k in 1usize..=9) {
        let cell = StateCell::new(0);
        for i in 1..=k {
            cell.set(i as i32).unwrap();
        }
        for _ in 0..k {
            prop_assert!(cell.undo().unwrap());
        }
        prop_assert_eq!(cell.get(), 0);
        prop_assert!(!cell.undo().unwrap());
        prop_assert_eq!(cell.get(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Redo tail is gone after a fresh set
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_after_undo_truncates_redo(undos in 1usize..=4) {
        let cell = StateCell::new(0);
        for i in 1..=5 {
            cell.set(i).unwrap();
        }
        for _ in 0..undos {
            prop_assert!(cell.undo().unwrap());
        }
        cell.set(99).unwrap();
        prop_assert!(!cell.can_redo());
        prop_assert!(!cell.redo().unwrap());
        prop_assert_eq!(cell.get(), 99);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Joined value always equals element-wise source gets
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn join_is_consistent_with_sources(
        updates in proptest::collection::vec((0usize..3, any::<i16>()), 0..=40)
    ) {
        let sources = [StateCell::new(0i32), StateCell::new(0), StateCell::new(0)];
        let joined = StateCell::join(&sources);

        for (index, value) in updates {
            sources[index].set(i32::from(value)).unwrap();
            let expected: Vec<i32> = sources.iter().map(StateCell::get).collect();
            prop_assert_eq!(joined.get(), expected);
        }
    }
}
