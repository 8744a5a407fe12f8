//! Error taxonomy for state cell misuse.
//!
//! Every variant is a programmer error, not a recoverable runtime
//! condition: retrying the same call can never succeed, so callers are
//! expected to fail fast (typically with `?` up to a panic boundary).

use thiserror::Error;

/// Errors raised by [`StateCell`](crate::StateCell) mutators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A mutator was called on a read-only cell (one produced by
    /// `select`/`join`). Derived cells can only be written by the engine
    /// that owns them.
    #[error("cannot mutate a read-only state cell")]
    ReadOnly,

    /// `dispatch` was called on a cell that has no reducer attached.
    #[error("dispatch called on a state cell without a reducer")]
    NoReducer,

    /// `dispatch` was called with an action of a different type than the
    /// attached reducer accepts.
    #[error("action type mismatch: the attached reducer expects `{expected}`")]
    ActionType {
        /// Type name the reducer was attached with.
        expected: &'static str,
    },
}
