//! Moves and the incremental scoring seam of the annealer.

use crate::alignment::Alignment;

/// An atomic change to an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Exchange the images of two G1 nodes.
    Swap { a: usize, b: usize },
    /// Move a G1 node onto a currently unassigned G2 node.
    Reassign { node: usize, target: usize },
}

impl Move {
    /// Applies the move to `alignment`.
    pub fn apply(&self, alignment: &mut Alignment) {
        match *self {
            Move::Swap { a, b } => alignment.swap(a, b),
            Move::Reassign { node, target } => {
                alignment.reassign(node, target);
            }
        }
    }
}

/// Scores alignments incrementally.
///
/// The annealer keeps a `State` next to the current alignment, asks for the
/// score change of each proposed move, and only folds the change into the
/// state when the move is accepted. Implementations must keep
/// `score(state)` equal (within floating tolerance) to a from-scratch
/// evaluation of the alignment the state was built for.
///
/// Higher scores are better.
pub trait MoveScorer: Send + Sync {
    /// Incremental bookkeeping for one alignment.
    type State: Clone + Send;

    /// The pending effect of one move, reused across proposals.
    type Delta: Default + Send;

    /// Builds the state for `alignment` from scratch.
    fn initial_state(&self, alignment: &Alignment) -> Self::State;

    /// Current score of the state.
    fn score(&self, state: &Self::State) -> f64;

    /// Computes the effect of `mv` on the (not yet modified) `alignment`,
    /// writes it into `delta` and returns the score change.
    fn evaluate_delta(
        &self,
        state: &Self::State,
        alignment: &Alignment,
        mv: &Move,
        delta: &mut Self::Delta,
    ) -> f64;

    /// Folds an accepted delta into the state.
    fn apply_delta(&self, state: &mut Self::State, delta: &Self::Delta);
}
