//! Game-tree abstraction: the history cursor and the game-definition trait.
//!
//! The engine never sees a concrete game. It walks an abstract tree through
//! [`GameTree`], which a game definition implements by describing its
//! decision metadata and by mapping a *cursor* (the path of chosen actions
//! from the root) to a [`GameNode`].
//!
//! Branching comes in two flavors with identical results:
//!
//! - [`GameTree::branch`] allocates a child cursor and leaves the parent
//!   untouched. Parallel fan-out always uses this path.
//! - [`GameTree::switch_to_branch`] mutates the cursor in place and returns
//!   an undo token; [`GameTree::reverse`] consumes the token and restores
//!   the parent's view. This exists purely to avoid reallocation in the
//!   sequential hot path.

use crate::engine::node::GameNode;

/// A game definition, supplied by the caller and consumed by every
/// traversal in the engine.
///
/// Implementations must be cheap to query: `node` is called once per visited
/// tree position on every iteration.
pub trait GameTree: Send + Sync {
    /// Ephemeral pointer into the tree; owns the path of chosen actions.
    /// Parallel fan-out shares a borrowed parent cursor across branches.
    type Cursor: Clone + Send + Sync;

    /// Token capturing how to undo one in-place branch.
    type Undo;

    /// Number of non-chance players.
    fn num_players(&self) -> usize;

    /// Total number of decision points (chance and player decisions).
    /// Accumulator records are indexed `0..num_decisions`.
    fn num_decisions(&self) -> usize;

    /// Action count of a decision point.
    fn action_count(&self, decision: usize) -> u8;

    /// Cursor at the root of the tree.
    fn root(&self) -> Self::Cursor;

    /// The node the cursor currently points at. Terminal detection is the
    /// node kind; no separate call exists.
    fn node(&self, cursor: &Self::Cursor) -> GameNode;

    /// Mutate the cursor into the child reached by `action`, returning the
    /// undo token that restores it.
    fn switch_to_branch(&self, cursor: &mut Self::Cursor, action: u8) -> Self::Undo;

    /// Undo the matching [`switch_to_branch`](Self::switch_to_branch),
    /// restoring the cursor to an observationally equal parent view.
    fn reverse(&self, cursor: &mut Self::Cursor, undo: Self::Undo);

    /// Allocate a child cursor for `action`, leaving `cursor` untouched.
    fn branch(&self, cursor: &Self::Cursor, action: u8) -> Self::Cursor {
        let mut child = cursor.clone();
        self.switch_to_branch(&mut child, action);
        child
    }

    /// Forced-action override for a decision point, when the game definition
    /// pins a decision to a single action (taken with probability 1, no
    /// statistics recorded). Default: no overrides.
    fn forced_action(&self, _cursor: &Self::Cursor, _decision: usize) -> Option<u8> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal two-level tree: one decision with two actions, terminals 0/1.
    struct TwoLeaf;

    impl GameTree for TwoLeaf {
        type Cursor = Vec<u8>;
        type Undo = ();

        fn num_players(&self) -> usize {
            2
        }
        fn num_decisions(&self) -> usize {
            1
        }
        fn action_count(&self, _decision: usize) -> u8 {
            2
        }
        fn root(&self) -> Vec<u8> {
            Vec::new()
        }
        fn node(&self, cursor: &Vec<u8>) -> GameNode {
            match cursor.first() {
                None => GameNode::Decision {
                    player: 0,
                    decision: 0,
                    actions: 2,
                },
                Some(&a) => GameNode::Terminal {
                    utilities: vec![a as f64, -(a as f64)],
                },
            }
        }
        fn switch_to_branch(&self, cursor: &mut Vec<u8>, action: u8) {
            cursor.push(action);
        }
        fn reverse(&self, cursor: &mut Vec<u8>, _undo: ()) {
            cursor.pop();
        }
    }

    #[test]
    fn branch_equals_switch_then_reverse() {
        let tree = TwoLeaf;
        let root = tree.root();

        let child = tree.branch(&root, 1);
        assert_eq!(
            tree.node(&child),
            GameNode::Terminal {
                utilities: vec![1.0, -1.0]
            }
        );

        let mut cursor = tree.root();
        let undo = tree.switch_to_branch(&mut cursor, 1);
        assert_eq!(cursor, child);
        tree.reverse(&mut cursor, undo);
        assert_eq!(cursor, root);
    }
}
