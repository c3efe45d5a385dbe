//! A one-decision game behind a biased coin flip.
//!
//! Chance picks heads with probability 0.25, then player 0 sees the
//! outcome and picks one of two actions. Payoffs are
//! `2 * outcome + action`, so action 1 dominates and the uniform-strategy
//! value is exactly 2. Each decision point is visited at most once per
//! traversal, which keeps estimates checkable by hand.

use crate::engine::node::GameNode;
use crate::engine::tree::GameTree;

/// The biased coin-flip game.
pub struct CoinFlip {
    critical: bool,
}

impl CoinFlip {
    /// `critical` controls whether sampled traversals enumerate the flip.
    pub fn new(critical: bool) -> Self {
        Self { critical }
    }
}

/// Position in the coin-flip tree.
#[derive(Debug, Clone, Default)]
pub struct CoinCursor {
    outcome: Option<u8>,
    action: Option<u8>,
}

impl GameTree for CoinFlip {
    type Cursor = CoinCursor;
    type Undo = ();

    fn num_players(&self) -> usize {
        2
    }

    fn num_decisions(&self) -> usize {
        3
    }

    fn action_count(&self, decision: usize) -> u8 {
        debug_assert!(decision < 3);
        2
    }

    fn root(&self) -> CoinCursor {
        CoinCursor::default()
    }

    fn node(&self, cursor: &CoinCursor) -> GameNode {
        match (cursor.outcome, cursor.action) {
            (None, _) => GameNode::Chance {
                decision: 0,
                probabilities: vec![0.25, 0.75],
                critical: self.critical,
            },
            (Some(outcome), None) => GameNode::Decision {
                player: 0,
                decision: 1 + outcome as usize,
                actions: 2,
            },
            (Some(outcome), Some(action)) => {
                let u = (2 * outcome + action) as f64;
                GameNode::Terminal {
                    utilities: vec![u, -u],
                }
            }
        }
    }

    fn switch_to_branch(&self, cursor: &mut CoinCursor, action: u8) {
        if cursor.outcome.is_none() {
            cursor.outcome = Some(action);
        } else {
            cursor.action = Some(action);
        }
    }

    fn reverse(&self, cursor: &mut CoinCursor, _undo: ()) {
        if cursor.action.is_some() {
            cursor.action = None;
        } else {
            cursor.outcome = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payoffs_are_zero_sum() {
        let game = CoinFlip::new(false);
        for outcome in 0..2 {
            for action in 0..2 {
                let cursor = CoinCursor {
                    outcome: Some(outcome),
                    action: Some(action),
                };
                match game.node(&cursor) {
                    GameNode::Terminal { utilities } => {
                        assert_eq!(utilities[0], -utilities[1]);
                        assert_eq!(utilities[0], (2 * outcome + action) as f64);
                    }
                    other => panic!("expected terminal, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn branch_and_reverse_round_trip() {
        let game = CoinFlip::new(false);
        let mut cursor = game.root();
        let undo = game.switch_to_branch(&mut cursor, 1);
        assert!(matches!(game.node(&cursor), GameNode::Decision { .. }));
        game.reverse(&mut cursor, undo);
        assert!(matches!(game.node(&cursor), GameNode::Chance { .. }));
    }
}
