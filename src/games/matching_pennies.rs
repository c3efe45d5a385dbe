//! Matching pennies as a sequential tree with an information set.
//!
//! Player 0 commits a penny, player 1 picks without seeing it (both of
//! player 1's nodes share one decision index). Player 0 wins 1 on a match.
//! The unique equilibrium is uniform for both players with value 0.

use crate::engine::node::GameNode;
use crate::engine::tree::GameTree;

/// The matching-pennies game.
pub struct MatchingPennies;

/// Position in the matching-pennies tree.
#[derive(Debug, Clone, Default)]
pub struct PenniesCursor {
    first: Option<u8>,
    second: Option<u8>,
}

impl GameTree for MatchingPennies {
    type Cursor = PenniesCursor;
    type Undo = ();

    fn num_players(&self) -> usize {
        2
    }

    fn num_decisions(&self) -> usize {
        2
    }

    fn action_count(&self, decision: usize) -> u8 {
        debug_assert!(decision < 2);
        2
    }

    fn root(&self) -> PenniesCursor {
        PenniesCursor::default()
    }

    fn node(&self, cursor: &PenniesCursor) -> GameNode {
        match (cursor.first, cursor.second) {
            (None, _) => GameNode::Decision {
                player: 0,
                decision: 0,
                actions: 2,
            },
            (Some(_), None) => GameNode::Decision {
                player: 1,
                decision: 1,
                actions: 2,
            },
            (Some(a), Some(b)) => {
                let u = if a == b { 1.0 } else { -1.0 };
                GameNode::Terminal {
                    utilities: vec![u, -u],
                }
            }
        }
    }

    fn switch_to_branch(&self, cursor: &mut PenniesCursor, action: u8) {
        if cursor.first.is_none() {
            cursor.first = Some(action);
        } else {
            cursor.second = Some(action);
        }
    }

    fn reverse(&self, cursor: &mut PenniesCursor, _undo: ()) {
        if cursor.second.is_some() {
            cursor.second = None;
        } else {
            cursor.first = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_player_cannot_see_the_first_move() {
        let game = MatchingPennies;
        for first in 0..2 {
            let cursor = PenniesCursor {
                first: Some(first),
                second: None,
            };
            match game.node(&cursor) {
                GameNode::Decision {
                    player, decision, ..
                } => {
                    assert_eq!(player, 1);
                    assert_eq!(decision, 1);
                }
                other => panic!("expected decision, got {other:?}"),
            }
        }
    }
}
