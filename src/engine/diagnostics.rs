//! Generalized vanilla evaluation: one traversal that simultaneously
//! tracks the utility of current-vs-current, average-vs-average, and
//! best-response-vs-average play for one player. The scheduler uses it for
//! convergence reporting without separate passes per strategy pairing.

use crate::engine::check_finite;
use crate::engine::config::SolverResult;
use crate::engine::node::GameNode;
use crate::engine::table::RegretTable;
use crate::engine::tree::GameTree;

/// Utilities of one player under the three tracked strategy pairings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyTracks {
    /// Everyone plays their current (regret-matching) strategy.
    pub current: f64,
    /// Everyone plays their average strategy.
    pub average: f64,
    /// The player plays their last recorded best-response action at every
    /// decision; opponents play their average strategy.
    pub best_response: f64,
}

/// Evaluate all three tracks for `player` in a single traversal.
pub fn evaluate<T: GameTree>(
    tree: &T,
    table: &RegretTable,
    player: usize,
) -> SolverResult<StrategyTracks> {
    let mut cursor = tree.root();
    let [current, average, best_response] = walk(tree, table, &mut cursor, player)?;
    Ok(StrategyTracks {
        current,
        average,
        best_response,
    })
}

fn walk<T: GameTree>(
    tree: &T,
    table: &RegretTable,
    cursor: &mut T::Cursor,
    player: usize,
) -> SolverResult<[f64; 3]> {
    let node = tree.node(cursor);
    debug_assert!(node.chance_probabilities_valid());

    match node {
        GameNode::Terminal { utilities } => {
            check_finite(&utilities)?;
            Ok([utilities[player]; 3])
        }

        GameNode::Chance {
            decision,
            probabilities,
            ..
        } => {
            if let Some(forced) = tree.forced_action(cursor, decision) {
                return descend(tree, table, cursor, forced, player);
            }
            let mut value = [0.0; 3];
            for (a, &p) in probabilities.iter().enumerate() {
                if p == 0.0 {
                    continue;
                }
                let child = descend(tree, table, cursor, a as u8, player)?;
                for (total, v) in value.iter_mut().zip(child) {
                    *total += p * v;
                }
            }
            Ok(value)
        }

        GameNode::Decision {
            player: owner,
            decision,
            actions,
        } => {
            if let Some(forced) = tree.forced_action(cursor, decision) {
                return descend(tree, table, cursor, forced, player);
            }

            let info = table.infoset(decision);
            let current = info.regret_matching_probabilities();
            let average = info.average_strategy();
            let br_action = info.last_best_response_action() as usize;

            let mut value = [0.0; 3];
            for a in 0..actions as usize {
                let child = descend(tree, table, cursor, a as u8, player)?;
                value[0] += current[a] * child[0];
                value[1] += average[a] * child[1];
                // The best-response track forces the player's own recorded
                // action; opponents keep their average strategy.
                if owner == player {
                    if a == br_action {
                        value[2] += child[2];
                    }
                } else {
                    value[2] += average[a] * child[2];
                }
            }
            Ok(value)
        }
    }
}

fn descend<T: GameTree>(
    tree: &T,
    table: &RegretTable,
    cursor: &mut T::Cursor,
    action: u8,
    player: usize,
) -> SolverResult<[f64; 3]> {
    let undo = tree.switch_to_branch(cursor, action);
    let result = walk(tree, table, cursor, player);
    tree.reverse(cursor, undo);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coin::CoinFlip;
    use approx::assert_relative_eq;

    #[test]
    fn fresh_table_tracks_match_uniform_play() {
        let game = CoinFlip::new(false);
        let table = RegretTable::for_tree(&game);

        let tracks = evaluate(&game, &table, 0).unwrap();
        assert_relative_eq!(tracks.current, 2.0, epsilon = 1e-12);
        assert_relative_eq!(tracks.average, 2.0, epsilon = 1e-12);
        // Default best-response action is 0: EV = 0.25*0 + 0.75*2.
        assert_relative_eq!(tracks.best_response, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn best_response_track_follows_recorded_action() {
        let game = CoinFlip::new(false);
        let table = RegretTable::for_tree(&game);

        for decision in [1, 2] {
            let info = table.infoset(decision);
            info.reset_best_response();
            info.add_best_response(1, 1.0, 1.0);
            info.resolve_best_response();
        }

        let tracks = evaluate(&game, &table, 0).unwrap();
        // Action 1 everywhere: EV = 0.25*1 + 0.75*3.
        assert_relative_eq!(tracks.best_response, 2.5, epsilon = 1e-12);
    }
}
