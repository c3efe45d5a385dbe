//! Vanilla CFR: full-tree traversal with exact enumeration on both sides.
//!
//! One call to [`VanillaCfr::iterate`] walks the whole tree for one
//! optimized player, updating that player's regrets at their decisions and
//! the acting player's cumulative strategy at opponent decisions. Action
//! branches fan out across worker threads up to a configured depth; beyond
//! it the walk is sequential and reuses the cursor in place.

use rayon::prelude::*;

use crate::engine::config::{Algorithm, SolverConfig, SolverResult};
use crate::engine::node::GameNode;
use crate::engine::table::RegretTable;
use crate::engine::tree::GameTree;
use crate::engine::{check_finite, counterfactual_weight};

/// Full-tree update rule. Cheap to construct once per iteration.
pub struct VanillaCfr<'a, T: GameTree> {
    tree: &'a T,
    table: &'a RegretTable,
    /// Skip opponent branches the current profile reaches with probability
    /// zero (CFR-BR).
    prune_zero_reach: bool,
    max_parallel_depth: usize,
}

impl<'a, T: GameTree> VanillaCfr<'a, T> {
    /// Build the update rule from a solver configuration.
    pub fn new(tree: &'a T, table: &'a RegretTable, config: &SolverConfig) -> Self {
        Self {
            tree,
            table,
            prune_zero_reach: config.algorithm == Algorithm::VanillaPruning,
            max_parallel_depth: config.max_parallel_depth,
        }
    }

    /// Run one full-tree pass for `player`, returning the root expected
    /// value for that player under the current profile.
    pub fn iterate(&self, player: usize) -> SolverResult<f64> {
        let mut cursor = self.tree.root();
        let mut reach = vec![1.0; self.tree.num_players()];
        self.walk(&mut cursor, player, &mut reach, 1.0, 0)
    }

    /// Allocate a child branch and continue the walk in it. Used by the
    /// parallel fan-out, which cannot share the in-place cursor.
    fn descend(
        &self,
        cursor: &T::Cursor,
        action: u8,
        player: usize,
        reach: &[f64],
        chance_reach: f64,
        depth: usize,
    ) -> SolverResult<f64> {
        let mut child = self.tree.branch(cursor, action);
        let mut reach = reach.to_vec();
        self.walk(&mut child, player, &mut reach, chance_reach, depth + 1)
    }

    /// Continue the walk in place and restore the cursor afterwards.
    fn descend_in_place(
        &self,
        cursor: &mut T::Cursor,
        action: u8,
        player: usize,
        reach: &mut Vec<f64>,
        chance_reach: f64,
        depth: usize,
    ) -> SolverResult<f64> {
        let undo = self.tree.switch_to_branch(cursor, action);
        let result = self.walk(cursor, player, reach, chance_reach, depth + 1);
        self.tree.reverse(cursor, undo);
        result
    }

    fn walk(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        reach: &mut Vec<f64>,
        chance_reach: f64,
        depth: usize,
    ) -> SolverResult<f64> {
        let node = self.tree.node(cursor);
        debug_assert!(node.chance_probabilities_valid());

        match node {
            GameNode::Terminal { utilities } => {
                check_finite(&utilities)?;
                Ok(utilities[player])
            }

            GameNode::Chance {
                decision,
                probabilities,
                ..
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend_in_place(cursor, forced, player, reach, chance_reach, depth);
                }
                if self.parallel(depth, probabilities.len()) {
                    let cursor_ref: &T::Cursor = cursor;
                    let reach_ref: &[f64] = reach;
                    let value: f64 = probabilities
                        .par_iter()
                        .enumerate()
                        .filter(|(_, &p)| p > 0.0)
                        .map(|(a, &p)| {
                            self.descend(
                                cursor_ref,
                                a as u8,
                                player,
                                reach_ref,
                                chance_reach * p,
                                depth,
                            )
                            .map(|v| p * v)
                        })
                        .try_reduce(|| 0.0, |x, y| Ok(x + y))?;
                    Ok(value)
                } else {
                    let mut value = 0.0;
                    for (a, &p) in probabilities.iter().enumerate() {
                        if p == 0.0 {
                            continue;
                        }
                        let v = self.descend_in_place(
                            cursor,
                            a as u8,
                            player,
                            reach,
                            chance_reach * p,
                            depth,
                        )?;
                        value += p * v;
                    }
                    Ok(value)
                }
            }

            GameNode::Decision {
                player: owner,
                decision,
                actions,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend_in_place(cursor, forced, player, reach, chance_reach, depth);
                }

                let info = self.table.infoset(decision);
                let sigma = info.regret_matching_probabilities();
                let n = actions as usize;

                if owner == player {
                    // Optimized player: exact per-action counterfactual
                    // values from enumerating every action.
                    let values = if self.parallel(depth, n) {
                        let cursor_ref: &T::Cursor = cursor;
                        let reach_ref: &[f64] = reach;
                        (0..n)
                            .into_par_iter()
                            .map(|a| {
                                let mut reach = reach_ref.to_vec();
                                reach[owner] *= sigma[a];
                                let mut child = self.tree.branch(cursor_ref, a as u8);
                                self.walk(&mut child, player, &mut reach, chance_reach, depth + 1)
                            })
                            .collect::<SolverResult<Vec<f64>>>()?
                    } else {
                        let mut values = Vec::with_capacity(n);
                        for a in 0..n {
                            let saved = reach[owner];
                            reach[owner] *= sigma[a];
                            let result = self.descend_in_place(
                                cursor,
                                a as u8,
                                player,
                                reach,
                                chance_reach,
                                depth,
                            );
                            reach[owner] = saved;
                            values.push(result?);
                        }
                        values
                    };

                    let ev: f64 = sigma.iter().zip(&values).map(|(&s, &v)| s * v).sum();
                    let cf = counterfactual_weight(reach, chance_reach, player);
                    for a in 0..n {
                        info.add_regret(a, cf * (values[a] - ev), false);
                    }
                    Ok(ev)
                } else {
                    // Opponent: accumulate their average strategy here,
                    // then weight the enumerated branches by probability.
                    for a in 0..n {
                        info.add_strategy(a, reach[owner] * sigma[a]);
                    }

                    if self.parallel(depth, n) {
                        let cursor_ref: &T::Cursor = cursor;
                        let reach_ref: &[f64] = reach;
                        let value: f64 = (0..n)
                            .into_par_iter()
                            .filter(|&a| !(self.prune_zero_reach && sigma[a] == 0.0))
                            .map(|a| {
                                let mut reach = reach_ref.to_vec();
                                reach[owner] *= sigma[a];
                                let mut child = self.tree.branch(cursor_ref, a as u8);
                                self.walk(&mut child, player, &mut reach, chance_reach, depth + 1)
                                    .map(|v| sigma[a] * v)
                            })
                            .try_reduce(|| 0.0, |x, y| Ok(x + y))?;
                        Ok(value)
                    } else {
                        let mut value = 0.0;
                        for a in 0..n {
                            if self.prune_zero_reach && sigma[a] == 0.0 {
                                continue;
                            }
                            let saved = reach[owner];
                            reach[owner] *= sigma[a];
                            let result = self.descend_in_place(
                                cursor,
                                a as u8,
                                player,
                                reach,
                                chance_reach,
                                depth,
                            );
                            reach[owner] = saved;
                            value += sigma[a] * result?;
                        }
                        Ok(value)
                    }
                }
            }
        }
    }

    #[inline]
    fn parallel(&self, depth: usize, branches: usize) -> bool {
        depth < self.max_parallel_depth && branches > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coin::CoinFlip;
    use crate::games::matching_pennies::MatchingPennies;
    use approx::assert_relative_eq;

    #[test]
    fn first_iteration_returns_uniform_expected_value() {
        let game = CoinFlip::new(false);
        let table = RegretTable::for_tree(&game);
        let cfr = VanillaCfr::new(&game, &table, &SolverConfig::default());

        // Uniform strategy over payoffs {0,1,2,3} with chance (0.25, 0.75).
        let value = cfr.iterate(0).unwrap();
        assert_relative_eq!(value, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn matching_pennies_drifts_toward_uniform() {
        let game = MatchingPennies;
        let table = RegretTable::for_tree(&game);
        let config = SolverConfig::default();
        let cfr = VanillaCfr::new(&game, &table, &config);

        for _ in 0..2_000 {
            cfr.iterate(0).unwrap();
            cfr.iterate(1).unwrap();
        }

        for decision in 0..2 {
            let avg = table.infoset(decision).average_strategy();
            assert!(
                (avg[0] - 0.5).abs() < 0.05,
                "decision {decision} average {avg:?} should be near uniform"
            );
        }
    }

    #[test]
    fn parallel_fanout_matches_sequential() {
        let game = MatchingPennies;
        let config = SolverConfig::default();

        let sequential = RegretTable::for_tree(&game);
        let cfr = VanillaCfr::new(&game, &sequential, &config);
        for _ in 0..50 {
            cfr.iterate(0).unwrap();
            cfr.iterate(1).unwrap();
        }

        let parallel = RegretTable::for_tree(&game);
        let config = config.with_max_parallel_depth(4);
        let cfr = VanillaCfr::new(&game, &parallel, &config);
        for _ in 0..50 {
            cfr.iterate(0).unwrap();
            cfr.iterate(1).unwrap();
        }

        for d in 0..2 {
            let a = sequential.infoset(d).cumulative_regret();
            let b = parallel.infoset(d).cumulative_regret();
            for (x, y) in a.iter().zip(&b) {
                assert_relative_eq!(x, y, epsilon = 1e-9);
            }
        }
    }
}
