//! Average-strategy sampling.
//!
//! Instead of sampling one action at the optimized player's decisions, each
//! action is independently explored with a probability driven by its share
//! of the cumulative strategy: actions the average strategy already favors
//! keep being sampled, rarely-played actions decay toward the epsilon
//! floor. Explored branches are importance-corrected by their explore
//! probability; opponents and chance are sampled as in the probing family.

use rand::Rng;

use crate::engine::check_finite;
use crate::engine::config::{SolverConfig, SolverResult};
use crate::engine::infoset::clamp_probability;
use crate::engine::node::GameNode;
use crate::engine::rng::{decision_rng, sample_index};
use crate::engine::table::RegretTable;
use crate::engine::tree::GameTree;

/// One iteration's average-strategy-sampling update rule.
pub struct AverageSamplingCfr<'a, T: GameTree> {
    tree: &'a T,
    table: &'a RegretTable,
    iteration: u64,
    seed: u64,
    /// Explore-probability floor.
    epsilon: f64,
    /// Bonus term `beta`; softens the cumulative-strategy ratio early on.
    bonus: f64,
    /// Threshold multiplier `tau` on the per-action cumulative weight.
    threshold: f64,
}

impl<'a, T: GameTree> AverageSamplingCfr<'a, T> {
    /// Build the update rule for one iteration of a run.
    pub fn new(
        tree: &'a T,
        table: &'a RegretTable,
        config: &SolverConfig,
        iteration: u64,
    ) -> Self {
        Self {
            tree,
            table,
            iteration,
            seed: config.seed,
            epsilon: config.epsilon(iteration),
            bonus: config.sampling_bonus,
            threshold: config.sampling_threshold,
        }
    }

    /// Run one sampled pass for `player`, returning an unbiased estimate of
    /// that player's root expected value under the current profile.
    pub fn iterate(&self, player: usize) -> SolverResult<f64> {
        let mut cursor = self.tree.root();
        let estimate = self.walk(&mut cursor, player, 1.0, 1.0)?;
        Ok(estimate[player])
    }

    /// Probability of exploring an action with cumulative strategy weight
    /// `cumulative` out of `total` at its decision.
    fn explore_probability(&self, cumulative: f64, total: f64) -> f64 {
        let ratio = (self.bonus + self.threshold * cumulative) / (self.bonus + total);
        ratio.max(self.epsilon).min(1.0)
    }

    fn descend(
        &self,
        cursor: &mut T::Cursor,
        action: u8,
        player: usize,
        reach: f64,
        sample_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let undo = self.tree.switch_to_branch(cursor, action);
        let result = self.walk(cursor, player, reach, sample_reach);
        self.tree.reverse(cursor, undo);
        result
    }

    fn walk(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        reach: f64,
        sample_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let node = self.tree.node(cursor);
        debug_assert!(node.chance_probabilities_valid());

        match node {
            GameNode::Terminal { utilities } => {
                check_finite(&utilities)?;
                Ok(utilities)
            }

            GameNode::Chance {
                decision,
                probabilities,
                critical,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend(cursor, forced, player, reach, sample_reach);
                }
                if critical {
                    let mut value = vec![0.0; self.tree.num_players()];
                    for (a, &p) in probabilities.iter().enumerate() {
                        if p == 0.0 {
                            continue;
                        }
                        let child = self.descend(cursor, a as u8, player, reach, sample_reach)?;
                        for (total, v) in value.iter_mut().zip(child) {
                            *total += p * v;
                        }
                    }
                    Ok(value)
                } else {
                    let mut rng = decision_rng(self.seed, self.iteration, player, decision);
                    let a = sample_index(&mut rng, &probabilities);
                    self.descend(cursor, a as u8, player, reach, sample_reach)
                }
            }

            GameNode::Decision {
                player: owner,
                decision,
                actions,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend(cursor, forced, player, reach, sample_reach);
                }

                let info = self.table.infoset(decision);
                let sigma = info.regret_matching_probabilities();
                let n = actions as usize;

                if owner != player {
                    // Opponents are sampled through their own strategy, so
                    // no importance correction is needed on the estimate.
                    let weight = 1.0 / clamp_probability(sample_reach);
                    for (a, &s) in sigma.iter().enumerate() {
                        info.add_strategy(a, s * weight);
                    }
                    let mut rng = decision_rng(self.seed, self.iteration, owner, decision);
                    let a = sample_index(&mut rng, &sigma);
                    return self.descend(cursor, a as u8, player, reach, sample_reach);
                }

                let cumulative = info.cumulative_strategy();
                let total: f64 = cumulative.iter().sum();
                let mut rng = decision_rng(self.seed, self.iteration, player, decision);

                let mut values = vec![0.0; n];
                let mut others = vec![0.0; self.tree.num_players()];
                for a in 0..n {
                    let rho = self.explore_probability(cumulative[a], total);
                    if rng.gen::<f64>() >= rho {
                        continue;
                    }
                    let child = self.descend(
                        cursor,
                        a as u8,
                        player,
                        reach * sigma[a],
                        sample_reach * rho,
                    )?;
                    values[a] = child[player] / rho;
                    for (acc, v) in others.iter_mut().zip(&child) {
                        *acc += sigma[a] * v / rho;
                    }
                }

                let ev: f64 = sigma.iter().zip(&values).map(|(&s, &v)| s * v).sum();
                let inverse = 1.0 / clamp_probability(sample_reach);
                for a in 0..n {
                    info.add_regret(a, inverse * (values[a] - ev), false);
                    info.add_strategy(a, reach * sigma[a]);
                }

                others[player] = ev;
                Ok(others)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coin::CoinFlip;
    use crate::games::matching_pennies::MatchingPennies;
    use approx::assert_relative_eq;

    fn config(seed: u64) -> SolverConfig {
        SolverConfig::named("average-sampling")
            .unwrap()
            .with_seed(seed)
    }

    #[test]
    fn explore_probability_is_floored_and_capped() {
        let game = MatchingPennies;
        let table = RegretTable::for_tree(&game);
        let config = config(0);
        let cfr = AverageSamplingCfr::new(&game, &table, &config, 1);

        // Fresh accumulators explore everything.
        assert_relative_eq!(cfr.explore_probability(0.0, 0.0), 1.0);
        // A rarely-played action decays to the floor.
        assert_relative_eq!(cfr.explore_probability(0.0, 1e6), config.epsilon_last);
        // A dominant action keeps being explored.
        assert!(cfr.explore_probability(900.0, 1000.0) > 0.8);
    }

    #[test]
    fn first_iteration_explores_every_action_exactly() {
        let game = CoinFlip::new(true);
        let table = RegretTable::for_tree(&game);
        let config = config(3);
        let cfr = AverageSamplingCfr::new(&game, &table, &config, 1);

        // All explore probabilities are 1 on a fresh table, so the critical
        // chance game is evaluated exactly.
        let estimate = cfr.iterate(0).unwrap();
        assert_relative_eq!(estimate, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn sampled_estimate_is_unbiased() {
        let game = CoinFlip::new(false);
        let samples = 4_000;
        let mut total = 0.0;
        for seed in 0..samples {
            let table = RegretTable::for_tree(&game);
            let config = config(seed);
            let cfr = AverageSamplingCfr::new(&game, &table, &config, 1);
            total += cfr.iterate(0).unwrap();
        }
        let mean = total / samples as f64;
        assert!(
            (mean - 2.0).abs() < 0.06,
            "mean estimate {mean} drifted from 2.0"
        );
    }

    #[test]
    fn matching_pennies_converges_toward_uniform() {
        let game = MatchingPennies;
        let table = RegretTable::for_tree(&game);
        let config = config(11);

        for t in 1..=5_000 {
            let cfr = AverageSamplingCfr::new(&game, &table, &config, t);
            cfr.iterate(0).unwrap();
            cfr.iterate(1).unwrap();
        }

        for decision in 0..2 {
            let avg = table.infoset(decision).average_strategy();
            assert!(
                (avg[0] - 0.5).abs() < 0.1,
                "decision {decision} average {avg:?} should be near uniform"
            );
        }
    }
}
