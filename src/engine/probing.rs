//! One-sample probing traversals (the MCCFR family).
//!
//! Each iteration samples a single line of play. At the optimized player's
//! decisions the sampled action is walked for real while every sibling is
//! priced by a cheap statistics-free probe, so regrets update for all
//! actions without the cost of full enumeration. Opponent and non-critical
//! chance decisions are sampled; chance nodes flagged critical are
//! enumerated exactly.
//!
//! Four variants share the walk and differ in how strategies are derived
//! and where exploratory-iteration regret lands:
//!
//! * `Exploratory`: regret matching, forced exploration on designated
//!   iterations, with those iterations' regret routed to the backup
//!   accumulator so a noisy exploratory pass cannot distort the strategy.
//! * `Gibson`: plain regret matching, no exploration, no backup routing.
//! * `ModifiedGibson`: pruned regret matching plus backup routing.
//! * `Hedge`: exponential-weights strategies with exploration every
//!   iteration and bracketed score updates.

use crate::engine::check_finite;
use crate::engine::config::{Algorithm, SolverConfig, SolverResult};
use crate::engine::infoset::{clamp_probability, epsilon_mix, InfoSet};
use crate::engine::node::GameNode;
use crate::engine::rng::{decision_rng, sample_index};
use crate::engine::table::RegretTable;
use crate::engine::tree::GameTree;

/// Salt separating probe RNG streams from the main walk's streams.
const PROBE_SALT: u64 = 0x9c3a_5f71_22d4_8b0d;

/// Which member of the probing family to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbingVariant {
    /// Regret matching with backup routing on exploratory iterations.
    Exploratory,
    /// Plain regret matching, no exploration.
    Gibson,
    /// Pruned regret matching with backup routing.
    ModifiedGibson,
    /// Exponential weights, exploring every iteration.
    Hedge,
}

impl ProbingVariant {
    /// Map an update rule to its probing variant, if it has one.
    pub fn from_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::Exploratory => Some(ProbingVariant::Exploratory),
            Algorithm::Gibson => Some(ProbingVariant::Gibson),
            Algorithm::ModifiedGibson => Some(ProbingVariant::ModifiedGibson),
            Algorithm::Hedge => Some(ProbingVariant::Hedge),
            _ => None,
        }
    }
}

/// One iteration's probing update rule. Construct per iteration; the
/// epsilon ramp, hedge rate, and exploratory flag are resolved up front.
pub struct ProbingCfr<'a, T: GameTree> {
    tree: &'a T,
    table: &'a RegretTable,
    variant: ProbingVariant,
    iteration: u64,
    seed: u64,
    epsilon: f64,
    eta: f64,
    prune_threshold: f64,
    exploratory: bool,
}

impl<'a, T: GameTree> ProbingCfr<'a, T> {
    /// Build the update rule for one iteration of a run.
    pub fn new(
        tree: &'a T,
        table: &'a RegretTable,
        variant: ProbingVariant,
        config: &SolverConfig,
        iteration: u64,
    ) -> Self {
        Self {
            tree,
            table,
            variant,
            iteration,
            seed: config.seed,
            epsilon: config.epsilon(iteration),
            eta: config.hedge_eta / (iteration as f64).sqrt(),
            prune_threshold: config.prune_threshold,
            exploratory: config.is_exploratory(iteration),
        }
    }

    /// Run one sampled pass for `player`, returning an unbiased estimate of
    /// that player's root expected value under the current profile.
    pub fn iterate(&self, player: usize) -> SolverResult<f64> {
        let mut cursor = self.tree.root();
        let estimate = self.walk(&mut cursor, player, 1.0, 1.0)?;
        Ok(estimate[player])
    }

    /// The variant's current strategy at one decision.
    fn strategy(&self, info: &InfoSet) -> Vec<f64> {
        match self.variant {
            ProbingVariant::Hedge => info.hedge_probabilities(self.eta),
            ProbingVariant::ModifiedGibson => {
                info.pruned_regret_matching_probabilities(self.prune_threshold)
            }
            _ => info.regret_matching_probabilities(),
        }
    }

    /// Exploration weight mixed into this iteration's sampling policy.
    fn explore_epsilon(&self) -> f64 {
        match self.variant {
            ProbingVariant::Hedge => self.epsilon,
            ProbingVariant::Gibson => 0.0,
            ProbingVariant::Exploratory | ProbingVariant::ModifiedGibson => {
                if self.exploratory {
                    self.epsilon
                } else {
                    0.0
                }
            }
        }
    }

    /// Whether this iteration's regret belongs in the backup accumulator.
    fn backup_only(&self) -> bool {
        self.exploratory
            && matches!(
                self.variant,
                ProbingVariant::Exploratory | ProbingVariant::ModifiedGibson
            )
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

    /// Sampled walk. `reach` is the optimized player's own reach
    /// probability, `sample_reach` the probability the sampler took this
    /// line. Returns unscaled per-player value estimates; the 1/q
    /// correction is applied where accumulators are written.
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
                    // Critical chance is enumerated exactly; sampling it
                    // would put too much variance on the estimate.
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
                    // Sampling an outcome with its own probability needs no
                    // importance correction.
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
                let sigma = self.strategy(info);
                let n = actions as usize;

                if owner == player {
                    self.optimized_decision(
                        cursor,
                        player,
                        decision,
                        info,
                        sigma,
                        n,
                        reach,
                        sample_reach,
                    )
                } else {
                    self.opponent_decision(
                        cursor,
                        player,
                        owner,
                        decision,
                        info,
                        sigma,
                        reach,
                        sample_reach,
                    )
                }
            }
        }
    }

    /// At the optimized player's decision: sample one action through the
    /// exploration-mixed policy, walk it for real, probe the siblings, and
    /// update regrets for every action.
    #[allow(clippy::too_many_arguments)]
    fn optimized_decision(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        decision: usize,
        info: &InfoSet,
        sigma: Vec<f64>,
        n: usize,
        reach: f64,
        sample_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let epsilon = self.explore_epsilon();
        let rho = if epsilon > 0.0 {
            epsilon_mix(sigma.clone(), epsilon)
        } else {
            sigma.clone()
        };

        let mut rng = decision_rng(self.seed, self.iteration, player, decision);
        let chosen = sample_index(&mut rng, &rho);

        let child = self.descend(
            cursor,
            chosen as u8,
            player,
            reach * sigma[chosen],
            sample_reach * rho[chosen],
        )?;

        let mut values = vec![0.0; n];
        values[chosen] = child[player];
        for a in 0..n {
            if a == chosen {
                continue;
            }
            let mut probe_cursor = self.tree.branch(cursor, a as u8);
            values[a] = self.probe(&mut probe_cursor, player)?;
        }

        let ev: f64 = sigma.iter().zip(&values).map(|(&s, &v)| s * v).sum();
        let inverse = 1.0 / clamp_probability(sample_reach);
        let backup_only = self.backup_only();

        if self.variant == ProbingVariant::Hedge {
            info.begin_update();
            for a in 0..n {
                info.add_last_regret(a, inverse * (values[a] - ev));
            }
            info.end_update(self.eta);
        }
        for a in 0..n {
            info.add_regret(a, inverse * (values[a] - ev), backup_only);
            info.add_strategy(a, reach * sigma[a]);
        }

        // Siblings were only probed for the optimized player, so the other
        // players' estimates ride the sampled branch with its importance
        // correction.
        let ratio = sigma[chosen] / clamp_probability(rho[chosen]);
        let mut out: Vec<f64> = child.iter().map(|&v| ratio * v).collect();
        out[player] = ev;
        Ok(out)
    }

    /// At an opponent decision: accumulate their average strategy, sample
    /// one action, and correct the estimate by the importance ratio.
    #[allow(clippy::too_many_arguments)]
    fn opponent_decision(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        owner: usize,
        decision: usize,
        info: &InfoSet,
        sigma: Vec<f64>,
        reach: f64,
        sample_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let weight = 1.0 / clamp_probability(sample_reach);
        for (a, &s) in sigma.iter().enumerate() {
            info.add_strategy(a, s * weight);
        }

        let epsilon = self.explore_epsilon();
        let rho = if epsilon > 0.0 {
            epsilon_mix(sigma.clone(), epsilon)
        } else {
            sigma.clone()
        };
        let mut rng = decision_rng(self.seed, self.iteration, owner, decision);
        let chosen = sample_index(&mut rng, &rho);

        let child = self.descend(
            cursor,
            chosen as u8,
            player,
            reach,
            sample_reach * rho[chosen],
        )?;
        let ratio = sigma[chosen] / clamp_probability(rho[chosen]);
        Ok(child.iter().map(|&v| ratio * v).collect())
    }

    /// Statistics-free rollout pricing one sibling action: play every
    /// decision by the current strategy down to a single terminal, still
    /// enumerating critical chance. Writes nothing to the table.
    fn probe(&self, cursor: &mut T::Cursor, player: usize) -> SolverResult<f64> {
        let node = self.tree.node(cursor);
        match node {
            GameNode::Terminal { utilities } => {
                check_finite(&utilities)?;
                Ok(utilities[player])
            }

            GameNode::Chance {
                decision,
                probabilities,
                critical,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.probe_branch(cursor, forced, player);
                }
                if critical {
                    let mut value = 0.0;
                    for (a, &p) in probabilities.iter().enumerate() {
                        if p == 0.0 {
                            continue;
                        }
                        value += p * self.probe_branch(cursor, a as u8, player)?;
                    }
                    Ok(value)
                } else {
                    let mut rng =
                        decision_rng(self.seed ^ PROBE_SALT, self.iteration, player, decision);
                    let a = sample_index(&mut rng, &probabilities);
                    self.probe_branch(cursor, a as u8, player)
                }
            }

            GameNode::Decision { decision, .. } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.probe_branch(cursor, forced, player);
                }
                let sigma = self.strategy(self.table.infoset(decision));
                let mut rng =
                    decision_rng(self.seed ^ PROBE_SALT, self.iteration, player, decision);
                let a = sample_index(&mut rng, &sigma);
                self.probe_branch(cursor, a as u8, player)
            }
        }
    }

    fn probe_branch(&self, cursor: &mut T::Cursor, action: u8, player: usize) -> SolverResult<f64> {
        let undo = self.tree.switch_to_branch(cursor, action);
        let result = self.probe(cursor, player);
        self.tree.reverse(cursor, undo);
        result
    }
}
