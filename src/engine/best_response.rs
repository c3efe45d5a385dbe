//! Exact best response against a fixed strategy profile.
//!
//! An information set can sit at several tree depths, so a single
//! backward sweep cannot pick its action before every subtree below it is
//! settled. The calculator therefore runs in two phases: a first pass
//! records the maximum depth at which each of the responder's decisions
//! occurs and clears its accumulators, then one sweep per recorded depth,
//! deepest first. A decision whose deepest occurrence sits at the sweep's
//! depth accumulates reach-weighted action values at every one of its
//! occurrences, shallower ones included, and locks in the argmax before
//! shallower decisions are considered. A final pass through the locked-in
//! actions yields the best-response utility.
//!
//! The responder's value is counterfactual: their own reach never scales
//! the accumulation weight.

use std::collections::BTreeMap;

use crate::engine::check_finite;
use crate::engine::config::SolverResult;
use crate::engine::diagnostics;
use crate::engine::node::GameNode;
use crate::engine::table::RegretTable;
use crate::engine::tree::GameTree;

/// Which profile the opponents are held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategySource {
    /// Current regret-matching strategies.
    Current,
    /// Normalized cumulative strategies.
    Average,
}

/// Options for a best-response computation.
#[derive(Debug, Clone, Copy)]
pub struct BestResponseOptions {
    /// Opponent profile to respond to.
    pub opponent: StrategySource,
    /// Treat every chance outcome with weight 1 instead of its
    /// probability, for games whose chance outcomes are distributed
    /// externally.
    pub distribute_chance: bool,
    /// Accumulate the opponents' strategy weights during the final pass,
    /// as CFR-BR does when the responder's strategy is the pure response.
    pub update_opponent_strategy: bool,
}

impl Default for BestResponseOptions {
    fn default() -> Self {
        Self {
            opponent: StrategySource::Average,
            distribute_chance: false,
            update_opponent_strategy: false,
        }
    }
}

/// Depth-ordered best-response calculator.
pub struct BestResponse<'a, T: GameTree> {
    tree: &'a T,
    table: &'a RegretTable,
    options: BestResponseOptions,
}

/// Sentinel for decisions the responder never reaches.
const UNSEEN: usize = usize::MAX;

impl<'a, T: GameTree> BestResponse<'a, T> {
    /// Build a calculator over a game and its accumulator table.
    pub fn new(tree: &'a T, table: &'a RegretTable, options: BestResponseOptions) -> Self {
        Self {
            tree,
            table,
            options,
        }
    }

    /// Compute the best-response utility for `player` and record the
    /// response action at each of their decisions.
    pub fn run(&self, player: usize) -> SolverResult<f64> {
        let mut depth_of = vec![UNSEEN; self.tree.num_decisions()];
        let mut cursor = self.tree.root();
        self.record_depths(&mut cursor, player, 0, &mut depth_of);

        let mut by_depth: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (decision, &depth) in depth_of.iter().enumerate() {
            if depth != UNSEEN {
                by_depth.entry(depth).or_default().push(decision);
            }
        }

        for (&target, decisions) in by_depth.iter().rev() {
            let mut cursor = self.tree.root();
            self.sweep(&mut cursor, player, target, 1.0, &depth_of)?;
            for &decision in decisions {
                self.table.infoset(decision).resolve_best_response();
            }
        }

        let mut cursor = self.tree.root();
        self.response_value(&mut cursor, player)
    }

    /// Phase one: clear accumulators and record the maximum depth of every
    /// decision belonging to `player`.
    fn record_depths(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        depth: usize,
        depth_of: &mut Vec<usize>,
    ) {
        let node = self.tree.node(cursor);
        let (decision, branches) = match node {
            GameNode::Terminal { .. } => return,
            GameNode::Chance {
                decision,
                probabilities,
                ..
            } => (decision, probabilities.len()),
            GameNode::Decision {
                player: owner,
                decision,
                actions,
            } => {
                if owner == player {
                    if depth_of[decision] == UNSEEN {
                        self.table.infoset(decision).reset_best_response();
                        depth_of[decision] = depth;
                    } else {
                        depth_of[decision] = depth_of[decision].max(depth);
                    }
                }
                (decision, actions as usize)
            }
        };

        if let Some(forced) = self.tree.forced_action(cursor, decision) {
            let undo = self.tree.switch_to_branch(cursor, forced);
            self.record_depths(cursor, player, depth + 1, depth_of);
            self.tree.reverse(cursor, undo);
            return;
        }
        for a in 0..branches {
            let undo = self.tree.switch_to_branch(cursor, a as u8);
            self.record_depths(cursor, player, depth + 1, depth_of);
            self.tree.reverse(cursor, undo);
        }
    }

    fn chance_weight(&self, probability: f64) -> f64 {
        if self.options.distribute_chance {
            1.0
        } else {
            probability
        }
    }

    fn opponent_strategy(&self, decision: usize) -> Vec<f64> {
        let info = self.table.infoset(decision);
        match self.options.opponent {
            StrategySource::Current => info.regret_matching_probabilities(),
            StrategySource::Average => info.average_strategy(),
        }
    }

    fn descend_sweep(
        &self,
        cursor: &mut T::Cursor,
        action: u8,
        player: usize,
        target: usize,
        weight: f64,
        depth_of: &[usize],
    ) -> SolverResult<f64> {
        let undo = self.tree.switch_to_branch(cursor, action);
        let result = self.sweep(cursor, player, target, weight, depth_of);
        self.tree.reverse(cursor, undo);
        result
    }

    /// Phase two, one call per recorded depth: accumulate action values at
    /// every occurrence of the responder's decisions whose maximum depth is
    /// `target`, follow already-resolved actions below it.
    fn sweep(
        &self,
        cursor: &mut T::Cursor,
        player: usize,
        target: usize,
        weight: f64,
        depth_of: &[usize],
    ) -> SolverResult<f64> {
        let node = self.tree.node(cursor);
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
                    return self.descend_sweep(cursor, forced, player, target, weight, depth_of);
                }
                let mut value = 0.0;
                for (a, &p) in probabilities.iter().enumerate() {
                    if p == 0.0 {
                        continue;
                    }
                    let w = self.chance_weight(p);
                    let v =
                        self.descend_sweep(cursor, a as u8, player, target, weight * w, depth_of)?;
                    value += w * v;
                }
                Ok(value)
            }

            GameNode::Decision {
                player: owner,
                decision,
                actions,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend_sweep(cursor, forced, player, target, weight, depth_of);
                }
                let n = actions as usize;
                let info = self.table.infoset(decision);

                if owner != player {
                    let sigma = self.opponent_strategy(decision);
                    let mut value = 0.0;
                    for a in 0..n {
                        if sigma[a] == 0.0 {
                            continue;
                        }
                        let v = self.descend_sweep(
                            cursor,
                            a as u8,
                            player,
                            target,
                            weight * sigma[a],
                            depth_of,
                        )?;
                        value += sigma[a] * v;
                    }
                    return Ok(value);
                }

                // Responder decisions resolved in a deeper sweep are locked
                // to their recorded action.
                if depth_of[decision] > target {
                    let action = info.last_best_response_action();
                    return self.descend_sweep(cursor, action, player, target, weight, depth_of);
                }

                // Own reach never scales the weight: the response is
                // counterfactual.
                let mut values = vec![0.0; n];
                for (a, value) in values.iter_mut().enumerate() {
                    *value =
                        self.descend_sweep(cursor, a as u8, player, target, weight, depth_of)?;
                }

                // Every occurrence of a decision resolving in this sweep
                // contributes, whatever depth this particular occurrence
                // sits at.
                if depth_of[decision] == target {
                    for (a, &v) in values.iter().enumerate() {
                        info.add_best_response(a, weight, v);
                    }
                }

                // Best action known so far; before any accumulation this
                // falls back to the first action.
                let mut best = 0usize;
                let mut best_value = f64::NEG_INFINITY;
                for a in 0..n {
                    if let Some(v) = info.best_response_value(a) {
                        if v > best_value {
                            best_value = v;
                            best = a;
                        }
                    }
                }
                Ok(values[best])
            }
        }
    }

    /// Final pass: every responder decision plays its resolved action.
    fn response_value(&self, cursor: &mut T::Cursor, player: usize) -> SolverResult<f64> {
        let node = self.tree.node(cursor);
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
                    return self.descend_value(cursor, forced, player);
                }
                let mut value = 0.0;
                for (a, &p) in probabilities.iter().enumerate() {
                    if p == 0.0 {
                        continue;
                    }
                    let w = self.chance_weight(p);
                    value += w * self.descend_value(cursor, a as u8, player)?;
                }
                Ok(value)
            }

            GameNode::Decision {
                player: owner,
                decision,
                actions,
            } => {
                if let Some(forced) = self.tree.forced_action(cursor, decision) {
                    return self.descend_value(cursor, forced, player);
                }
                let info = self.table.infoset(decision);
                if owner == player {
                    let action = info.last_best_response_action();
                    return self.descend_value(cursor, action, player);
                }

                let sigma = self.opponent_strategy(decision);
                if self.options.update_opponent_strategy {
                    for (a, &s) in sigma.iter().enumerate() {
                        info.add_strategy(a, s);
                    }
                }
                let mut value = 0.0;
                for a in 0..actions as usize {
                    if sigma[a] == 0.0 {
                        continue;
                    }
                    value += sigma[a] * self.descend_value(cursor, a as u8, player)?;
                }
                Ok(value)
            }
        }
    }

    fn descend_value(&self, cursor: &mut T::Cursor, action: u8, player: usize) -> SolverResult<f64> {
        let undo = self.tree.switch_to_branch(cursor, action);
        let result = self.response_value(cursor, player);
        self.tree.reverse(cursor, undo);
        result
    }
}

/// Average per-player gap between the best response and the average
/// strategy, plus the per-player best-response values.
pub fn exploitability<T: GameTree>(
    tree: &T,
    table: &RegretTable,
) -> SolverResult<(f64, Vec<f64>)> {
    let players = tree.num_players();
    let mut values = Vec::with_capacity(players);
    let mut gap = 0.0;
    for player in 0..players {
        let br = BestResponse::new(tree, table, BestResponseOptions::default()).run(player)?;
        let tracks = diagnostics::evaluate(tree, table, player)?;
        gap += br - tracks.average;
        values.push(br);
    }
    Ok((gap / players as f64, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coin::CoinFlip;
    use crate::games::kuhn::Kuhn;
    use crate::games::matching_pennies::MatchingPennies;
    use approx::assert_relative_eq;

    #[test]
    fn picks_the_dominant_action() {
        let game = CoinFlip::new(true);
        let table = RegretTable::for_tree(&game);
        let br = BestResponse::new(&game, &table, BestResponseOptions::default());

        let value = br.run(0).unwrap();
        assert_relative_eq!(value, 2.5, epsilon = 1e-12);
        assert_eq!(table.infoset(1).last_best_response_action(), 1);
    }

    #[test]
    fn uniform_matching_pennies_is_unexploitable() {
        let game = MatchingPennies;
        let table = RegretTable::for_tree(&game);
        // Fresh accumulators fall back to the uniform average strategy.
        let (gap, values) = exploitability(&game, &table).unwrap();
        assert_relative_eq!(values[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(values[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(gap, 0.0, epsilon = 1e-12);
    }

    /// Chance splits 0.5/0.5; player 0's decision 1 occurs at depth 1 on
    /// the first branch (payoffs 10/0) and at depth 2 on the second branch
    /// (payoffs 0/1), behind a single-action opponent node.
    struct SplitDepth;

    impl GameTree for SplitDepth {
        type Cursor = Vec<u8>;
        type Undo = ();

        fn num_players(&self) -> usize {
            2
        }
        fn num_decisions(&self) -> usize {
            3
        }
        fn action_count(&self, decision: usize) -> u8 {
            if decision == 2 {
                1
            } else {
                2
            }
        }
        fn root(&self) -> Vec<u8> {
            Vec::new()
        }
        fn node(&self, cursor: &Vec<u8>) -> GameNode {
            match cursor.as_slice() {
                [] => GameNode::Chance {
                    decision: 0,
                    probabilities: vec![0.5, 0.5],
                    critical: true,
                },
                [0] | [1, _] => GameNode::Decision {
                    player: 0,
                    decision: 1,
                    actions: 2,
                },
                [1] => GameNode::Decision {
                    player: 1,
                    decision: 2,
                    actions: 1,
                },
                [0, a, ..] => {
                    let u = if *a == 0 { 10.0 } else { 0.0 };
                    GameNode::Terminal {
                        utilities: vec![u, -u],
                    }
                }
                [1, _, a, ..] => {
                    let u = if *a == 0 { 0.0 } else { 1.0 };
                    GameNode::Terminal {
                        utilities: vec![u, -u],
                    }
                }
                _ => unreachable!(),
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
    fn shared_infoset_spanning_depths_weighs_every_occurrence() {
        let game = SplitDepth;
        let table = RegretTable::for_tree(&game);
        let br = BestResponse::new(&game, &table, BestResponseOptions::default());

        // Action 0 earns 0.5 * 10 = 5 across both occurrences; judged by
        // the deep occurrence alone the choice would flip to action 1 and
        // the response would collapse to 0.5.
        let value = br.run(0).unwrap();
        assert_relative_eq!(value, 5.0, epsilon = 1e-12);
        assert_eq!(table.infoset(1).last_best_response_action(), 0);
    }

    /// Enumerate every pure strategy of player 0 directly.
    fn brute_force_best(game: &Kuhn, table: &RegretTable, decisions: &[usize]) -> f64 {
        let mut best = f64::NEG_INFINITY;
        for mask in 0..(1u32 << decisions.len()) {
            let pick = |decision: usize| -> u8 {
                let slot = decisions.iter().position(|&d| d == decision).unwrap();
                ((mask >> slot) & 1) as u8
            };
            let mut cursor = game.root();
            let value = pure_value(game, table, &mut cursor, &pick);
            best = best.max(value);
        }
        best
    }

    fn pure_value(
        game: &Kuhn,
        table: &RegretTable,
        cursor: &mut <Kuhn as GameTree>::Cursor,
        pick: &dyn Fn(usize) -> u8,
    ) -> f64 {
        match game.node(cursor) {
            GameNode::Terminal { utilities } => utilities[0],
            GameNode::Chance { probabilities, .. } => probabilities
                .iter()
                .enumerate()
                .map(|(a, &p)| {
                    let undo = game.switch_to_branch(cursor, a as u8);
                    let v = p * pure_value(game, table, cursor, pick);
                    game.reverse(cursor, undo);
                    v
                })
                .sum(),
            GameNode::Decision {
                player,
                decision,
                actions,
            } => {
                if player == 0 {
                    let undo = game.switch_to_branch(cursor, pick(decision));
                    let v = pure_value(game, table, cursor, pick);
                    game.reverse(cursor, undo);
                    return v;
                }
                let sigma = table.infoset(decision).average_strategy();
                (0..actions as usize)
                    .map(|a| {
                        let undo = game.switch_to_branch(cursor, a as u8);
                        let v = sigma[a] * pure_value(game, table, cursor, pick);
                        game.reverse(cursor, undo);
                        v
                    })
                    .sum()
            }
        }
    }

    #[test]
    fn kuhn_matches_brute_force_enumeration() {
        let game = Kuhn::new();
        let table = RegretTable::for_tree(&game);

        // An arbitrary fixed profile for player 1.
        for (i, decision) in [2usize, 3, 6, 7, 10, 11].into_iter().enumerate() {
            let info = table.infoset(decision);
            info.add_strategy(0, 1.0 + i as f64);
            info.add_strategy(1, 0.5 + (i as f64) * 0.3);
        }

        let br = BestResponse::new(&game, &table, BestResponseOptions::default());
        let value = br.run(0).unwrap();

        let player0_decisions = [1usize, 4, 5, 8, 9, 12];
        let expected = brute_force_best(&game, &table, &player0_decisions);
        assert_relative_eq!(value, expected, epsilon = 1e-9);
    }
}
