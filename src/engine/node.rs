//! Game-state node model.
//!
//! Every position in an extensive-form game tree is one of three node kinds:
//! a chance node, a decision node owned by one player, or a terminal node
//! carrying final payoffs. The traversal engine pattern-matches on the kind;
//! there is no separate "is terminal" query.

/// A node of the game tree, produced by [`GameTree::node`](crate::engine::tree::GameTree::node).
///
/// Chance and decision nodes reference exactly one decision point by index,
/// which is also the index of the shared accumulator record for that point.
#[derive(Debug, Clone, PartialEq)]
pub enum GameNode {
    /// A random event. `probabilities` has one entry per action and may
    /// depend on earlier chance draws recorded in the cursor.
    Chance {
        /// Decision-point index of this chance event.
        decision: usize,
        /// Probability of each outcome, summing to 1.
        probabilities: Vec<f64>,
        /// A critical chance node must be branched exhaustively rather than
        /// sampled, because downstream code depends on its exact expectation.
        critical: bool,
    },
    /// A decision point owned by one player.
    Decision {
        /// Index of the acting player.
        player: usize,
        /// Decision-point index, keying the information-set record.
        decision: usize,
        /// Number of available actions; action ids are `0..actions`.
        actions: u8,
    },
    /// End of the game, with one utility per player.
    Terminal {
        /// Final utility for each player.
        utilities: Vec<f64>,
    },
}

impl GameNode {
    /// Number of actions available at this node (0 for terminals).
    pub fn action_count(&self) -> usize {
        match self {
            GameNode::Chance { probabilities, .. } => probabilities.len(),
            GameNode::Decision { actions, .. } => *actions as usize,
            GameNode::Terminal { .. } => 0,
        }
    }

    /// True when the chance probability vector is a valid distribution.
    ///
    /// Debug-asserted by the traversal engine at every chance node.
    pub fn chance_probabilities_valid(&self) -> bool {
        match self {
            GameNode::Chance { probabilities, .. } => {
                let sum: f64 = probabilities.iter().sum();
                probabilities.iter().all(|&p| p >= 0.0) && (sum - 1.0).abs() < 1e-9
            }
            _ => true,
        }
    }
}
