//! The solver engine: accumulator storage, the traversal family, best
//! response, and the iteration scheduler.
//!
//! Games plug in through the [`GameTree`](tree::GameTree) trait; everything
//! here is generic over it. The usual entry point is
//! [`Trainer`](scheduler::Trainer), which owns a [`RegretTable`] sized for
//! the game and drives the configured update rule.

pub mod average_sampling;
pub mod best_response;
pub mod config;
pub mod diagnostics;
pub mod infoset;
pub mod node;
pub mod probing;
pub mod rng;
pub mod scheduler;
pub mod table;
pub mod tree;
pub mod vanilla;

pub use config::{Algorithm, SolverConfig, SolverError, SolverResult};
pub use infoset::InfoSet;
pub use node::GameNode;
pub use scheduler::{Report, Trainer};
pub use table::RegretTable;
pub use tree::GameTree;

/// Reject non-finite terminal utilities. A NaN or infinite payoff means the
/// game definition is broken and any regrets derived from it are garbage,
/// so traversal aborts instead of letting the poison spread.
pub(crate) fn check_finite(utilities: &[f64]) -> SolverResult<()> {
    for (player, &u) in utilities.iter().enumerate() {
        if !u.is_finite() {
            return Err(SolverError::NonFiniteUtility { player });
        }
    }
    Ok(())
}

/// Counterfactual reach weight for `player`: the chance reach times every
/// other player's reach contribution.
pub(crate) fn counterfactual_weight(reach: &[f64], chance_reach: f64, player: usize) -> f64 {
    let opponents: f64 = reach
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != player)
        .map(|(_, &r)| r)
        .product();
    chance_reach * opponents
}
