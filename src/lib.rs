//! # cfr-engine
//!
//! An equilibrium solver engine for extensive-form games built on
//! Counterfactual Regret Minimization (CFR).
//!
//! ## Features
//!
//! - **Generic game interface**: any game implementing [`GameTree`] with a
//!   reversible cursor plugs into every update rule
//! - **Update-rule family**: vanilla CFR, CFR-BR pruning, the one-sample
//!   probing variants (exploratory, Gibson, modified Gibson, hedge), and
//!   average-strategy sampling
//! - **Exact best response**: a depth-ordered two-pass calculator that
//!   handles information sets spanning several tree depths
//! - **Discounting and annealing**: DCFR-style per-iteration discounts and
//!   optional checkpoint rollback by simulated annealing
//! - **Deterministic sampling**: per-site seeded RNG streams make sampled
//!   runs reproducible under any thread schedule
//! - **Checkpointing**: serde export and import of the accumulator state
//!
//! ## Quick Start
//!
//! ```
//! use cfr_engine::engine::{SolverConfig, Trainer};
//! use cfr_engine::games::kuhn::Kuhn;
//!
//! let config = SolverConfig::default().with_iterations(1_000);
//! let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
//! let reports = trainer.run().unwrap();
//! assert!(reports.last().unwrap().exploitability < 0.1);
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: accumulators, traversals, best response, and the scheduler
//! - [`games`]: benchmark games with known equilibria

#![warn(missing_docs)]

pub mod engine;
pub mod games;

pub use engine::{
    Algorithm, GameNode, GameTree, InfoSet, RegretTable, Report, SolverConfig, SolverError,
    SolverResult, Trainer,
};
