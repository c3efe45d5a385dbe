//! Benchmark games with known equilibria, used to validate the engine.

pub mod coin;
pub mod kuhn;
pub mod matching_pennies;
