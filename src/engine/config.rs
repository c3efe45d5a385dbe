//! Solver configuration, named option sets, and the error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by solver construction, configuration, or traversal.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The chosen update rule is proven for two-player zero-sum only.
    #[error("update rule {variant:?} supports exactly 2 players, game has {players}")]
    UnsupportedPlayerCount {
        /// The configured update rule.
        variant: Algorithm,
        /// Player count reported by the game definition.
        players: usize,
    },

    /// `run_algorithm` was given a name no preset matches.
    #[error("unknown option set: {0:?}")]
    UnknownOptionSet(String),

    /// A configuration parameter is outside its valid range.
    #[error("{parameter} = {value} is out of range {range}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The configured value.
        value: f64,
        /// Human-readable valid range.
        range: &'static str,
    },

    /// A terminal utility evaluated to NaN or infinity. This indicates a
    /// game-definition bug upstream and aborts the run.
    #[error("non-finite terminal utility for player {player}")]
    NonFiniteUtility {
        /// Player whose utility was non-finite.
        player: usize,
    },

    /// An imported checkpoint does not match the game's decision metadata.
    #[error("checkpoint shape mismatch at decision {decision}: expected {expected} actions, found {found}")]
    CheckpointShape {
        /// Decision point index.
        decision: usize,
        /// Action count per the game definition.
        expected: usize,
        /// Action count in the imported data.
        found: usize,
    },

    /// The worker thread pool could not be constructed.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

/// Convenience alias used throughout the engine.
pub type SolverResult<T> = Result<T, SolverError>;

/// The update-rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Full-tree CFR: exact enumeration in both directions.
    Vanilla,
    /// Vanilla with zero-probability opponent branches pruned (CFR-BR).
    VanillaPruning,
    /// Probing variant routing exploratory-iteration regret to the backup
    /// accumulator.
    Exploratory,
    /// Probing variant with plain regret matching, no backup routing.
    Gibson,
    /// Probing variant deriving strategies by pruned regret matching, with
    /// backup routing.
    ModifiedGibson,
    /// Probing variant on hedge (exponential weights), exploring every
    /// iteration.
    Hedge,
    /// Average-strategy sampling: per-action explore probabilities driven
    /// by the cumulative strategy.
    AverageStrategySampling,
}

impl Algorithm {
    /// Whether convergence is proven only for two-player zero-sum games.
    pub fn two_player_only(self) -> bool {
        !matches!(self, Algorithm::Vanilla)
    }

    /// Whether this is one of the one-sample probing rules.
    pub fn is_probing(self) -> bool {
        matches!(
            self,
            Algorithm::Exploratory
                | Algorithm::Gibson
                | Algorithm::ModifiedGibson
                | Algorithm::Hedge
        )
    }
}

/// Configuration for a solver run.
///
/// Build with the `with_*` methods or resolve a named preset via
/// [`SolverConfig::named`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Update rule to run.
    pub algorithm: Algorithm,

    /// Total number of iterations.
    pub iterations: u64,

    /// Iterations between best-response checkpoints. 0 = final only.
    pub checkpoint_interval: u64,

    /// Exponent `alpha` of the positive-regret discount `t^a / (t^a + 1)`.
    /// `None` disables discounting of positive regret.
    pub positive_discount_exponent: Option<f64>,

    /// Exponent `beta` of the negative-regret discount `t^b / (t^b + 1)`.
    pub negative_discount_exponent: Option<f64>,

    /// Exponent `gamma` of the strategy-weight discount `(t / (t+1))^g`.
    pub strategy_discount_exponent: Option<f64>,

    /// Forced-exploration epsilon at the first iteration.
    pub epsilon_first: f64,

    /// Forced-exploration epsilon after the ramp completes.
    pub epsilon_last: f64,

    /// Proportion of the run over which epsilon interpolates from first to
    /// last.
    pub epsilon_fraction: f64,

    /// Cadence of exploratory iterations for the Exploratory/Gibson family:
    /// iteration `t` is exploratory when `t % period == 0`. 0 disables.
    pub exploration_period: u64,

    /// Regret threshold below which pruned regret matching zeroes an action
    /// (ModifiedGibson).
    pub prune_threshold: f64,

    /// Hedge learning-rate scale; the per-iteration rate is
    /// `hedge_eta / sqrt(t)`.
    pub hedge_eta: f64,

    /// Bonus term `beta` of the average-strategy-sampling explore
    /// probability.
    pub sampling_bonus: f64,

    /// Threshold multiplier `tau` of the average-strategy-sampling explore
    /// probability.
    pub sampling_threshold: f64,

    /// Recursion depth up to which action branches fan out across worker
    /// threads; 0 keeps traversals sequential.
    pub max_parallel_depth: usize,

    /// Worker thread count. `None` uses all cores, `Some(1)` forces fully
    /// sequential execution.
    pub threads: Option<usize>,

    /// Base seed for the reproducible per-site RNG streams.
    pub seed: u64,

    /// Simulated-annealing temperature; when set, a checkpoint whose
    /// exploitability worsened rolls the accumulators back with probability
    /// `1 - exp(-delta / temperature)`.
    pub annealing_temperature: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Vanilla,
            iterations: 10_000,
            checkpoint_interval: 1_000,
            positive_discount_exponent: None,
            negative_discount_exponent: None,
            strategy_discount_exponent: None,
            epsilon_first: 0.6,
            epsilon_last: 0.05,
            epsilon_fraction: 0.7,
            exploration_period: 2,
            prune_threshold: 0.0,
            hedge_eta: 1.0,
            sampling_bonus: 1.0,
            sampling_threshold: 1.0,
            max_parallel_depth: 0,
            threads: None,
            seed: 0,
            annealing_temperature: None,
        }
    }
}

impl SolverConfig {
    /// Default configuration (vanilla CFR).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a named option set.
    ///
    /// Known names: `vanilla`, `cfr-br`, `discounted`, `exploratory`,
    /// `gibson`, `modified-gibson`, `hedge`, `average-sampling`.
    pub fn named(name: &str) -> SolverResult<Self> {
        let base = Self::default();
        let config = match name {
            "vanilla" => base,
            "cfr-br" => Self {
                algorithm: Algorithm::VanillaPruning,
                ..base
            },
            "discounted" => Self {
                positive_discount_exponent: Some(1.5),
                negative_discount_exponent: Some(0.5),
                strategy_discount_exponent: Some(2.0),
                ..base
            },
            "exploratory" => Self {
                algorithm: Algorithm::Exploratory,
                iterations: 100_000,
                checkpoint_interval: 10_000,
                ..base
            },
            "gibson" => Self {
                algorithm: Algorithm::Gibson,
                iterations: 100_000,
                checkpoint_interval: 10_000,
                ..base
            },
            "modified-gibson" => Self {
                algorithm: Algorithm::ModifiedGibson,
                iterations: 100_000,
                checkpoint_interval: 10_000,
                prune_threshold: 1.0,
                ..base
            },
            "hedge" => Self {
                algorithm: Algorithm::Hedge,
                iterations: 100_000,
                checkpoint_interval: 10_000,
                epsilon_first: 0.1,
                epsilon_last: 0.1,
                ..base
            },
            "average-sampling" => Self {
                algorithm: Algorithm::AverageStrategySampling,
                iterations: 100_000,
                checkpoint_interval: 10_000,
                epsilon_first: 0.05,
                epsilon_last: 0.05,
                ..base
            },
            _ => return Err(SolverError::UnknownOptionSet(name.to_string())),
        };
        Ok(config)
    }

    /// Builder method: set the update rule.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builder method: set the iteration count.
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Builder method: set the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Builder method: set the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method: set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Builder method: set the parallel fan-out depth bound.
    pub fn with_max_parallel_depth(mut self, depth: usize) -> Self {
        self.max_parallel_depth = depth;
        self
    }

    /// Builder method: set the epsilon ramp endpoints.
    pub fn with_epsilon(mut self, first: f64, last: f64) -> Self {
        self.epsilon_first = first;
        self.epsilon_last = last;
        self
    }

    /// Builder method: set the annealing temperature.
    pub fn with_annealing(mut self, temperature: f64) -> Self {
        self.annealing_temperature = Some(temperature);
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> SolverResult<()> {
        if self.iterations == 0 {
            return Err(SolverError::InvalidParameter {
                parameter: "iterations",
                value: 0.0,
                range: ">= 1",
            });
        }
        for (name, value) in [
            ("epsilon_first", self.epsilon_first),
            ("epsilon_last", self.epsilon_last),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SolverError::InvalidParameter {
                    parameter: name,
                    value,
                    range: "[0, 1]",
                });
            }
        }
        if !(self.epsilon_fraction > 0.0 && self.epsilon_fraction <= 1.0) {
            return Err(SolverError::InvalidParameter {
                parameter: "epsilon_fraction",
                value: self.epsilon_fraction,
                range: "(0, 1]",
            });
        }
        if self.hedge_eta <= 0.0 {
            return Err(SolverError::InvalidParameter {
                parameter: "hedge_eta",
                value: self.hedge_eta,
                range: "> 0",
            });
        }
        if self.sampling_bonus <= 0.0 {
            return Err(SolverError::InvalidParameter {
                parameter: "sampling_bonus",
                value: self.sampling_bonus,
                range: "> 0",
            });
        }
        if let Some(t) = self.annealing_temperature {
            if t <= 0.0 {
                return Err(SolverError::InvalidParameter {
                    parameter: "annealing_temperature",
                    value: t,
                    range: "> 0",
                });
            }
        }
        Ok(())
    }

    /// Per-iteration discount triple `(positive, negative, strategy)`.
    pub fn discount_factors(&self, iteration: u64) -> (f64, f64, f64) {
        let t = iteration as f64;
        let positive = match self.positive_discount_exponent {
            Some(a) => {
                let ta = t.powf(a);
                ta / (ta + 1.0)
            }
            None => 1.0,
        };
        let negative = match self.negative_discount_exponent {
            Some(b) => {
                let tb = t.powf(b);
                tb / (tb + 1.0)
            }
            None => 1.0,
        };
        let strategy = match self.strategy_discount_exponent {
            Some(g) => (t / (t + 1.0)).powf(g),
            None => 1.0,
        };
        (positive, negative, strategy)
    }

    /// Forced-exploration epsilon for an iteration: a monotone
    /// interpolation from `epsilon_first` to `epsilon_last` over the first
    /// `epsilon_fraction` of the run.
    pub fn epsilon(&self, iteration: u64) -> f64 {
        let ramp = (self.iterations as f64 * self.epsilon_fraction).max(1.0);
        let progress = ((iteration as f64 - 1.0) / ramp).clamp(0.0, 1.0);
        self.epsilon_first + (self.epsilon_last - self.epsilon_first) * progress
    }

    /// Whether an iteration is a designated exploratory iteration.
    pub fn is_exploratory(&self, iteration: u64) -> bool {
        self.exploration_period > 0 && iteration % self.exploration_period == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn named_presets_resolve() {
        for name in [
            "vanilla",
            "cfr-br",
            "discounted",
            "exploratory",
            "gibson",
            "modified-gibson",
            "hedge",
            "average-sampling",
        ] {
            let config = SolverConfig::named(name).unwrap();
            config.validate().unwrap();
        }
        assert!(matches!(
            SolverConfig::named("no-such-set"),
            Err(SolverError::UnknownOptionSet(_))
        ));
    }

    #[test]
    fn epsilon_interpolates_monotonically() {
        let config = SolverConfig {
            iterations: 1_000,
            epsilon_first: 0.6,
            epsilon_last: 0.1,
            epsilon_fraction: 0.5,
            ..Default::default()
        };
        assert_relative_eq!(config.epsilon(1), 0.6);
        let mid = config.epsilon(250);
        assert!(mid < 0.6 && mid > 0.1);
        assert_relative_eq!(config.epsilon(501), 0.1);
        assert_relative_eq!(config.epsilon(1_000), 0.1);
    }

    #[test]
    fn discount_factors_approach_one() {
        let config = SolverConfig::named("discounted").unwrap();
        let (p1, n1, s1) = config.discount_factors(1);
        let (p2, n2, s2) = config.discount_factors(1_000);
        assert!(p1 < p2 && p2 < 1.0);
        assert!(n1 < n2 && n2 < 1.0);
        assert!(s1 < s2 && s2 < 1.0);

        let plain = SolverConfig::default();
        assert_eq!(plain.discount_factors(5), (1.0, 1.0, 1.0));
    }

    #[test]
    fn validation_rejects_bad_ranges() {
        let bad = SolverConfig {
            epsilon_first: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SolverError::InvalidParameter {
                parameter: "epsilon_first",
                ..
            })
        ));

        let bad = SolverConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn exploratory_cadence() {
        let config = SolverConfig::default();
        assert!(config.is_exploratory(2));
        assert!(!config.is_exploratory(3));
        let off = SolverConfig {
            exploration_period: 0,
            ..Default::default()
        };
        assert!(!off.is_exploratory(2));
    }
}
