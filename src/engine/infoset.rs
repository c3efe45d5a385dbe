//! Per-decision-point statistics accumulator.
//!
//! One [`InfoSet`] record exists per decision point and lives for the whole
//! run. Within a single iteration several concurrent branches of the tree
//! can target the same record (a player may reach the same information set
//! via different histories), so every accumulator cell is an [`AtomicF64`]
//! and all increments are atomic adds.
//!
//! The record exposes the full family of strategy-derivation policies:
//! regret matching (plus epsilon-exploration and pruned variants), hedge,
//! and multiplicative weights. Hedge and multiplicative weights are driven
//! by a staged "last regret" accumulator that is applied atomically through
//! an explicit [`begin_update`](InfoSet::begin_update) /
//! [`end_update`](InfoSet::end_update) bracket once the whole information
//! set's regrets for the iteration are known.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Floor applied to any reach or sampling probability before it is used as
/// a divisor, so inverse probabilities cannot overflow.
pub const MIN_REACH_PROBABILITY: f64 = 1e-12;

/// Clamp a probability to the representable floor before division.
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    p.max(MIN_REACH_PROBABILITY)
}

/// An `f64` cell supporting lock-free atomic addition.
///
/// Stored as raw bits in an `AtomicU64`; `add` retries a compare-exchange
/// loop. All orderings are relaxed: the cells are pure numeric accumulators
/// with no cross-cell invariants inside an iteration.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// New cell holding `value`.
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Current value.
    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Overwrite the value. Only used between iterations (discounting,
    /// snapshot restore), never concurrently with `add`.
    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed)
    }

    /// Atomically add `delta`.
    #[inline]
    pub fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

fn cells(len: usize, value: f64) -> Vec<AtomicF64> {
    (0..len).map(|_| AtomicF64::new(value)).collect()
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

fn normalized_or_uniform(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter().map(|&w| w / sum).collect()
    } else {
        uniform(weights.len())
    }
}

/// Long-lived accumulator for one decision point.
#[derive(Debug)]
pub struct InfoSet {
    /// Cumulative counterfactual regret per action.
    regret: Vec<AtomicF64>,
    /// Bootstrap regret written during exploratory iterations; consulted
    /// only while the primary accumulator has never been written.
    backup_regret: Vec<AtomicF64>,
    /// Cumulative strategy weight per action.
    strategy: Vec<AtomicF64>,
    /// Regret staged inside a begin/end update bracket (hedge, MW).
    last_regret: Vec<AtomicF64>,
    /// Cumulative exponential-weights score (hedge).
    hedge_score: Vec<AtomicF64>,
    /// Cumulative multiplicative weight, starting at 1.
    mw_weight: Vec<AtomicF64>,
    /// Best-response numerator: sum of weight * value per action.
    br_numer: Vec<AtomicF64>,
    /// Best-response denominator: sum of weight per action.
    br_denom: Vec<AtomicF64>,
    /// Argmax action from the most recent best-response pass.
    best_response_action: AtomicU8,
    /// True once the primary regret accumulator has been written.
    touched: AtomicBool,
}

impl InfoSet {
    /// Fresh record for a decision point with `actions` actions.
    pub fn new(actions: u8) -> Self {
        let n = actions as usize;
        Self {
            regret: cells(n, 0.0),
            backup_regret: cells(n, 0.0),
            strategy: cells(n, 0.0),
            last_regret: cells(n, 0.0),
            hedge_score: cells(n, 0.0),
            mw_weight: cells(n, 1.0),
            br_numer: cells(n, 0.0),
            br_denom: cells(n, 0.0),
            best_response_action: AtomicU8::new(0),
            touched: AtomicBool::new(false),
        }
    }

    /// Number of actions at this decision point.
    pub fn action_count(&self) -> usize {
        self.regret.len()
    }

    // ------------------------------------------------------------------
    // Accumulation
    // ------------------------------------------------------------------

    /// Atomically add regret for one action. With `backup_only` the amount
    /// goes to the bootstrap accumulator instead of the primary one.
    pub fn add_regret(&self, action: usize, amount: f64, backup_only: bool) {
        if backup_only {
            self.backup_regret[action].add(amount);
        } else {
            self.regret[action].add(amount);
            self.touched.store(true, Ordering::Relaxed);
        }
    }

    /// Atomically add cumulative strategy weight for one action.
    pub fn add_strategy(&self, action: usize, amount: f64) {
        self.strategy[action].add(amount);
    }

    /// Cumulative regret visible to strategy derivation: the primary
    /// accumulator once written, the bootstrap accumulator before that.
    pub fn effective_regret(&self, action: usize) -> f64 {
        if self.touched.load(Ordering::Relaxed) {
            self.regret[action].load()
        } else {
            self.backup_regret[action].load()
        }
    }

    /// Raw cumulative regret per action.
    pub fn cumulative_regret(&self) -> Vec<f64> {
        self.regret.iter().map(AtomicF64::load).collect()
    }

    /// Raw cumulative strategy weight per action.
    pub fn cumulative_strategy(&self) -> Vec<f64> {
        self.strategy.iter().map(AtomicF64::load).collect()
    }

    /// Sum of cumulative strategy weight over all actions.
    pub fn cumulative_strategy_total(&self) -> f64 {
        self.strategy.iter().map(AtomicF64::load).sum()
    }

    // ------------------------------------------------------------------
    // Strategy derivation
    // ------------------------------------------------------------------

    /// Current strategy by regret matching: probability proportional to
    /// positive cumulative regret, uniform when no regret is positive.
    pub fn regret_matching_probabilities(&self) -> Vec<f64> {
        let positive: Vec<f64> = (0..self.action_count())
            .map(|a| self.effective_regret(a).max(0.0))
            .collect();
        normalized_or_uniform(&positive)
    }

    /// Regret matching mixed with a uniform distribution by weight
    /// `epsilon`, forcing exploration.
    pub fn epsilon_adjusted_regret_matching_probabilities(&self, epsilon: f64) -> Vec<f64> {
        epsilon_mix(self.regret_matching_probabilities(), epsilon)
    }

    /// Pruned regret matching: actions whose cumulative regret does not
    /// exceed `threshold` get zero probability, as long as at least one
    /// action does. Uniform when none does.
    pub fn pruned_regret_matching_probabilities(&self, threshold: f64) -> Vec<f64> {
        let kept: Vec<f64> = (0..self.action_count())
            .map(|a| {
                let r = self.effective_regret(a);
                if r > threshold {
                    r.max(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        normalized_or_uniform(&kept)
    }

    /// Hedge strategy: softmax of the cumulative exponential-weights score
    /// at temperature `eta`.
    pub fn hedge_probabilities(&self, eta: f64) -> Vec<f64> {
        let scores: Vec<f64> = self.hedge_score.iter().map(AtomicF64::load).collect();
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = scores.iter().map(|&s| (eta * (s - max)).exp()).collect();
        normalized_or_uniform(&weights)
    }

    /// Hedge mixed with a uniform distribution by weight `epsilon`.
    pub fn epsilon_adjusted_hedge_probabilities(&self, eta: f64, epsilon: f64) -> Vec<f64> {
        epsilon_mix(self.hedge_probabilities(eta), epsilon)
    }

    /// Multiplicative-weights strategy: normalized cumulative weights.
    pub fn multiplicative_weights_probabilities(&self) -> Vec<f64> {
        let weights: Vec<f64> = self.mw_weight.iter().map(AtomicF64::load).collect();
        normalized_or_uniform(&weights)
    }

    /// Average strategy: normalized cumulative strategy weight, uniform
    /// until any mass has accumulated.
    pub fn average_strategy(&self) -> Vec<f64> {
        normalized_or_uniform(&self.cumulative_strategy())
    }

    // ------------------------------------------------------------------
    // Hedge / multiplicative-weights update bracket
    // ------------------------------------------------------------------

    /// Open an update bracket: clear the staged last-regret accumulator.
    ///
    /// Action-by-action regrets observed during the recursive sweep are
    /// staged with [`add_last_regret`](Self::add_last_regret) and applied
    /// in one step by [`end_update`](Self::end_update).
    pub fn begin_update(&self) {
        for cell in &self.last_regret {
            cell.store(0.0);
        }
    }

    /// Stage regret for one action inside the current bracket.
    pub fn add_last_regret(&self, action: usize, amount: f64) {
        self.last_regret[action].add(amount);
    }

    /// Close the bracket: fold the staged regrets into the hedge score and
    /// the multiplicative weights at learning rate `eta`.
    pub fn end_update(&self, eta: f64) {
        for a in 0..self.action_count() {
            let staged = self.last_regret[a].load();
            self.hedge_score[a].add(staged);
            let w = self.mw_weight[a].load() * (1.0 + eta * staged);
            self.mw_weight[a].store(w.max(MIN_REACH_PROBABILITY));
            self.last_regret[a].store(0.0);
        }
    }

    // ------------------------------------------------------------------
    // Best response
    // ------------------------------------------------------------------

    /// Clear the best-response accumulators.
    pub fn reset_best_response(&self) {
        for a in 0..self.action_count() {
            self.br_numer[a].store(0.0);
            self.br_denom[a].store(0.0);
        }
    }

    /// Accumulate one observation of `value` with reach `weight` for an
    /// action of the best-responding player.
    pub fn add_best_response(&self, action: usize, weight: f64, value: f64) {
        self.br_numer[action].add(weight * value);
        self.br_denom[action].add(weight);
    }

    /// Average best-response value of one action, or `None` if unobserved.
    pub fn best_response_value(&self, action: usize) -> Option<f64> {
        let denom = self.br_denom[action].load();
        if denom > 0.0 {
            Some(self.br_numer[action].load() / denom)
        } else {
            None
        }
    }

    /// Pick and record the argmax action of the accumulated averages.
    pub fn resolve_best_response(&self) -> u8 {
        let mut best = 0usize;
        let mut best_value = f64::NEG_INFINITY;
        for a in 0..self.action_count() {
            if let Some(v) = self.best_response_value(a) {
                if v > best_value {
                    best_value = v;
                    best = a;
                }
            }
        }
        self.best_response_action.store(best as u8, Ordering::Relaxed);
        best as u8
    }

    /// Argmax action from the most recent best-response pass.
    pub fn last_best_response_action(&self) -> u8 {
        self.best_response_action.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Apply one iteration's discount triple: `positive`/`negative` scale
    /// positive and negative cumulative regret, `strategy` scales the
    /// cumulative strategy weight. Runs between iterations, never
    /// concurrently with traversals.
    pub fn discount(&self, positive: f64, negative: f64, strategy: f64) {
        for cell in self.regret.iter().chain(self.backup_regret.iter()) {
            let r = cell.load();
            cell.store(if r > 0.0 { r * positive } else { r * negative });
        }
        for cell in &self.strategy {
            cell.store(cell.load() * strategy);
        }
    }

    /// Copy of every accumulator a rollback must revert: regret, bootstrap
    /// regret, strategy, hedge score, multiplicative weight, touched.
    pub(crate) fn state(&self) -> InfoSetState {
        InfoSetState {
            regret: self.cumulative_regret(),
            backup_regret: self.backup_regret.iter().map(AtomicF64::load).collect(),
            strategy: self.cumulative_strategy(),
            hedge_score: self.hedge_score.iter().map(AtomicF64::load).collect(),
            mw_weight: self.mw_weight.iter().map(AtomicF64::load).collect(),
            touched: self.touched.load(Ordering::Relaxed),
        }
    }

    /// Restore state captured by [`state`](Self::state).
    pub(crate) fn restore(&self, state: &InfoSetState) {
        let pairs = [
            (&self.regret, &state.regret),
            (&self.backup_regret, &state.backup_regret),
            (&self.strategy, &state.strategy),
            (&self.hedge_score, &state.hedge_score),
            (&self.mw_weight, &state.mw_weight),
        ];
        for (cells, values) in pairs {
            for (cell, &v) in cells.iter().zip(values) {
                cell.store(v);
            }
        }
        self.touched.store(state.touched, Ordering::Relaxed);
    }

    /// Overwrite the persistent accumulators from a checkpoint. The
    /// transient accumulators (bootstrap regret, hedge score,
    /// multiplicative weights, staged regret) restart fresh: they are not
    /// part of the persisted state.
    pub(crate) fn load(&self, regret: &[f64], strategy: &[f64]) {
        for (cell, &v) in self.regret.iter().zip(regret) {
            cell.store(v);
        }
        for (cell, &v) in self.strategy.iter().zip(strategy) {
            cell.store(v);
        }
        for cell in self.backup_regret.iter().chain(&self.last_regret) {
            cell.store(0.0);
        }
        for cell in &self.hedge_score {
            cell.store(0.0);
        }
        for cell in &self.mw_weight {
            cell.store(1.0);
        }
        self.touched
            .store(regret.iter().any(|&v| v != 0.0), Ordering::Relaxed);
    }
}

/// Full accumulator state of one record, the unit of a table snapshot.
#[derive(Debug, Clone)]
pub(crate) struct InfoSetState {
    regret: Vec<f64>,
    backup_regret: Vec<f64>,
    strategy: Vec<f64>,
    hedge_score: Vec<f64>,
    mw_weight: Vec<f64>,
    touched: bool,
}

/// Mix a distribution with the uniform distribution by weight `epsilon`.
pub fn epsilon_mix(mut probabilities: Vec<f64>, epsilon: f64) -> Vec<f64> {
    let u = 1.0 / probabilities.len() as f64;
    for p in probabilities.iter_mut() {
        *p = (1.0 - epsilon) * *p + epsilon * u;
    }
    probabilities
}
