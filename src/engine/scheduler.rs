//! The iteration scheduler: drives the configured update rule, applies
//! discounting between iterations, and emits best-response checkpoint
//! reports. Owns the game and the accumulator table for the length of a
//! run.

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::average_sampling::AverageSamplingCfr;
use crate::engine::best_response::exploitability;
use crate::engine::config::{Algorithm, SolverConfig, SolverError, SolverResult};
use crate::engine::probing::{ProbingCfr, ProbingVariant};
use crate::engine::rng::decision_rng;
use crate::engine::table::{RegretTable, TableExport, TableSnapshot};
use crate::engine::tree::GameTree;
use crate::engine::vanilla::VanillaCfr;

/// Salt separating the annealing acceptance draws from traversal RNG.
const ANNEALING_SALT: u64 = 0x41c6_0e2b_7d93_f584;

/// One best-response checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Iteration the checkpoint was taken at.
    pub iteration: u64,
    /// Human-readable checkpoint description.
    pub caption: String,
    /// Average per-player gap between best response and average strategy.
    pub exploitability: f64,
    /// Best-response value per player.
    pub best_response_values: Vec<f64>,
    /// Wall-clock seconds since the run started.
    pub elapsed_seconds: f64,
}

/// Serializable run state: accumulators plus the iteration counter, so a
/// run can resume where a checkpoint left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverState {
    /// Iterations completed when the state was exported.
    pub iteration: u64,
    /// Accumulator contents.
    pub table: TableExport,
}

struct AnnealingState {
    snapshot: TableSnapshot,
    exploitability: f64,
}

/// Drives iterations of the configured update rule over one game.
pub struct Trainer<T: GameTree> {
    tree: T,
    config: SolverConfig,
    table: RegretTable,
    iteration: u64,
    annealing: Option<AnnealingState>,
}

impl<T: GameTree> Trainer<T> {
    /// Validate the configuration and size a fresh accumulator table for
    /// the game.
    pub fn new(tree: T, config: SolverConfig) -> SolverResult<Self> {
        config.validate()?;
        if config.algorithm.two_player_only() && tree.num_players() != 2 {
            return Err(SolverError::UnsupportedPlayerCount {
                variant: config.algorithm,
                players: tree.num_players(),
            });
        }
        let table = RegretTable::for_tree(&tree);
        Ok(Self {
            tree,
            config,
            table,
            iteration: 0,
            annealing: None,
        })
    }

    /// Resolve a named option set and run it to completion.
    pub fn run_algorithm(tree: T, name: &str) -> SolverResult<(Self, Vec<Report>)> {
        let config = SolverConfig::named(name)?;
        let mut trainer = Self::new(tree, config)?;
        let reports = trainer.run()?;
        Ok((trainer, reports))
    }

    /// The game being solved.
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// The accumulator table.
    pub fn table(&self) -> &RegretTable {
        &self.table
    }

    /// The active configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Run the remaining iterations, collecting checkpoint reports.
    pub fn run(&mut self) -> SolverResult<Vec<Report>> {
        self.run_with_observer(|_| {})
    }

    /// Run the remaining iterations, invoking `observer` at every
    /// checkpoint as well as collecting the reports.
    pub fn run_with_observer<F>(&mut self, mut observer: F) -> SolverResult<Vec<Report>>
    where
        F: FnMut(&Report) + Send,
    {
        let mut reports = Vec::new();
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| SolverError::ThreadPool(e.to_string()))?;
                pool.install(|| self.run_loop(&mut observer, &mut reports))?;
            }
            None => self.run_loop(&mut observer, &mut reports)?,
        }
        Ok(reports)
    }

    fn run_loop<F>(&mut self, observer: &mut F, reports: &mut Vec<Report>) -> SolverResult<()>
    where
        F: FnMut(&Report),
    {
        let start = Instant::now();
        let interval = self.config.checkpoint_interval;
        for iteration in self.iteration + 1..=self.config.iterations {
            self.iteration = iteration;
            for player in 0..self.tree.num_players() {
                self.run_player(iteration, player)?;
            }
            let (positive, negative, strategy) = self.config.discount_factors(iteration);
            self.table.discount(positive, negative, strategy);

            let last = iteration == self.config.iterations;
            if last || (interval > 0 && iteration % interval == 0) {
                let report = self.checkpoint(iteration, &start)?;
                observer(&report);
                reports.push(report);
            }
        }
        Ok(())
    }

    fn run_player(&self, iteration: u64, player: usize) -> SolverResult<()> {
        match self.config.algorithm {
            Algorithm::Vanilla | Algorithm::VanillaPruning => {
                VanillaCfr::new(&self.tree, &self.table, &self.config).iterate(player)?;
            }
            Algorithm::AverageStrategySampling => {
                AverageSamplingCfr::new(&self.tree, &self.table, &self.config, iteration)
                    .iterate(player)?;
            }
            Algorithm::Exploratory => self.run_probing(ProbingVariant::Exploratory, iteration, player)?,
            Algorithm::Gibson => self.run_probing(ProbingVariant::Gibson, iteration, player)?,
            Algorithm::ModifiedGibson => {
                self.run_probing(ProbingVariant::ModifiedGibson, iteration, player)?
            }
            Algorithm::Hedge => self.run_probing(ProbingVariant::Hedge, iteration, player)?,
        }
        Ok(())
    }

    fn run_probing(
        &self,
        variant: ProbingVariant,
        iteration: u64,
        player: usize,
    ) -> SolverResult<()> {
        ProbingCfr::new(&self.tree, &self.table, variant, &self.config, iteration)
            .iterate(player)?;
        Ok(())
    }

    fn checkpoint(&mut self, iteration: u64, start: &Instant) -> SolverResult<Report> {
        let (gap, best_response_values) = exploitability(&self.tree, &self.table)?;
        let mut caption = format!("iteration {iteration}/{}", self.config.iterations);

        if let Some(temperature) = self.config.annealing_temperature {
            let keep = match &self.annealing {
                Some(previous) if gap > previous.exploitability => {
                    // Metropolis acceptance of a worsened checkpoint.
                    let delta = gap - previous.exploitability;
                    let mut rng =
                        decision_rng(self.config.seed ^ ANNEALING_SALT, iteration, 0, 0);
                    rng.gen::<f64>() < (-delta / temperature).exp()
                }
                _ => true,
            };
            if keep {
                self.annealing = Some(AnnealingState {
                    snapshot: self.table.snapshot(),
                    exploitability: gap,
                });
            } else if let Some(previous) = &self.annealing {
                self.table.restore(&previous.snapshot);
                caption.push_str(" (rolled back)");
            }
        }

        Ok(Report {
            iteration,
            caption,
            exploitability: gap,
            best_response_values,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Serializable copy of the run state.
    pub fn export_state(&self) -> SolverState {
        SolverState {
            iteration: self.iteration,
            table: self.table.export(),
        }
    }

    /// Restore a run from exported state; a following [`run`](Self::run)
    /// continues at the next iteration.
    pub fn import_state(&mut self, state: &SolverState) -> SolverResult<()> {
        self.table.import(&state.table)?;
        self.iteration = state.iteration;
        self.annealing = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diagnostics;
    use crate::engine::node::GameNode;
    use crate::games::kuhn::Kuhn;
    use crate::games::matching_pennies::MatchingPennies;
    use approx::assert_relative_eq;

    #[test]
    fn vanilla_solves_kuhn() {
        let config = SolverConfig::default().with_iterations(10_000);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();

        let last = reports.last().unwrap();
        assert!(
            last.exploitability < 0.01,
            "exploitability {} too high",
            last.exploitability
        );
        assert_eq!(last.best_response_values.len(), 2);

        // Known game value: the first player loses 1/18 per hand.
        let tracks = diagnostics::evaluate(trainer.tree(), trainer.table(), 0).unwrap();
        assert_relative_eq!(tracks.average, -1.0 / 18.0, epsilon = 0.01);
    }

    #[test]
    fn pruning_variant_solves_kuhn() {
        let config = SolverConfig::named("cfr-br").unwrap().with_iterations(2_000);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();
        assert!(reports.last().unwrap().exploitability < 0.05);
    }

    #[test]
    fn discounting_solves_kuhn() {
        let config = SolverConfig::named("discounted")
            .unwrap()
            .with_iterations(2_000);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();
        assert!(reports.last().unwrap().exploitability < 0.02);
    }

    #[test]
    fn probing_reduces_exploitability() {
        for name in ["exploratory", "gibson", "modified-gibson"] {
            let config = SolverConfig::named(name)
                .unwrap()
                .with_iterations(20_000)
                .with_checkpoint_interval(0)
                .with_seed(5);
            let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
            let reports = trainer.run().unwrap();
            assert_eq!(reports.len(), 1);
            let gap = reports[0].exploitability;
            assert!(gap < 0.25, "{name} left exploitability {gap}");
        }
    }

    #[test]
    fn hedge_reduces_exploitability() {
        let config = SolverConfig::named("hedge")
            .unwrap()
            .with_iterations(5_000)
            .with_checkpoint_interval(0)
            .with_seed(5);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();
        assert!(reports[0].exploitability < 0.3);
    }

    #[test]
    fn average_sampling_reduces_exploitability() {
        let config = SolverConfig::named("average-sampling")
            .unwrap()
            .with_iterations(20_000)
            .with_checkpoint_interval(0)
            .with_seed(5);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();
        assert!(reports[0].exploitability < 0.25);
    }

    #[test]
    fn parallel_fanout_matches_sequential_run() {
        let base = SolverConfig::default().with_iterations(200);

        let mut sequential = Trainer::new(Kuhn::new(), base.clone().with_threads(1)).unwrap();
        sequential.run().unwrap();

        let mut parallel =
            Trainer::new(Kuhn::new(), base.with_max_parallel_depth(4)).unwrap();
        parallel.run().unwrap();

        for d in 0..sequential.table().len() {
            let a = sequential.table().infoset(d).average_strategy();
            let b = parallel.table().infoset(d).average_strategy();
            for (x, y) in a.iter().zip(&b) {
                assert_relative_eq!(x, y, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn annealing_run_completes() {
        let config = SolverConfig::default()
            .with_iterations(500)
            .with_checkpoint_interval(100)
            .with_annealing(0.1);
        let mut trainer = Trainer::new(Kuhn::new(), config).unwrap();
        let reports = trainer.run().unwrap();
        assert_eq!(reports.len(), 5);
    }

    #[test]
    fn run_algorithm_resolves_presets() {
        let (_, reports) = Trainer::run_algorithm(MatchingPennies, "vanilla").unwrap();
        assert!(!reports.is_empty());

        assert!(matches!(
            Trainer::run_algorithm(MatchingPennies, "no-such-set"),
            Err(SolverError::UnknownOptionSet(_))
        ));
    }

    #[test]
    fn state_round_trips_through_export() {
        let config = SolverConfig::default().with_iterations(500);
        let mut trainer = Trainer::new(Kuhn::new(), config.clone()).unwrap();
        trainer.run().unwrap();

        let json = serde_json::to_string(&trainer.export_state()).unwrap();
        let state: SolverState = serde_json::from_str(&json).unwrap();

        let mut resumed = Trainer::new(Kuhn::new(), config).unwrap();
        resumed.import_state(&state).unwrap();
        assert_eq!(resumed.iteration(), 500);
        for d in 0..trainer.table().len() {
            let a = trainer.table().infoset(d).average_strategy();
            let b = resumed.table().infoset(d).average_strategy();
            for (x, y) in a.iter().zip(&b) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }

    /// Trivial three-handed game used to exercise the player-count guard.
    struct ThreeHanded;

    impl GameTree for ThreeHanded {
        type Cursor = ();
        type Undo = ();

        fn num_players(&self) -> usize {
            3
        }

        fn num_decisions(&self) -> usize {
            0
        }

        fn action_count(&self, _decision: usize) -> u8 {
            0
        }

        fn root(&self) {}

        fn node(&self, _cursor: &()) -> GameNode {
            GameNode::Terminal {
                utilities: vec![0.0; 3],
            }
        }

        fn switch_to_branch(&self, _cursor: &mut (), _action: u8) {}

        fn reverse(&self, _cursor: &mut (), _undo: ()) {}
    }

    #[test]
    fn sampling_rules_reject_three_players() {
        let config = SolverConfig::named("gibson").unwrap();
        assert!(matches!(
            Trainer::new(ThreeHanded, config),
            Err(SolverError::UnsupportedPlayerCount { players: 3, .. })
        ));

        // Vanilla carries no two-player restriction.
        let mut trainer = Trainer::new(ThreeHanded, SolverConfig::default().with_iterations(1))
            .unwrap();
        trainer.run().unwrap();
    }

    /// A game whose terminal utility is NaN; any traversal must abort.
    struct PoisonedGame;

    impl GameTree for PoisonedGame {
        type Cursor = ();
        type Undo = ();

        fn num_players(&self) -> usize {
            2
        }

        fn num_decisions(&self) -> usize {
            0
        }

        fn action_count(&self, _decision: usize) -> u8 {
            0
        }

        fn root(&self) {}

        fn node(&self, _cursor: &()) -> GameNode {
            GameNode::Terminal {
                utilities: vec![f64::NAN, 0.0],
            }
        }

        fn switch_to_branch(&self, _cursor: &mut (), _action: u8) {}

        fn reverse(&self, _cursor: &mut (), _undo: ()) {}
    }

    #[test]
    fn non_finite_utilities_abort_the_run() {
        let mut trainer =
            Trainer::new(PoisonedGame, SolverConfig::default().with_iterations(1)).unwrap();
        assert!(matches!(
            trainer.run(),
            Err(SolverError::NonFiniteUtility { player: 0 })
        ));
    }
}
