//! The shared accumulator table: one [`InfoSet`] per decision point,
//! indexed by the stable decision id the game definition assigns.
//!
//! The table is the only mutable state shared between concurrent branches
//! of a traversal; all mutation goes through the atomic cells of the
//! records. Snapshots support the scheduler's simulated-annealing rollback,
//! and the serde export mirrors the strategy-persistence interface.

use serde::{Deserialize, Serialize};

use crate::engine::config::{SolverError, SolverResult};
use crate::engine::infoset::{InfoSet, InfoSetState};
use crate::engine::tree::GameTree;

/// Decision-indexed array of information-set records.
#[derive(Debug)]
pub struct RegretTable {
    infosets: Vec<InfoSet>,
}

impl RegretTable {
    /// Fresh table sized to a game's decision metadata.
    pub fn for_tree<T: GameTree>(tree: &T) -> Self {
        let infosets = (0..tree.num_decisions())
            .map(|d| InfoSet::new(tree.action_count(d)))
            .collect();
        Self { infosets }
    }

    /// Fresh table from explicit per-decision action counts.
    pub fn from_action_counts(counts: &[u8]) -> Self {
        Self {
            infosets: counts.iter().map(|&n| InfoSet::new(n)).collect(),
        }
    }

    /// The record for a decision point.
    #[inline]
    pub fn infoset(&self, decision: usize) -> &InfoSet {
        &self.infosets[decision]
    }

    /// Number of decision points.
    pub fn len(&self) -> usize {
        self.infosets.len()
    }

    /// True when the table has no decision points.
    pub fn is_empty(&self) -> bool {
        self.infosets.is_empty()
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = &InfoSet> {
        self.infosets.iter()
    }

    /// Apply one iteration's discount triple to every record.
    pub fn discount(&self, positive: f64, negative: f64, strategy: f64) {
        if positive == 1.0 && negative == 1.0 && strategy == 1.0 {
            return;
        }
        for info in &self.infosets {
            info.discount(positive, negative, strategy);
        }
    }

    /// Capture the full accumulator state of every record.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            entries: self.infosets.iter().map(InfoSet::state).collect(),
        }
    }

    /// Roll every record back to a snapshot taken on this table.
    pub fn restore(&self, snapshot: &TableSnapshot) {
        for (info, state) in self.infosets.iter().zip(&snapshot.entries) {
            info.restore(state);
        }
    }

    /// Serializable copy of the persistent accumulators.
    pub fn export(&self) -> TableExport {
        TableExport {
            regret: self.infosets.iter().map(InfoSet::cumulative_regret).collect(),
            strategy: self
                .infosets
                .iter()
                .map(InfoSet::cumulative_strategy)
                .collect(),
        }
    }

    /// Restore accumulators from an export. The export must match this
    /// table's decision metadata.
    pub fn import(&self, data: &TableExport) -> SolverResult<()> {
        for (decision, info) in self.infosets.iter().enumerate() {
            let expected = info.action_count();
            let regret = data.regret.get(decision);
            let strategy = data.strategy.get(decision);
            match (regret, strategy) {
                (Some(r), Some(s)) if r.len() == expected && s.len() == expected => {
                    info.load(r, s);
                }
                _ => {
                    let found = regret
                        .filter(|r| r.len() != expected)
                        .or_else(|| strategy.filter(|s| s.len() != expected))
                        .map_or(0, |v| v.len());
                    return Err(SolverError::CheckpointShape {
                        decision,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}

/// In-memory rollback point for simulated annealing.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    entries: Vec<InfoSetState>,
}

/// Serializable accumulator state, the unit of checkpoint persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableExport {
    /// Cumulative regret per decision per action.
    pub regret: Vec<Vec<f64>>,
    /// Cumulative strategy weight per decision per action.
    pub strategy: Vec<Vec<f64>>,
}
