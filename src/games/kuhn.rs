//! Kuhn poker: the standard 3-card validation game.
//!
//! Both players ante 1. Chance deals one of six ordered (P0, P1) card
//! pairs from {J, Q, K}, then at most three betting actions follow with a
//! fixed bet size of 1. Action 0 is check/fold, action 1 is bet/call.
//!
//! The equilibrium is known in closed form, which makes the game the main
//! end-to-end check: the first player's value is -1/18, the jack bluffs
//! with some probability `alpha <= 1/3`, the king bets `3 * alpha`, and
//! the queen always checks first to act.

use rustc_hash::FxHashMap;

use crate::engine::node::GameNode;
use crate::engine::tree::GameTree;

/// Ordered (P0 card, P1 card) deals, each with probability 1/6.
const DEALS: [(u8, u8); 6] = [(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)];

const CARD_NAMES: [&str; 3] = ["J", "Q", "K"];

/// Betting histories at which a player acts, in decision-index order.
const DECISION_HISTORIES: [&str; 4] = ["", "p", "b", "pb"];

/// The Kuhn poker game definition.
pub struct Kuhn {
    /// Decision index -> "card:history" label, for reporting.
    labels: FxHashMap<usize, String>,
}

impl Default for Kuhn {
    fn default() -> Self {
        Self::new()
    }
}

impl Kuhn {
    /// Build the game and its decision labels.
    pub fn new() -> Self {
        let mut labels = FxHashMap::default();
        labels.insert(0, "deal".to_string());
        for card in 0..3 {
            for (h, history) in DECISION_HISTORIES.iter().enumerate() {
                let label = if history.is_empty() {
                    CARD_NAMES[card].to_string()
                } else {
                    format!("{}:{}", CARD_NAMES[card], history)
                };
                labels.insert(Self::decision_index(card as u8, h), label);
            }
        }
        Self { labels }
    }

    /// Human-readable label for a decision index.
    pub fn decision_label(&self, decision: usize) -> &str {
        self.labels
            .get(&decision)
            .map(String::as_str)
            .unwrap_or("?")
    }

    /// Decision index for a card and a betting-history slot.
    fn decision_index(card: u8, history: usize) -> usize {
        1 + card as usize * DECISION_HISTORIES.len() + history
    }

    /// Terminal payoff for player 0, if the history is terminal.
    fn payoff(cards: (u8, u8), history: &[u8]) -> Option<f64> {
        let showdown = |amount: f64| {
            if cards.0 > cards.1 {
                amount
            } else {
                -amount
            }
        };
        match history {
            [0, 0] => Some(showdown(1.0)),
            [1, 0] => Some(1.0),
            [1, 1] => Some(showdown(2.0)),
            [0, 1, 0] => Some(-1.0),
            [0, 1, 1] => Some(showdown(2.0)),
            _ => None,
        }
    }
}

/// Position in the Kuhn tree: the deal plus the betting history.
#[derive(Debug, Clone, Default)]
pub struct KuhnCursor {
    deal: Option<u8>,
    history: Vec<u8>,
}

impl GameTree for Kuhn {
    type Cursor = KuhnCursor;
    type Undo = ();

    fn num_players(&self) -> usize {
        2
    }

    fn num_decisions(&self) -> usize {
        1 + 3 * DECISION_HISTORIES.len()
    }

    fn action_count(&self, decision: usize) -> u8 {
        if decision == 0 {
            DEALS.len() as u8
        } else {
            2
        }
    }

    fn root(&self) -> KuhnCursor {
        KuhnCursor::default()
    }

    fn node(&self, cursor: &KuhnCursor) -> GameNode {
        let deal = match cursor.deal {
            None => {
                return GameNode::Chance {
                    decision: 0,
                    probabilities: vec![1.0 / 6.0; DEALS.len()],
                    critical: false,
                }
            }
            Some(deal) => DEALS[deal as usize],
        };

        if let Some(u) = Self::payoff(deal, &cursor.history) {
            return GameNode::Terminal {
                utilities: vec![u, -u],
            };
        }

        // Which history slot and which player's card the decision keys on.
        let (player, card, history) = match cursor.history.as_slice() {
            [] => (0, deal.0, 0),
            [0] => (1, deal.1, 1),
            [1] => (1, deal.1, 2),
            [0, 1] => (0, deal.0, 3),
            other => unreachable!("non-terminal history {other:?}"),
        };
        GameNode::Decision {
            player,
            decision: Self::decision_index(card, history),
            actions: 2,
        }
    }

    fn switch_to_branch(&self, cursor: &mut KuhnCursor, action: u8) {
        if cursor.deal.is_none() {
            cursor.deal = Some(action);
        } else {
            cursor.history.push(action);
        }
    }

    fn reverse(&self, cursor: &mut KuhnCursor, _undo: ()) {
        if cursor.history.pop().is_none() {
            cursor.deal = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_terminals(game: &Kuhn, cursor: &mut KuhnCursor) -> usize {
        match game.node(cursor) {
            GameNode::Terminal { utilities } => {
                assert_eq!(utilities[0], -utilities[1]);
                1
            }
            GameNode::Chance { probabilities, .. } => (0..probabilities.len())
                .map(|a| {
                    let undo = game.switch_to_branch(cursor, a as u8);
                    let n = count_terminals(game, cursor);
                    game.reverse(cursor, undo);
                    n
                })
                .sum(),
            GameNode::Decision {
                decision, actions, ..
            } => {
                assert!(decision > 0 && decision < game.num_decisions());
                (0..actions)
                    .map(|a| {
                        let undo = game.switch_to_branch(cursor, a);
                        let n = count_terminals(game, cursor);
                        game.reverse(cursor, undo);
                        n
                    })
                    .sum()
            }
        }
    }

    #[test]
    fn tree_has_thirty_terminals() {
        let game = Kuhn::new();
        let mut cursor = game.root();
        // 6 deals, 5 terminal betting lines each.
        assert_eq!(count_terminals(&game, &mut cursor), 30);
        // The walk restored the cursor to the root.
        assert!(matches!(game.node(&cursor), GameNode::Chance { .. }));
    }

    #[test]
    fn bet_fold_pays_the_bettor() {
        assert_eq!(Kuhn::payoff((0, 2), &[1, 0]), Some(1.0));
        assert_eq!(Kuhn::payoff((0, 2), &[0, 1, 0]), Some(-1.0));
        assert_eq!(Kuhn::payoff((2, 0), &[1, 1]), Some(2.0));
        assert_eq!(Kuhn::payoff((0, 1), &[0, 0]), Some(-1.0));
        assert_eq!(Kuhn::payoff((0, 1), &[0]), None);
    }

    #[test]
    fn decision_labels_cover_every_infoset() {
        let game = Kuhn::new();
        for d in 0..game.num_decisions() {
            assert_ne!(game.decision_label(d), "?");
        }
        assert_eq!(game.decision_label(1), "J");
        assert_eq!(game.decision_label(Kuhn::decision_index(2, 3)), "K:pb");
    }
}
