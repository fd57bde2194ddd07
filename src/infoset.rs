//! Canonical information-set keys.
//!
//! The key is an explicit byte string with a fixed grammar:
//! `<hole cards>|<board>|<street>/<street>/<street>/<street>`, cards as
//! two-character suit-rank tokens and actions as their abstraction
//! tokens. Hole cards are sorted by card id; the first three board cards
//! are revealed together and sorted, later ones keep their position.
//! Equal canonical inputs produce equal bytes, unequal inputs unequal
//! bytes, and no key contains a comma.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::abstraction::{AbstractAction, Abstraction};
use crate::cards::Card;
use crate::engine::{PublicState, RawAct};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InfoSetKey(String);

impl InfoSetKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for InfoSetKey {
    fn from(raw: String) -> InfoSetKey {
        InfoSetKey(raw)
    }
}

impl fmt::Display for InfoSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abstract actions taken so far, one list per street.
pub type StreetHistory = [Vec<AbstractAction>; 4];

/// Key for a Hold'em decision node as seen by the actor holding `hole`.
pub fn holdem_key(hole: &[Card; 2], board: &[Card], history: &StreetHistory) -> InfoSetKey {
    let mut hole = *hole;
    hole.sort();

    let mut board: Vec<Card> = board.to_vec();
    if board.len() >= 3 {
        board[..3].sort();
    }

    let mut key = String::new();
    for card in hole.iter() {
        key.push_str(&card.to_string());
    }
    key.push('|');
    for card in board.iter() {
        key.push_str(&card.to_string());
    }
    key.push('|');
    for (i, street) in history.iter().enumerate() {
        if i > 0 {
            key.push('/');
        }
        for action in street {
            key.push_str(&action.to_string());
        }
    }
    InfoSetKey(key)
}

/// Rebuilds the abstract street history from the engine's raw public
/// state, exactly as training produced it: blind posts seed the pot but
/// never appear in the history, calls and folds map directly, and raises
/// map to the nearest enabled pot fraction at the pot as of that action.
/// Only these mapped kinds touch the pot and stack accounting.
pub fn replay_history(public: &PublicState, abstraction: &Abstraction) -> StreetHistory {
    let mut history: StreetHistory = Default::default();
    let mut pot: u32 = 0;
    let mut pips = [0u32; 2];
    let mut stacks = public.starting_stacks;

    for (street, entries) in public.histories.iter().enumerate() {
        for entry in entries {
            let seat = entry.seat;
            match entry.act {
                RawAct::Blind(amount) => {
                    pot += amount;
                    pips[seat] += amount;
                    stacks[seat] -= amount;
                }
                RawAct::Fold => history[street].push(AbstractAction::Fold),
                RawAct::Call(cost) => {
                    history[street].push(AbstractAction::Call);
                    pot += cost;
                    pips[seat] += cost;
                    stacks[seat] -= cost;
                }
                RawAct::Raise(to) => {
                    let all_in = pips[seat] + stacks[seat];
                    history[street].push(abstraction.nearest(to, pot, all_in));
                    let cost = to - pips[seat];
                    pot += cost;
                    stacks[seat] -= cost;
                    pips[seat] = to;
                }
            }
        }
        pips = [0, 0];
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Card;
    use crate::engine::{HistoryEntry, Street};

    fn card(token: &str) -> Card {
        Card::parse(token).unwrap()
    }

    fn cards(tokens: &[&str]) -> Vec<Card> {
        tokens.iter().map(|t| card(t)).collect()
    }

    #[test]
    fn hole_and_flop_order_are_canonicalized() {
        let history: StreetHistory = Default::default();
        let a = holdem_key(
            &[card("HA"), card("SA")],
            &cards(&["H2", "C2", "D2", "S5"]),
            &history,
        );
        let b = holdem_key(
            &[card("SA"), card("HA")],
            &cards(&["D2", "H2", "C2", "S5"]),
            &history,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn the_turn_card_is_positional() {
        let history: StreetHistory = Default::default();
        let a = holdem_key(
            &[card("HA"), card("SA")],
            &cards(&["H2", "C2", "D2", "S5"]),
            &history,
        );
        let b = holdem_key(
            &[card("HA"), card("SA")],
            &cards(&["H2", "C2", "D2", "H5"]),
            &history,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn key_grammar_is_stable() {
        let mut history: StreetHistory = Default::default();
        history[0].push(AbstractAction::Call);
        history[0].push(AbstractAction::Call);
        history[1].push(AbstractAction::PotFraction(1));
        history[1].push(AbstractAction::Call);
        let key = holdem_key(
            &[card("SA"), card("HA")],
            &cards(&["H2", "C2", "D2"]),
            &history,
        );
        assert_eq!(key.as_str(), "SAHA|H2C2D2|cc/r50c//");
        assert!(!key.as_str().contains(','));
    }

    #[test]
    fn histories_differing_only_by_street_differ() {
        let mut flop_bet: StreetHistory = Default::default();
        flop_bet[1].push(AbstractAction::AllIn);
        let mut turn_bet: StreetHistory = Default::default();
        turn_bet[2].push(AbstractAction::AllIn);
        let hole = [card("SA"), card("HA")];
        let board = cards(&["H2", "C2", "D2"]);
        assert_ne!(
            holdem_key(&hole, &board, &flop_bet),
            holdem_key(&hole, &board, &turn_bet)
        );
    }

    #[test]
    fn replay_matches_training_accounting() {
        // SB completes, BB checks; flop: check, bet 7 into 4, call.
        let mut histories: [Vec<HistoryEntry>; 4] = Default::default();
        histories[0] = vec![
            HistoryEntry { seat: 0, act: RawAct::Blind(1) },
            HistoryEntry { seat: 1, act: RawAct::Blind(2) },
            HistoryEntry { seat: 0, act: RawAct::Call(1) },
            HistoryEntry { seat: 1, act: RawAct::Call(0) },
        ];
        histories[1] = vec![
            HistoryEntry { seat: 1, act: RawAct::Call(0) },
            HistoryEntry { seat: 0, act: RawAct::Raise(3) },
            HistoryEntry { seat: 1, act: RawAct::Call(3) },
        ];
        let public = PublicState {
            street: Street::Turn,
            board: cards(&["H2", "C2", "D2", "S5"]),
            pot: 10,
            stacks: [95, 95],
            starting_stacks: [100, 100],
            histories,
            small_blind: 1,
            big_blind: 2,
        };
        let history = replay_history(&public, &Abstraction::default());
        assert_eq!(history[0], vec![AbstractAction::Call, AbstractAction::Call]);
        // 3 into a pot of 4 reads as the three-quarter-pot raise.
        assert_eq!(
            history[1],
            vec![
                AbstractAction::Call,
                AbstractAction::PotFraction(2),
                AbstractAction::Call
            ]
        );
        assert!(history[2].is_empty());
    }
}
