//! Engine adapter boundary. The CFR core and the runtime agent talk to a
//! poker engine only through [`PokerEngine`]; nothing above this module
//! reaches into engine internals.

pub mod holdem;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::error::Result;
use crate::{Seat, Utility};

/// Betting round, indexing the four per-street action histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    pub fn index(self) -> usize {
        self as usize
    }

    fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }
}

/// Raise bounds at a decision node, both as street raise-to totals.
/// Absent entirely when raising is not possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaiseBounds {
    pub min: u32,
    pub max: u32,
}

/// The concrete action set at a decision node.
#[derive(Debug, Clone, PartialEq)]
pub struct LegalActions {
    pub fold_allowed: bool,
    /// Chips required to call; zero when checking is free.
    pub call_amount: u32,
    pub raise: Option<RaiseBounds>,
}

/// A concrete action handed to the engine. Raise carries the street
/// raise-to total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    Fold,
    Call,
    Raise(u32),
}

/// One raw entry of a street's action history as the engine records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seat: Seat,
    pub act: RawAct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAct {
    /// Forced post; excluded from the abstract history, its chips seed
    /// the pot.
    Blind(u32),
    Fold,
    /// Chips actually added by the call (zero for a check).
    Call(u32),
    /// Street raise-to total.
    Raise(u32),
}

/// Everything both seats can see.
#[derive(Debug, Clone)]
pub struct PublicState {
    pub street: Street,
    pub board: Vec<Card>,
    /// Main pot, including chips committed on the current street.
    pub pot: u32,
    pub stacks: [u32; 2],
    pub starting_stacks: [u32; 2],
    pub histories: [Vec<HistoryEntry>; 4],
    pub small_blind: u32,
    pub big_blind: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    HoleCardsDealt { seat: Seat },
    StreetDealt { street: Street, cards: Vec<Card> },
    Acted { seat: Seat, action: EngineAction },
    RoundFinished { payoffs: [Utility; 2] },
}

/// Contract the CFR core consumes. Implementations must guarantee that
/// `apply(&snapshot(s), a)` never mutates `s`, that `snapshot` preserves
/// public state and private assignments while reshuffling only the
/// unrevealed remainder of the deck, and that terminal payoffs sum to
/// zero across seats.
pub trait PokerEngine {
    type State: Clone;

    /// Deals a fresh hand: blinds posted, hole cards dealt. A deck
    /// override restricts the cards in play (the card abstraction).
    fn new_round(&mut self, deck_override: Option<&[Card]>) -> Result<(Self::State, Vec<Event>)>;

    fn legal_actions(&self, state: &Self::State) -> Result<LegalActions>;

    /// Applies an action to a copy of `state`, returning the successor
    /// and the events it produced.
    fn apply(&self, state: &Self::State, action: EngineAction) -> Result<(Self::State, Vec<Event>)>;

    fn actor(&self, state: &Self::State) -> Result<Seat>;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Stack deltas relative to the starting stacks; zero-sum.
    fn payoff(&self, state: &Self::State) -> Result<[Utility; 2]>;

    fn public(&self, state: &Self::State) -> PublicState;

    fn private(&self, state: &Self::State, seat: Seat) -> [Card; 2];

    /// Independent copy with identical public info and hole cards whose
    /// residual deck is reshuffled.
    fn snapshot(&mut self, state: &Self::State) -> Self::State;
}
