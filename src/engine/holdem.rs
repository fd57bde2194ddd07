//! Heads-up no-limit Hold'em behind the engine adapter. Seat 0 posts the
//! small blind and acts first preflop; seat 1 acts first on later streets.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cards::{full_deck, Card};
use crate::engine::{
    Event, EngineAction, HistoryEntry, LegalActions, PokerEngine, PublicState, RaiseBounds, RawAct,
    Street,
};
use crate::error::{Error, Result};
use crate::eval::best_rank;
use crate::{Seat, Utility};

pub const STACK_SIZE: u32 = 100;
pub const SMALL_BLIND: u32 = 1;
pub const BIG_BLIND: u32 = 2;

/// Hole cards, the full board, and a buffer for blinds and burn-free
/// street deals.
const MIN_DECK: usize = 9;

#[derive(Debug, Clone)]
pub struct HandState {
    /// Undealt remainder, shuffled; dealing pops from the back.
    deck: Vec<Card>,
    holes: [[Card; 2]; 2],
    board: Vec<Card>,
    street: Street,
    pot: u32,
    /// Chips committed by each seat on the current street.
    pips: [u32; 2],
    stacks: [u32; 2],
    to_act: Seat,
    /// Size of the last raise this street; gone once betting reopens.
    last_raise: Option<u32>,
    /// Voluntary actions taken this street.
    acted: u32,
    histories: [Vec<HistoryEntry>; 4],
    outcome: Option<[i64; 2]>,
}

impl HandState {
    fn contribution(&self, seat: Seat) -> u32 {
        STACK_SIZE - self.stacks[seat]
    }

    fn street_idx(&self) -> usize {
        self.street.index()
    }
}

pub struct HoldemEngine {
    rng: SmallRng,
}

impl HoldemEngine {
    pub fn new(seed: u64) -> HoldemEngine {
        HoldemEngine {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn deal_street(&self, state: &mut HandState, events: &mut Vec<Event>) -> Result<()> {
        let street = match state.street.next() {
            Some(street) => street,
            None => return Err(Error::EngineProtocol("dealing past the river".into())),
        };
        let count = if state.board.is_empty() { 3 } else { 1 };
        let mut cards = Vec::with_capacity(count);
        for _ in 0..count {
            match state.deck.pop() {
                Some(card) => cards.push(card),
                None => return Err(Error::EngineProtocol("deck exhausted".into())),
            }
        }
        state.board.extend(&cards);
        state.street = street;
        events.push(Event::StreetDealt { street, cards });
        Ok(())
    }

    /// Settles the street once betting is closed: advance and deal, run
    /// the board out if somebody is all in, or show down after the river.
    fn close_street(&self, state: &mut HandState, events: &mut Vec<Event>) -> Result<()> {
        state.pips = [0, 0];
        state.last_raise = None;
        state.acted = 0;
        if state.street == Street::River {
            self.showdown(state, events);
            return Ok(());
        }
        if state.stacks[0] == 0 || state.stacks[1] == 0 {
            while state.board.len() < 5 {
                self.deal_street(state, events)?;
            }
            self.showdown(state, events);
            return Ok(());
        }
        self.deal_street(state, events)?;
        state.to_act = 1;
        Ok(())
    }

    fn showdown(&self, state: &mut HandState, events: &mut Vec<Event>) {
        let rank = |seat: Seat| {
            let mut cards = state.holes[seat].to_vec();
            cards.extend(&state.board);
            best_rank(&cards)
        };
        let contributions = [state.contribution(0) as i64, state.contribution(1) as i64];
        let deltas = match rank(0).cmp(&rank(1)) {
            std::cmp::Ordering::Greater => [contributions[1], -contributions[1]],
            std::cmp::Ordering::Less => [-contributions[0], contributions[0]],
            std::cmp::Ordering::Equal => [0, 0],
        };
        state.outcome = Some(deltas);
        events.push(Event::RoundFinished {
            payoffs: [deltas[0] as Utility, deltas[1] as Utility],
        });
    }

    fn check_conservation(&self, state: &HandState) {
        debug_assert_eq!(state.stacks[0] + state.stacks[1] + state.pot, 2 * STACK_SIZE);
    }
}

impl PokerEngine for HoldemEngine {
    type State = HandState;

    fn new_round(&mut self, deck_override: Option<&[Card]>) -> Result<(HandState, Vec<Event>)> {
        let mut deck = match deck_override {
            Some(cards) => {
                if cards.len() < MIN_DECK {
                    return Err(Error::Config(format!(
                        "custom deck needs at least {} cards, got {}",
                        MIN_DECK,
                        cards.len()
                    )));
                }
                cards.to_vec()
            }
            None => full_deck(),
        };
        deck.shuffle(&mut self.rng);

        let mut draw = || deck.pop().ok_or_else(|| Error::Config("deck exhausted".into()));
        let holes = [[draw()?, draw()?], [draw()?, draw()?]];

        let mut histories: [Vec<HistoryEntry>; 4] = Default::default();
        histories[0].push(HistoryEntry { seat: 0, act: RawAct::Blind(SMALL_BLIND) });
        histories[0].push(HistoryEntry { seat: 1, act: RawAct::Blind(BIG_BLIND) });

        let state = HandState {
            deck,
            holes,
            board: Vec::new(),
            street: Street::Preflop,
            pot: SMALL_BLIND + BIG_BLIND,
            pips: [SMALL_BLIND, BIG_BLIND],
            stacks: [STACK_SIZE - SMALL_BLIND, STACK_SIZE - BIG_BLIND],
            to_act: 0,
            last_raise: Some(BIG_BLIND),
            acted: 0,
            histories,
            outcome: None,
        };
        self.check_conservation(&state);
        let events = vec![
            Event::HoleCardsDealt { seat: 0 },
            Event::HoleCardsDealt { seat: 1 },
        ];
        Ok((state, events))
    }

    fn legal_actions(&self, state: &HandState) -> Result<LegalActions> {
        if state.outcome.is_some() {
            return Err(Error::EngineProtocol("legal_actions on a terminal state".into()));
        }
        let me = state.to_act;
        let opp = me ^ 1;
        let call_amount = state.pips[opp].saturating_sub(state.pips[me]);
        let current_bet = state.pips[me].max(state.pips[opp]);
        // Raise-to totals cap at the shorter effective stack.
        let cap = (state.pips[me] + state.stacks[me]).min(state.pips[opp] + state.stacks[opp]);
        let raise = if cap > current_bet && state.stacks[me] > call_amount {
            let min = (current_bet + state.last_raise.unwrap_or(BIG_BLIND)).min(cap);
            Some(RaiseBounds { min, max: cap })
        } else {
            None
        };
        Ok(LegalActions { fold_allowed: true, call_amount, raise })
    }

    fn apply(&self, state: &HandState, action: EngineAction) -> Result<(HandState, Vec<Event>)> {
        let legal = self.legal_actions(state)?;
        let mut state = state.clone();
        let me = state.to_act;
        let opp = me ^ 1;
        let street = state.street_idx();
        let mut events = vec![Event::Acted { seat: me, action }];

        match action {
            EngineAction::Fold => {
                state.histories[street].push(HistoryEntry { seat: me, act: RawAct::Fold });
                let lost = state.contribution(me) as i64;
                let mut deltas = [0i64; 2];
                deltas[me] = -lost;
                deltas[opp] = lost;
                state.outcome = Some(deltas);
                events.push(Event::RoundFinished {
                    payoffs: [deltas[0] as Utility, deltas[1] as Utility],
                });
            }
            EngineAction::Call => {
                let cost = legal.call_amount;
                state.stacks[me] -= cost;
                state.pips[me] += cost;
                state.pot += cost;
                state.histories[street].push(HistoryEntry { seat: me, act: RawAct::Call(cost) });
                state.acted += 1;
                self.check_conservation(&state);
                if state.pips[me] == state.pips[opp] && state.acted >= 2 {
                    self.close_street(&mut state, &mut events)?;
                } else {
                    state.to_act = opp;
                }
            }
            EngineAction::Raise(to) => {
                let bounds = legal
                    .raise
                    .ok_or_else(|| Error::EngineProtocol("raise where none is legal".into()))?;
                if to < bounds.min || to > bounds.max {
                    return Err(Error::EngineProtocol(format!(
                        "raise to {} outside [{}, {}]",
                        to, bounds.min, bounds.max
                    )));
                }
                let current_bet = state.pips[me].max(state.pips[opp]);
                let cost = to - state.pips[me];
                state.stacks[me] -= cost;
                state.pot += cost;
                state.pips[me] = to;
                state.last_raise = Some(to - current_bet);
                state.histories[street].push(HistoryEntry { seat: me, act: RawAct::Raise(to) });
                state.acted += 1;
                state.to_act = opp;
                self.check_conservation(&state);
            }
        }
        Ok((state, events))
    }

    fn actor(&self, state: &HandState) -> Result<Seat> {
        if state.outcome.is_some() {
            return Err(Error::EngineProtocol("actor on a terminal state".into()));
        }
        Ok(state.to_act)
    }

    fn is_terminal(&self, state: &HandState) -> bool {
        state.outcome.is_some()
    }

    fn payoff(&self, state: &HandState) -> Result<[Utility; 2]> {
        match state.outcome {
            Some(deltas) => Ok([deltas[0] as Utility, deltas[1] as Utility]),
            None => Err(Error::EngineProtocol("payoff on a live state".into())),
        }
    }

    fn public(&self, state: &HandState) -> PublicState {
        PublicState {
            street: state.street,
            board: state.board.clone(),
            pot: state.pot,
            stacks: state.stacks,
            starting_stacks: [STACK_SIZE, STACK_SIZE],
            histories: state.histories.clone(),
            small_blind: SMALL_BLIND,
            big_blind: BIG_BLIND,
        }
    }

    fn private(&self, state: &HandState, seat: Seat) -> [Card; 2] {
        state.holes[seat]
    }

    fn snapshot(&mut self, state: &HandState) -> HandState {
        let mut copy = state.clone();
        copy.deck.shuffle(&mut self.rng);
        copy
    }
}
