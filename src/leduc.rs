//! External-sampling CFR for Leduc poker.
//!
//! The deck holds two copies of each card `0..decksize`; both players
//! ante one chip and bet integer amounts over two rounds (at most four
//! bets per round), with one board card revealed for the second round. A
//! bet of `0` is a check or a fold depending on what it faces. Pairing
//! the board beats a higher unpaired card.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::distribution::sample_weighted;
use crate::error::{Error, Result};
use crate::infoset::InfoSetKey;
use crate::node::NodeTable;

const PROGRESS_INTERVAL: usize = 1_000;

/// Per-round bet history: amounts in seat-alternating order, seat 0 at
/// the even offsets of both rounds.
pub type RoundHistory = [Vec<u32>; 2];

pub struct LeducCfr {
    starting_stack: u32,
    cards: Vec<u8>,
    nodes: NodeTable<u32>,
    rng: SmallRng,
    pub iterations: usize,
    utility_sum: f64,
}

impl LeducCfr {
    pub fn new(decksize: usize, starting_stack: u32, seed: u64) -> Result<LeducCfr> {
        if decksize < 2 {
            return Err(Error::Config("leduc needs at least two card ranks".into()));
        }
        if starting_stack < 2 {
            return Err(Error::Config("leduc needs a stack beyond the ante".into()));
        }
        let mut cards: Vec<u8> = (0..decksize as u8).collect();
        cards.extend(0..decksize as u8);
        cards.sort_unstable();
        Ok(LeducCfr {
            starting_stack,
            cards,
            nodes: NodeTable::new(),
            rng: SmallRng::seed_from_u64(seed),
            iterations: 0,
            utility_sum: 0.0,
        })
    }

    /// Index of the winning seat for `[hand0, hand1, board]`, or -1 on a
    /// tie. Pairing the board wins outright.
    pub fn winning_hand(&self, cards: &[u8; 3]) -> i32 {
        if cards[0] == cards[2] {
            0
        } else if cards[1] == cards[2] {
            1
        } else if cards[0] > cards[1] {
            0
        } else if cards[1] > cards[0] {
            1
        } else {
            -1
        }
    }

    /// Legal bet totals for the acting player in the current round: fold
    /// or check as 0, a flat call, and every raise from the minimum up to
    /// the remaining stack.
    pub fn valid_bets(&self, history: &RoundHistory, round: usize, acting: usize) -> Vec<u32> {
        let stack = self.starting_stack - 1;
        let committed: u32 = history
            .iter()
            .map(|bets| bets.iter().skip(acting).step_by(2).sum::<u32>())
            .sum();
        let acting_stack = stack - committed;
        let current = &history[round];

        match current.len() {
            0 => (0..=acting_stack).collect(),
            1 => {
                let call = current[0];
                let min_raise = current[0] * 2;
                if min_raise > acting_stack {
                    if current[0] == acting_stack {
                        vec![0, acting_stack]
                    } else {
                        vec![0, call, acting_stack]
                    }
                } else if current[0] == 0 {
                    (min_raise..=acting_stack).collect()
                } else {
                    let mut bets = vec![0, call];
                    bets.extend(min_raise..=acting_stack);
                    bets
                }
            }
            2 => {
                let call = current[1] - current[0];
                let min_raise = 2 * (current[1] - current[0]);
                if min_raise > acting_stack {
                    if call == acting_stack {
                        vec![0, acting_stack]
                    } else {
                        vec![0, call, acting_stack]
                    }
                } else {
                    let mut bets = vec![0, call];
                    bets.extend(min_raise..=acting_stack);
                    bets
                }
            }
            // Fourth bet closes the round: fold or call only.
            _ => {
                let call = (current[1] as i64 - current[2] as i64 - current[0] as i64).unsigned_abs() as u32;
                vec![0, call]
            }
        }
    }

    pub fn run_iterations(&mut self, iterations: usize) -> Result<f64> {
        for t in 1..=iterations {
            for traverser in 0..2 {
                self.cards.shuffle(&mut self.rng);
                let dealt = [self.cards[0], self.cards[1], self.cards[2]];
                let mut history: RoundHistory = Default::default();
                let utility = self.cfr(&dealt, &mut history, 0, 2, traverser)?;
                if traverser == 0 {
                    self.utility_sum += utility;
                }
            }
            self.iterations += 1;
            if t % PROGRESS_INTERVAL == 0 {
                info!("leduc iteration {}: {} info sets", self.iterations, self.nodes.len());
            }
        }
        Ok(self.game_value())
    }

    pub fn game_value(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.utility_sum / self.iterations as f64
    }

    fn cfr(
        &mut self,
        cards: &[u8; 3],
        history: &mut RoundHistory,
        round: usize,
        pot: u32,
        traverser: usize,
    ) -> Result<f64> {
        let mut round = round;
        let plays = history[round].len();

        if plays >= 2 {
            let p0_total: u32 = history[round].iter().step_by(2).sum();
            let p1_total: u32 = history[round].iter().skip(1).step_by(2).sum();
            if p0_total == p1_total {
                if round == 0 && p0_total != self.starting_stack - 1 {
                    round = 1;
                } else {
                    let winner = self.winning_hand(cards);
                    if winner == -1 {
                        return Ok(0.0);
                    }
                    let half = pot as f64 / 2.0;
                    return Ok(if winner as usize == traverser { half } else { -half });
                }
            } else if *history[round].last().unwrap_or(&1) == 0 {
                // A fold: the next-to-act seat wins the folder's bets
                // this round plus the ante.
                let acting = plays % 2;
                let folder_total = if acting == 0 { p1_total } else { p0_total };
                let win = (folder_total + 1) as f64;
                return Ok(if acting == traverser { win } else { -win });
            }
        }

        let acting = history[round].len() % 2;
        let key = if round == 0 {
            InfoSetKey::from(format!("{}{:?}", cards[acting], history))
        } else {
            InfoSetKey::from(format!("{}{}{:?}", cards[acting], cards[2], history))
        };
        let bets = self.valid_bets(history, round, acting);
        self.nodes.ensure(&key, &bets)?;
        let strategy = self
            .nodes
            .current_strategy(&key)
            .ok_or_else(|| Error::Numeric(format!("missing node at {}", key)))?;

        if acting == traverser {
            let mut utilities = vec![0.0; bets.len()];
            for (i, &bet) in bets.iter().enumerate() {
                history[round].push(bet);
                utilities[i] = self.cfr(cards, history, round, pot + bet, traverser)?;
                history[round].pop();
            }
            let node_utility: f64 = strategy.iter().zip(&utilities).map(|(p, u)| p * u).sum();
            let deltas: Vec<f64> = utilities.iter().map(|u| u - node_utility).collect();
            self.nodes.add_regrets(&key, &deltas);
            Ok(node_utility)
        } else {
            let sampled = sample_weighted(&strategy, &mut self.rng);
            let bet = bets[sampled];
            history[round].push(bet);
            let utility = self.cfr(cards, history, round, pot + bet, traverser)?;
            history[round].pop();
            self.nodes.add_strategy(&key, &strategy);
            Ok(utility)
        }
    }

    /// Sorted average strategies keyed like `"1[[3], []]"`.
    pub fn strategies(&self) -> BTreeMap<String, Vec<(u32, f64)>> {
        self.nodes
            .average_records()
            .into_iter()
            .map(|(key, bets, probs)| {
                (key.to_string(), bets.into_iter().zip(probs).collect())
            })
            .collect()
    }

    /// Writes one `key, {bet: prob}` line per info set.
    pub fn save_strategies(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for (key, record) in self.strategies() {
            let entries: Vec<String> = record
                .iter()
                .map(|(bet, prob)| format!("{}: {:?}", bet, prob))
                .collect();
            writeln!(out, "{}, {{{}}}", key, entries.join(", "))?;
        }
        Ok(())
    }
}
