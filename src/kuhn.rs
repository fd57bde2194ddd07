//! External-sampling CFR for Kuhn poker.
//!
//! Cards are the integers `0..decksize`, each player antes one chip, and
//! the two actions at every decision are `0` (check or fold) and `1`
//! (bet or call). Keys read like `"0[1]"`: the actor's card followed by
//! the bet history.

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

const ACTIONS: [u8; 2] = [0, 1];
const PROGRESS_INTERVAL: usize = 10_000;

pub struct KuhnCfr {
    cards: Vec<u8>,
    nodes: NodeTable<u8>,
    rng: SmallRng,
    pub iterations: usize,
    utility_sum: f64,
}

impl KuhnCfr {
    pub fn new(decksize: usize, seed: u64) -> Result<KuhnCfr> {
        if decksize < 2 {
            return Err(Error::Config("kuhn needs at least two cards".into()));
        }
        Ok(KuhnCfr {
            cards: (0..decksize as u8).collect(),
            nodes: NodeTable::new(),
            rng: SmallRng::seed_from_u64(seed),
            iterations: 0,
            utility_sum: 0.0,
        })
    }

    /// Runs `iterations` iterations and returns the game-value estimate
    /// for player 0.
    pub fn run_iterations(&mut self, iterations: usize) -> Result<f64> {
        for t in 1..=iterations {
            for traverser in 0..2 {
                self.cards.shuffle(&mut self.rng);
                let dealt = [self.cards[0], self.cards[1]];
                let mut history = Vec::new();
                let utility = self.cfr(&dealt, &mut history, 2, traverser)?;
                if traverser == 0 {
                    self.utility_sum += utility;
                }
            }
            self.iterations += 1;
            if t % PROGRESS_INTERVAL == 0 {
                info!("kuhn iteration {}: {} info sets", self.iterations, self.nodes.len());
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
        cards: &[u8; 2],
        history: &mut Vec<u8>,
        pot: u32,
        traverser: usize,
    ) -> Result<f64> {
        let plays = history.len();
        let acting = plays % 2;
        let opponent = 1 - acting;

        if plays >= 2 {
            let last = history[plays - 1];
            let prev = history[plays - 2];
            // Fold after a bet.
            if last == 0 && prev == 1 {
                return Ok(if acting == traverser { 1.0 } else { -1.0 });
            }
            // Check-check or bet-call: showdown for half the pot.
            if last == prev {
                let half = pot as f64 / 2.0;
                let winner_is_actor = cards[acting] > cards[opponent];
                return Ok(if winner_is_actor == (acting == traverser) {
                    half
                } else {
                    -half
                });
            }
        }

        let key = InfoSetKey::from(format!("{}{:?}", cards[acting], history));
        self.nodes.ensure(&key, &ACTIONS)?;
        let strategy = self
            .nodes
            .current_strategy(&key)
            .ok_or_else(|| Error::Numeric(format!("missing node at {}", key)))?;

        if acting == traverser {
            let mut utilities = [0.0; 2];
            for (i, &action) in ACTIONS.iter().enumerate() {
                history.push(action);
                utilities[i] = self.cfr(cards, history, pot + action as u32, traverser)?;
                history.pop();
            }
            let node_utility = strategy[0] * utilities[0] + strategy[1] * utilities[1];
            let deltas = [utilities[0] - node_utility, utilities[1] - node_utility];
            self.nodes.add_regrets(&key, &deltas);
            Ok(node_utility)
        } else {
            let sampled = sample_weighted(&strategy, &mut self.rng) as u8;
            history.push(sampled);
            let utility = self.cfr(cards, history, pot + sampled as u32, traverser)?;
            history.pop();
            self.nodes.add_strategy(&key, &strategy);
            Ok(utility)
        }
    }

    /// Average strategy at a key such as `"0[]"`, if the set was visited.
    pub fn average_strategy(&self, key: &str) -> Option<Vec<f64>> {
        self.nodes.average_strategy(&InfoSetKey::from(key.to_string()))
    }

    /// Sorted average strategies for inspection or dumping.
    pub fn strategies(&self) -> BTreeMap<String, Vec<f64>> {
        self.nodes
            .average_records()
            .into_iter()
            .map(|(key, _, probs)| (key.to_string(), probs))
            .collect()
    }

    /// Writes one `key, {action: prob}` line per info set.
    pub fn save_strategies(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for (key, probs) in self.strategies() {
            writeln!(out, "{}, {{0: {:?}, 1: {:?}}}", key, probs[0], probs[1])?;
        }
        Ok(())
    }
}
