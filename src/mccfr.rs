//! External-sampling MCCFR over the engine adapter.
//!
//! One traversal enumerates every abstract action at the traversing
//! player's nodes and samples a single action everywhere else; chance is
//! sampled implicitly by the engine's shuffled deck. Each branch starts
//! from a snapshot, so sibling branches see an independently reshuffled
//! residual deck and the parent state is never disturbed.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::abstraction::{AbstractAction, Abstraction};
use crate::cards::Card;
use crate::distribution::sample_weighted;
use crate::engine::PokerEngine;
use crate::error::{Error, Result};
use crate::infoset::{holdem_key, InfoSetKey, StreetHistory};
use crate::node::{Node, NodeTable};
use crate::store::StrategyStore;
use crate::Seat;

const PROGRESS_INTERVAL: usize = 1_000;

pub struct Trainer<E: PokerEngine> {
    engine: E,
    abstraction: Abstraction,
    nodes: Arc<NodeTable<AbstractAction>>,
    custom_deck: Option<Vec<Card>>,
    rng: SmallRng,
    pub iterations: usize,
    pub nodes_touched: usize,
    utility_sum: f64,
}

impl<E: PokerEngine> Trainer<E> {
    pub fn new(engine: E, seed: u64) -> Trainer<E> {
        Trainer {
            engine,
            abstraction: Abstraction::default(),
            nodes: Arc::new(NodeTable::new()),
            custom_deck: None,
            rng: SmallRng::seed_from_u64(seed),
            iterations: 0,
            nodes_touched: 0,
            utility_sum: 0.0,
        }
    }

    /// Shares a node table with other trainer instances.
    pub fn with_nodes(mut self, nodes: Arc<NodeTable<AbstractAction>>) -> Trainer<E> {
        self.nodes = nodes;
        self
    }

    pub fn with_abstraction(mut self, abstraction: Abstraction) -> Trainer<E> {
        self.abstraction = abstraction;
        self
    }

    /// Restricts every dealt round to the given cards (card abstraction).
    pub fn set_custom_deck(&mut self, deck: Vec<Card>) {
        self.custom_deck = Some(deck);
    }

    pub fn nodes(&self) -> &Arc<NodeTable<AbstractAction>> {
        &self.nodes
    }

    /// Runs `iterations` full iterations, alternating the traversing
    /// player, and returns the running game-value estimate for seat 0.
    pub fn run_iterations(&mut self, iterations: usize) -> Result<f64> {
        for t in 1..=iterations {
            for traverser in 0..2 {
                let (state, _) = self.engine.new_round(self.custom_deck.as_deref())?;
                let mut history: StreetHistory = Default::default();
                let utility = self.cfr(&state, &mut history, traverser)?;
                if traverser == 0 {
                    self.utility_sum += utility;
                }
            }
            self.iterations += 1;
            if t % PROGRESS_INTERVAL == 0 {
                info!(
                    "iteration {}: {} info sets, {} nodes touched",
                    self.iterations,
                    self.nodes.len(),
                    self.nodes_touched
                );
            }
        }
        let value = self.game_value();
        info!("average game value: {:.4}", value);
        Ok(value)
    }

    /// Running estimate of seat 0's expected utility under the current
    /// average strategies.
    pub fn game_value(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.utility_sum / self.iterations as f64
    }

    fn cfr(
        &mut self,
        state: &E::State,
        history: &mut StreetHistory,
        traverser: Seat,
    ) -> Result<f64> {
        if self.engine.is_terminal(state) {
            return Ok(self.engine.payoff(state)?[traverser]);
        }
        self.nodes_touched += 1;

        let actor = self.engine.actor(state)?;
        let legal = self.engine.legal_actions(state)?;
        if let Some(raise) = legal.raise {
            if raise.min > raise.max {
                return Err(Error::EngineProtocol(format!(
                    "raise bounds inverted: [{}, {}]",
                    raise.min, raise.max
                )));
            }
        }
        let public = self.engine.public(state);
        let pot = public.pot;
        let actions = self.abstraction.abstract_actions(&legal, pot);
        if actions.is_empty() {
            return Err(Error::EngineProtocol("empty abstract action set".into()));
        }

        let hole = self.engine.private(state, actor);
        let key = holdem_key(&hole, &public.board, history);
        self.nodes.ensure(&key, &actions)?;
        let strategy = self
            .nodes
            .current_strategy(&key)
            .ok_or_else(|| Error::EngineProtocol(format!("missing node at {}", key)))?;
        let street = public.street.index();

        if actor == traverser {
            let mut utilities = vec![0.0; actions.len()];
            for (i, &action) in actions.iter().enumerate() {
                let concrete = self.abstraction.concrete(action, &legal, pot)?;
                let branch = self.engine.snapshot(state);
                let (child, _) = self.engine.apply(&branch, concrete)?;
                history[street].push(action);
                utilities[i] = self.cfr(&child, history, traverser)?;
                history[street].pop();
            }
            let node_utility: f64 = strategy.iter().zip(&utilities).map(|(p, u)| p * u).sum();
            if !node_utility.is_finite() || utilities.iter().any(|u| !u.is_finite()) {
                return Err(Error::Numeric(format!("non-finite utility at {}", key)));
            }
            let deltas: Vec<f64> = utilities.iter().map(|u| u - node_utility).collect();
            self.nodes.add_regrets(&key, &deltas);
            Ok(node_utility)
        } else {
            let sampled = sample_weighted(&strategy, &mut self.rng);
            let action = actions[sampled];
            let concrete = self.abstraction.concrete(action, &legal, pot)?;
            let branch = self.engine.snapshot(state);
            let (child, _) = self.engine.apply(&branch, concrete)?;
            history[street].push(action);
            let utility = self.cfr(&child, history, traverser)?;
            history[street].pop();
            self.nodes.add_strategy(&key, &strategy);
            Ok(utility)
        }
    }

    /// Averaged policies for every info set seen so far.
    pub fn strategy_store(&self) -> Result<StrategyStore> {
        let mut store = StrategyStore::new();
        for (key, actions, probs) in self.nodes.average_records() {
            let record: Vec<(AbstractAction, f64)> =
                actions.into_iter().zip(probs).collect();
            store.insert(key, record)?;
        }
        Ok(store)
    }

    /// Full node table (regret and strategy sums), for resuming training.
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &self.nodes.to_records())?;
        Ok(())
    }

    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let records: Vec<(InfoSetKey, Node<AbstractAction>)> =
            bincode::deserialize_from(BufReader::new(file))?;
        self.nodes = Arc::new(NodeTable::from_records(records));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_deck;
    use crate::engine::holdem::HoldemEngine;

    fn short_deck() -> Vec<Card> {
        parse_deck("SA,SK,SQ,SJ,ST,S9,S8,S7,S6,HA,HK,HQ,HJ,HT,H9,H8").unwrap()
    }

    #[test]
    fn training_builds_a_consistent_table() {
        let mut trainer = Trainer::new(HoldemEngine::new(1), 1);
        trainer.set_custom_deck(short_deck());
        trainer.run_iterations(20).unwrap();
        assert!(trainer.nodes().len() > 0);
        assert!(trainer.nodes_touched > 0);

        for (key, actions, probs) in trainer.nodes().average_records() {
            assert!(!actions.is_empty());
            assert_eq!(actions.len(), probs.len());
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9, "at {}", key);
            let current = trainer.nodes().current_strategy(&key).unwrap();
            assert!((current.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn game_value_estimate_stays_bounded() {
        let mut trainer = Trainer::new(HoldemEngine::new(3), 3);
        trainer.set_custom_deck(short_deck());
        let value = trainer.run_iterations(30).unwrap();
        // A single hand can swing at most a full starting stack.
        assert!(value.abs() <= 100.0);
    }

    #[test]
    fn checkpoints_resume_training_exactly() {
        let dir = std::env::temp_dir();
        let path = dir.join("cfrbot_test_checkpoint.bin");
        let mut trainer = Trainer::new(HoldemEngine::new(7), 7);
        trainer.set_custom_deck(short_deck());
        trainer.run_iterations(10).unwrap();
        let before = trainer.nodes().to_records();
        trainer.save_checkpoint(&path).unwrap();

        let mut resumed = Trainer::new(HoldemEngine::new(8), 8);
        resumed.set_custom_deck(short_deck());
        resumed.load_checkpoint(&path).unwrap();
        let after = resumed.nodes().to_records();
        assert_eq!(before.len(), after.len());
        for ((k1, n1), (k2, n2)) in before.iter().zip(after.iter()) {
            assert_eq!(k1, k2);
            assert_eq!(n1.regret_sum(), n2.regret_sum());
            assert_eq!(n1.strategy_sum(), n2.strategy_sum());
        }
        resumed.run_iterations(5).unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn store_records_are_normalized() {
        let mut trainer = Trainer::new(HoldemEngine::new(11), 11);
        trainer.set_custom_deck(short_deck());
        trainer.run_iterations(15).unwrap();
        let store = trainer.strategy_store().unwrap();
        assert_eq!(store.len(), trainer.nodes().len());
    }
}
