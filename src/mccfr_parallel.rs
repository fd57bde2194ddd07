//! Thread-parallel training over one shared node table.
//!
//! Each worker owns its engine and RNG and runs independent traversals;
//! they all accumulate into the same table, where per-entry locking keeps
//! concurrent regret and strategy merges atomic with respect to readers.

use std::sync::Arc;
use std::thread;

use crossbeam::atomic::AtomicCell;
use log::info;

use crate::abstraction::AbstractAction;
use crate::cards::Card;
use crate::engine::holdem::HoldemEngine;
use crate::error::{Error, Result};
use crate::mccfr::Trainer;
use crate::node::NodeTable;

pub struct ParallelTrainer {
    threads: usize,
    nodes: Arc<NodeTable<AbstractAction>>,
    custom_deck: Option<Vec<Card>>,
    nodes_touched: Arc<AtomicCell<usize>>,
}

impl ParallelTrainer {
    pub fn new(threads: usize) -> ParallelTrainer {
        ParallelTrainer {
            threads: threads.max(1),
            nodes: Arc::new(NodeTable::new()),
            custom_deck: None,
            nodes_touched: Arc::new(AtomicCell::new(0)),
        }
    }

    pub fn set_custom_deck(&mut self, deck: Vec<Card>) {
        self.custom_deck = Some(deck);
    }

    pub fn nodes(&self) -> &Arc<NodeTable<AbstractAction>> {
        &self.nodes
    }

    pub fn nodes_touched(&self) -> usize {
        self.nodes_touched.load()
    }

    /// Splits the iteration budget across the workers and returns the
    /// iteration-weighted mean of their game-value estimates.
    pub fn run_iterations(&mut self, iterations: usize, seed: u64) -> Result<f64> {
        let mut shares = vec![iterations / self.threads; self.threads];
        for extra in shares.iter_mut().take(iterations % self.threads) {
            *extra += 1;
        }

        let mut workers = Vec::new();
        for (i, share) in shares.into_iter().enumerate() {
            if share == 0 {
                continue;
            }
            let nodes = Arc::clone(&self.nodes);
            let touched = Arc::clone(&self.nodes_touched);
            let deck = self.custom_deck.clone();
            let worker_seed = seed.wrapping_add(i as u64);
            workers.push(thread::spawn(move || -> Result<(usize, f64)> {
                let mut trainer =
                    Trainer::new(HoldemEngine::new(worker_seed), worker_seed).with_nodes(nodes);
                if let Some(deck) = deck {
                    trainer.set_custom_deck(deck);
                }
                let value = trainer.run_iterations(share)?;
                touched.fetch_add(trainer.nodes_touched);
                Ok((share, value))
            }));
        }

        let mut weighted = 0.0;
        let mut total = 0usize;
        for worker in workers {
            let (share, value) = worker
                .join()
                .map_err(|_| Error::EngineProtocol("worker thread panicked".into()))??;
            weighted += value * share as f64;
            total += share;
        }
        let value = if total > 0 { weighted / total as f64 } else { 0.0 };
        info!(
            "parallel training done: {} info sets, {} nodes touched",
            self.nodes.len(),
            self.nodes_touched()
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_deck;

    #[test]
    fn workers_share_one_table() {
        let mut trainer = ParallelTrainer::new(2);
        trainer.set_custom_deck(
            parse_deck("SA,SK,SQ,SJ,ST,S9,S8,S7,S6,HA,HK,HQ,HJ,HT,H9,H8").unwrap(),
        );
        let value = trainer.run_iterations(20, 5).unwrap();
        assert!(value.abs() <= 100.0);
        assert!(trainer.nodes().len() > 0);
        assert!(trainer.nodes_touched() > 0);

        for (_, actions, probs) in trainer.nodes().average_records() {
            assert_eq!(actions.len(), probs.len());
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
