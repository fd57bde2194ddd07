//! Regret accumulation per information set, and the table holding it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::infoset::InfoSetKey;

/// Accumulated regrets and strategy mass for one information set. The
/// action list is frozen at creation; both sums are fixed-length arrays
/// aligned with it, indexed by action offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node<A> {
    actions: Vec<A>,
    regret_sum: Vec<f64>,
    strategy_sum: Vec<f64>,
}

impl<A: Clone + PartialEq> Node<A> {
    pub fn new(actions: Vec<A>) -> Node<A> {
        debug_assert!(!actions.is_empty());
        let n = actions.len();
        Node {
            actions,
            regret_sum: vec![0.0; n],
            strategy_sum: vec![0.0; n],
        }
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn regret_sum(&self) -> &[f64] {
        &self.regret_sum
    }

    pub fn strategy_sum(&self) -> &[f64] {
        &self.strategy_sum
    }

    /// Regret matching: probability proportional to positive cumulative
    /// regret, uniform when none is positive. A pure derivation — calling
    /// it repeatedly without mutation returns identical vectors.
    pub fn current_strategy(&self) -> Vec<f64> {
        let mut probs: Vec<f64> = self.regret_sum.iter().map(|r| r.max(0.0)).collect();
        let total: f64 = probs.iter().sum();
        if total > 0.0 {
            for p in probs.iter_mut() {
                *p /= total;
            }
        } else {
            let n = probs.len();
            for p in probs.iter_mut() {
                *p = 1.0 / n as f64;
            }
        }
        probs
    }

    /// Average strategy over all iterations — the policy that converges
    /// toward equilibrium.
    pub fn average_strategy(&self) -> Vec<f64> {
        let total: f64 = self.strategy_sum.iter().sum();
        if total > 0.0 {
            self.strategy_sum.iter().map(|s| s / total).collect()
        } else {
            let n = self.strategy_sum.len();
            vec![1.0 / n as f64; n]
        }
    }

    fn add_regrets(&mut self, deltas: &[f64]) {
        debug_assert_eq!(deltas.len(), self.regret_sum.len());
        for (sum, delta) in self.regret_sum.iter_mut().zip(deltas) {
            *sum += delta;
        }
    }

    fn add_strategy(&mut self, probs: &[f64]) {
        debug_assert_eq!(probs.len(), self.strategy_sum.len());
        for (sum, p) in self.strategy_sum.iter_mut().zip(probs) {
            *sum += p;
        }
    }
}

/// All regret nodes keyed by information set. Backed by a concurrent map
/// so the parallel trainer can share one table across threads; updates
/// lock a single entry at a time, and lookups clone the data out so no
/// shard lock is held across recursion.
#[derive(Debug)]
pub struct NodeTable<A> {
    nodes: DashMap<InfoSetKey, Node<A>>,
}

impl<A: Clone + PartialEq> NodeTable<A> {
    pub fn new() -> NodeTable<A> {
        NodeTable { nodes: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a fresh node on the first visit. The action set at a key
    /// is a function of the game and the abstraction, so a revisit with a
    /// different set means the adapter broke its contract.
    pub fn ensure(&self, key: &InfoSetKey, actions: &[A]) -> Result<()> {
        let entry = self
            .nodes
            .entry(key.clone())
            .or_insert_with(|| Node::new(actions.to_vec()));
        if entry.actions() != actions {
            return Err(Error::EngineProtocol(format!(
                "action set changed at info set {}",
                key
            )));
        }
        Ok(())
    }

    pub fn current_strategy(&self, key: &InfoSetKey) -> Option<Vec<f64>> {
        self.nodes.get(key).map(|node| node.current_strategy())
    }

    pub fn average_strategy(&self, key: &InfoSetKey) -> Option<Vec<f64>> {
        self.nodes.get(key).map(|node| node.average_strategy())
    }

    pub fn actions(&self, key: &InfoSetKey) -> Option<Vec<A>> {
        self.nodes.get(key).map(|node| node.actions().to_vec())
    }

    pub fn add_regrets(&self, key: &InfoSetKey, deltas: &[f64]) {
        if let Some(mut node) = self.nodes.get_mut(key) {
            node.add_regrets(deltas);
        }
    }

    pub fn add_strategy(&self, key: &InfoSetKey, probs: &[f64]) {
        if let Some(mut node) = self.nodes.get_mut(key) {
            node.add_strategy(probs);
        }
    }

    /// Drains the table into a sorted record list (checkpointing).
    pub fn to_records(&self) -> Vec<(InfoSetKey, Node<A>)> {
        let mut records: Vec<(InfoSetKey, Node<A>)> = self
            .nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    pub fn from_records(records: Vec<(InfoSetKey, Node<A>)>) -> NodeTable<A> {
        let table = NodeTable::new();
        for (key, node) in records {
            table.nodes.insert(key, node);
        }
        table
    }

    /// Average strategies for every node, sorted by key.
    pub fn average_records(&self) -> Vec<(InfoSetKey, Vec<A>, Vec<f64>)> {
        let mut records: Vec<(InfoSetKey, Vec<A>, Vec<f64>)> = self
            .nodes
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().actions().to_vec(),
                    entry.value().average_strategy(),
                )
            })
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> InfoSetKey {
        InfoSetKey::from(raw.to_string())
    }

    #[test]
    fn fresh_node_plays_uniformly() {
        let node = Node::new(vec![0u8, 1, 2]);
        let strategy = node.current_strategy();
        assert_eq!(strategy, vec![1.0 / 3.0; 3]);
        assert_eq!(node.average_strategy(), vec![1.0 / 3.0; 3]);
    }

    #[test]
    fn regret_matching_tracks_positive_regret_only() {
        let mut node = Node::new(vec![0u8, 1, 2]);
        node.add_regrets(&[3.0, -5.0, 1.0]);
        let strategy = node.current_strategy();
        assert!((strategy[0] - 0.75).abs() < 1e-9);
        assert_eq!(strategy[1], 0.0);
        assert!((strategy[2] - 0.25).abs() < 1e-9);
        assert!((strategy.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn current_strategy_is_idempotent() {
        let mut node = Node::new(vec![0u8, 1]);
        node.add_regrets(&[2.0, 7.0]);
        assert_eq!(node.current_strategy(), node.current_strategy());
    }

    #[test]
    fn average_strategy_normalizes_the_mass() {
        let mut node = Node::new(vec![0u8, 1]);
        node.add_strategy(&[0.25, 0.75]);
        node.add_strategy(&[0.75, 0.25]);
        assert_eq!(node.average_strategy(), vec![0.5, 0.5]);
    }

    #[test]
    fn single_action_nodes_are_degenerate() {
        let mut node = Node::new(vec![9u8]);
        assert_eq!(node.current_strategy(), vec![1.0]);
        node.add_regrets(&[0.0]);
        assert_eq!(node.current_strategy(), vec![1.0]);
    }

    #[test]
    fn ensure_freezes_the_action_set() {
        let table: NodeTable<u8> = NodeTable::new();
        let k = key("0[]");
        table.ensure(&k, &[0, 1]).unwrap();
        table.ensure(&k, &[0, 1]).unwrap();
        assert!(table.ensure(&k, &[0, 1, 2]).is_err());
        assert_eq!(table.actions(&k), Some(vec![0, 1]));
    }

    #[test]
    fn records_round_trip() {
        let table: NodeTable<u8> = NodeTable::new();
        table.ensure(&key("b"), &[0, 1]).unwrap();
        table.ensure(&key("a"), &[0, 1]).unwrap();
        table.add_regrets(&key("a"), &[1.0, 2.0]);
        let records = table.to_records();
        assert_eq!(records[0].0, key("a"));
        let restored = NodeTable::from_records(records);
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.current_strategy(&key("a")),
            table.current_strategy(&key("a"))
        );
    }
}
