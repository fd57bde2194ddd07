//! Play-time agent over a trained strategy table.

use hashbrown::HashMap;
use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::abstraction::{AbstractAction, Abstraction};
use crate::distribution::{sample_weighted, uniform};
use crate::engine::{EngineAction, PokerEngine, Street};
use crate::error::{Error, Result};
use crate::infoset::{holdem_key, replay_history, InfoSetKey};
use crate::store::StrategyStore;
use crate::Utility;

pub struct StrategyAgent {
    policies: HashMap<InfoSetKey, Vec<(AbstractAction, f64)>>,
    abstraction: Abstraction,
    rng: SmallRng,
}

impl StrategyAgent {
    pub fn from_store(store: &StrategyStore, seed: u64) -> StrategyAgent {
        let mut policies = HashMap::with_capacity(store.len());
        for (key, record) in store.iter() {
            policies.insert(key.clone(), record.to_vec());
        }
        StrategyAgent {
            policies,
            abstraction: Abstraction::default(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Picks a concrete action for the current decision: rebuild the
    /// info-set key exactly as training did, sample the stored mixed
    /// strategy (uniform over the abstract set when the key is unknown),
    /// and invert the draw. Never fails on a missing info set.
    pub fn declare_action<E: PokerEngine>(
        &mut self,
        engine: &E,
        state: &E::State,
    ) -> Result<EngineAction> {
        let seat = engine.actor(state)?;
        let legal = engine.legal_actions(state)?;
        let public = engine.public(state);
        let hole = engine.private(state, seat);

        let history = replay_history(&public, &self.abstraction);
        let key = holdem_key(&hole, &public.board, &history);
        let actions = self.abstraction.abstract_actions(&legal, public.pot);
        if actions.is_empty() {
            return Err(Error::EngineProtocol("no abstract actions at a decision".into()));
        }

        let probs = match self.policies.get(&key) {
            Some(record) => match aligned_probs(record, &actions) {
                Ok(probs) => probs,
                Err(e) => {
                    warn!("{}; playing uniformly at {}", e, key);
                    uniform(actions.len())
                }
            },
            None => uniform(actions.len()),
        };

        let mut chosen = actions[sample_weighted(&probs, &mut self.rng)];

        // Never fold when calling is free.
        if chosen == AbstractAction::Fold && legal.call_amount == 0 {
            chosen = AbstractAction::Call;
        }
        // Big blind closing the preflop action for the minimum defends
        // rather than folds.
        if chosen == AbstractAction::Fold
            && public.street == Street::Preflop
            && public.histories[0].len() == 3
            && legal.call_amount == public.big_blind
        {
            chosen = AbstractAction::Call;
        }

        debug!("seat {} plays {} at {}", seat, chosen, key);
        self.abstraction.concrete(chosen, &legal, public.pot)
    }
}

/// Probabilities for the current abstract set, in its order. The stored
/// record must describe exactly this set; anything else means the
/// abstraction shifted under the table.
fn aligned_probs(record: &[(AbstractAction, f64)], actions: &[AbstractAction]) -> Result<Vec<f64>> {
    if record.len() != actions.len()
        || record.iter().zip(actions).any(|(&(a, _), &b)| a != b)
    {
        return Err(Error::Abstraction(format!(
            "stored record covers {:?}, node offers {:?}",
            record.iter().map(|&(a, _)| a).collect::<Vec<_>>(),
            actions
        )));
    }
    Ok(record.iter().map(|&(_, p)| p).collect())
}

/// Plays the agent against itself for `hands` rounds and returns the
/// cumulative payoff per seat.
pub fn self_play<E: PokerEngine>(
    engine: &mut E,
    agent: &mut StrategyAgent,
    hands: usize,
) -> Result<[Utility; 2]> {
    let mut totals = [0.0; 2];
    for hand in 0..hands {
        let (mut state, _) = engine.new_round(None)?;
        while !engine.is_terminal(&state) {
            let action = agent.declare_action(engine, &state)?;
            let (next, _) = engine.apply(&state, action)?;
            state = next;
        }
        let payoffs = engine.payoff(&state)?;
        debug!("hand {}: payoffs {:?}", hand, payoffs);
        totals[0] += payoffs[0];
        totals[1] += payoffs[1];
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::holdem::HoldemEngine;

    fn empty_agent(seed: u64) -> StrategyAgent {
        StrategyAgent::from_store(&StrategyStore::new(), seed)
    }

    #[test]
    fn unknown_info_sets_fall_back_to_uniform_play() {
        let mut engine = HoldemEngine::new(21);
        let mut agent = empty_agent(21);
        let (state, _) = engine.new_round(None).unwrap();
        // Every draw must invert to an action the engine accepts.
        for _ in 0..50 {
            let action = agent.declare_action(&engine, &state).unwrap();
            engine.apply(&state, action).unwrap();
        }
    }

    #[test]
    fn the_agent_finishes_hands() {
        let mut engine = HoldemEngine::new(33);
        let mut agent = empty_agent(33);
        let totals = self_play(&mut engine, &mut agent, 20).unwrap();
        assert_eq!(totals[0] + totals[1], 0.0);
    }

    #[test]
    fn free_calls_are_never_folded() {
        let mut agent = empty_agent(8);
        // Put the big blind on a decision after a limp over and over; the
        // sampled action may vary but folding must never surface.
        for seed in 0..20u64 {
            let mut engine = HoldemEngine::new(seed);
            let (state, _) = engine.new_round(None).unwrap();
            let (state, _) = engine.apply(&state, EngineAction::Call).unwrap();
            let action = agent.declare_action(&engine, &state).unwrap();
            assert_ne!(action, EngineAction::Fold);
        }
    }

    #[test]
    fn mismatched_records_recover_uniformly() {
        let record = vec![(AbstractAction::Fold, 0.5), (AbstractAction::Call, 0.5)];
        let actions = vec![AbstractAction::Call];
        assert!(aligned_probs(&record, &actions).is_err());
        let matching = vec![(AbstractAction::Fold, 0.5), (AbstractAction::Call, 0.5)];
        let actions = vec![AbstractAction::Fold, AbstractAction::Call];
        assert_eq!(aligned_probs(&matching, &actions).unwrap(), vec![0.5, 0.5]);
    }
}
