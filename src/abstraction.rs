//! Pot-relative action abstraction shared between training and runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineAction, LegalActions};
use crate::error::{Error, Result};

/// Raise sizes as pot fractions, shared between training and runtime.
/// Changing this table invalidates previously trained strategy tables.
pub const POT_FRACTIONS: [f64; 7] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0];

/// A symbolic action in the fixed abstraction. `PotFraction` indexes into
/// [`POT_FRACTIONS`]. The declared order is the iteration order
/// everywhere, which keeps seeded sampling reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbstractAction {
    Fold,
    Call,
    PotFraction(u8),
    AllIn,
}

impl AbstractAction {
    /// Stable byte tag used by the binary strategy schema.
    pub fn tag(self) -> u8 {
        match self {
            AbstractAction::Fold => 0,
            AbstractAction::Call => 1,
            AbstractAction::PotFraction(i) => 2 + i,
            AbstractAction::AllIn => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Result<AbstractAction> {
        match tag {
            0 => Ok(AbstractAction::Fold),
            1 => Ok(AbstractAction::Call),
            9 => Ok(AbstractAction::AllIn),
            t if (2..9).contains(&t) => Ok(AbstractAction::PotFraction(t - 2)),
            t => Err(Error::Abstraction(format!("unknown action tag {}", t))),
        }
    }

    pub fn fraction(self) -> Option<f64> {
        match self {
            AbstractAction::PotFraction(i) => Some(POT_FRACTIONS[i as usize]),
            _ => None,
        }
    }
}

impl fmt::Display for AbstractAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractAction::Fold => write!(f, "f"),
            AbstractAction::Call => write!(f, "c"),
            AbstractAction::AllIn => write!(f, "a"),
            AbstractAction::PotFraction(i) => {
                let percent = (POT_FRACTIONS[*i as usize] * 100.0).round() as u32;
                write!(f, "r{}", percent)
            }
        }
    }
}

/// Maps the engine's wide legal-action set onto the symbolic set and
/// back. Holds the enabled fraction indices; the set may be empty for a
/// pure fold/call/all-in abstraction.
#[derive(Debug, Clone)]
pub struct Abstraction {
    fractions: Vec<u8>,
}

impl Default for Abstraction {
    fn default() -> Self {
        Abstraction {
            fractions: (0..POT_FRACTIONS.len() as u8).collect(),
        }
    }
}

impl Abstraction {
    pub fn with_fractions(fractions: Vec<u8>) -> Result<Abstraction> {
        for window in fractions.windows(2) {
            if window[0] >= window[1] {
                return Err(Error::Config("fraction indices must be ascending".into()));
            }
        }
        if let Some(&last) = fractions.last() {
            if last as usize >= POT_FRACTIONS.len() {
                return Err(Error::Config(format!("fraction index {} out of range", last)));
            }
        }
        Ok(Abstraction { fractions })
    }

    pub fn fold_call_all_in() -> Abstraction {
        Abstraction { fractions: Vec::new() }
    }

    /// The ordered symbolic action set legal at this node. Depends only
    /// on the legal actions and the pot.
    pub fn abstract_actions(&self, legal: &LegalActions, pot: u32) -> Vec<AbstractAction> {
        let mut actions = Vec::new();
        if legal.call_amount != 0 {
            actions.push(AbstractAction::Fold);
        }
        actions.push(AbstractAction::Call);
        if let Some(raise) = legal.raise {
            for &i in &self.fractions {
                let amount = (POT_FRACTIONS[i as usize] * pot as f64).floor() as u32;
                if amount >= raise.min && amount < raise.max {
                    actions.push(AbstractAction::PotFraction(i));
                }
            }
            actions.push(AbstractAction::AllIn);
        }
        actions
    }

    /// Inverts a symbolic action into the concrete engine action.
    pub fn concrete(
        &self,
        action: AbstractAction,
        legal: &LegalActions,
        pot: u32,
    ) -> Result<EngineAction> {
        match action {
            AbstractAction::Fold => Ok(EngineAction::Fold),
            AbstractAction::Call => Ok(EngineAction::Call),
            AbstractAction::AllIn => match legal.raise {
                Some(raise) => Ok(EngineAction::Raise(raise.max)),
                None => Err(Error::Abstraction("all-in with no legal raise".into())),
            },
            AbstractAction::PotFraction(i) => {
                let amount = (POT_FRACTIONS[i as usize] * pot as f64).floor() as u32;
                Ok(EngineAction::Raise(amount))
            }
        }
    }

    /// Maps an observed raise-to amount back into the abstraction: all-in
    /// at or above the all-in total, otherwise the nearest enabled
    /// fraction of the pot (ties to the smaller fraction). With no
    /// fractions enabled, every raise reads as all-in.
    pub fn nearest(&self, amount: u32, pot: u32, all_in: u32) -> AbstractAction {
        if amount >= all_in {
            return AbstractAction::AllIn;
        }
        let target = amount as f64 / pot as f64;
        let mut best: Option<(f64, u8)> = None;
        for &i in &self.fractions {
            let diff = (POT_FRACTIONS[i as usize] - target).abs();
            if best.map_or(true, |(d, _)| diff < d) {
                best = Some((diff, i));
            }
        }
        match best {
            Some((_, i)) => AbstractAction::PotFraction(i),
            None => AbstractAction::AllIn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RaiseBounds;

    fn legal(call: u32, raise: Option<(u32, u32)>) -> LegalActions {
        LegalActions {
            fold_allowed: true,
            call_amount: call,
            raise: raise.map(|(min, max)| RaiseBounds { min, max }),
        }
    }

    fn fractions(actions: &[AbstractAction]) -> Vec<f64> {
        actions.iter().filter_map(|a| a.fraction()).collect()
    }

    #[test]
    fn facing_a_bet_yields_the_full_ladder() {
        let a = Abstraction::default();
        let actions = a.abstract_actions(&legal(1, Some((2, 100))), 10);
        assert_eq!(actions[0], AbstractAction::Fold);
        assert_eq!(actions[1], AbstractAction::Call);
        assert_eq!(*actions.last().unwrap(), AbstractAction::AllIn);
        assert_eq!(fractions(&actions), vec![0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0]);
    }

    #[test]
    fn free_call_drops_fold_and_allin_collisions() {
        let a = Abstraction::default();
        let actions = a.abstract_actions(&legal(0, Some((2, 100))), 50);
        // 2.0 * 50 collides with the all-in amount, 3.0 * 50 exceeds it.
        assert_eq!(actions[0], AbstractAction::Call);
        assert_eq!(*actions.last().unwrap(), AbstractAction::AllIn);
        assert_eq!(fractions(&actions), vec![0.25, 0.5, 0.75, 1.0, 1.5]);
    }

    #[test]
    fn empty_pot_offers_no_fractions() {
        let a = Abstraction::default();
        let actions = a.abstract_actions(&legal(1, Some((2, 100))), 0);
        assert_eq!(
            actions,
            vec![AbstractAction::Fold, AbstractAction::Call, AbstractAction::AllIn]
        );
    }

    #[test]
    fn the_same_inputs_always_abstract_the_same_way() {
        let a = Abstraction::default();
        let l = legal(3, Some((6, 80)));
        let first = a.abstract_actions(&l, 24);
        for _ in 0..3 {
            assert_eq!(a.abstract_actions(&l, 24), first);
        }
    }

    #[test]
    fn all_in_already_matched_leaves_call_only() {
        let a = Abstraction::default();
        let actions = a.abstract_actions(&legal(0, None), 40);
        assert_eq!(actions, vec![AbstractAction::Call]);
    }

    #[test]
    fn empty_fraction_set_needs_no_special_case() {
        let a = Abstraction::fold_call_all_in();
        let actions = a.abstract_actions(&legal(5, Some((10, 100))), 40);
        assert_eq!(
            actions,
            vec![AbstractAction::Fold, AbstractAction::Call, AbstractAction::AllIn]
        );
        assert_eq!(a.nearest(30, 40, 100), AbstractAction::AllIn);
    }

    #[test]
    fn nearest_fraction_prefers_the_smaller_on_ties() {
        let a = Abstraction::default();
        assert_eq!(a.nearest(7, 10, 100), AbstractAction::PotFraction(2));
        assert_eq!(a.nearest(100, 10, 100), AbstractAction::AllIn);
        // 0.375 pot sits exactly between 0.25 and 0.5.
        assert_eq!(a.nearest(3, 8, 100), AbstractAction::PotFraction(0));
    }

    #[test]
    fn concrete_inverts_every_abstract_action() {
        let a = Abstraction::default();
        let l = legal(1, Some((2, 100)));
        for action in a.abstract_actions(&l, 10) {
            let concrete = a.concrete(action, &l, 10).unwrap();
            match (action, concrete) {
                (AbstractAction::Fold, EngineAction::Fold) => {}
                (AbstractAction::Call, EngineAction::Call) => {}
                (AbstractAction::AllIn, EngineAction::Raise(100)) => {}
                (AbstractAction::PotFraction(i), EngineAction::Raise(amount)) => {
                    assert_eq!(amount, (POT_FRACTIONS[i as usize] * 10.0).floor() as u32);
                    assert!(amount >= 2 && amount < 100);
                }
                other => panic!("bad inversion {:?}", other),
            }
        }
    }

    #[test]
    fn tags_round_trip_in_declared_order() {
        let all = [
            AbstractAction::Fold,
            AbstractAction::Call,
            AbstractAction::PotFraction(0),
            AbstractAction::PotFraction(6),
            AbstractAction::AllIn,
        ];
        assert_eq!(all.iter().map(|a| a.tag()).collect::<Vec<_>>(), vec![0, 1, 2, 8, 9]);
        for a in all {
            assert_eq!(AbstractAction::from_tag(a.tag()).unwrap(), a);
        }
        assert!(AbstractAction::from_tag(10).is_err());
    }

    #[test]
    fn tokens_are_stable() {
        let a = Abstraction::default();
        let tokens: Vec<String> = a
            .abstract_actions(&legal(1, Some((2, 1000))), 100)
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(
            tokens,
            vec!["f", "c", "r25", "r50", "r75", "r100", "r150", "r200", "r300", "a"]
        );
    }
}
