pub mod abstraction;
pub mod agent;
pub mod cards;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod eval;
pub mod infoset;
pub mod kuhn;
pub mod leduc;
pub mod mccfr;
pub mod mccfr_parallel;
pub mod node;
pub mod store;

pub use self::abstraction::{AbstractAction, Abstraction, POT_FRACTIONS};
pub use self::agent::StrategyAgent;
pub use self::engine::holdem::HoldemEngine;
pub use self::engine::PokerEngine;
pub use self::error::{Error, Result};
pub use self::kuhn::KuhnCfr;
pub use self::leduc::LeducCfr;
pub use self::mccfr::Trainer;
pub use self::mccfr_parallel::ParallelTrainer;
pub use self::store::StrategyStore;

/// Seat index at the two-handed table.
pub type Seat = usize;

/// Signed utility, measured as a stack delta.
pub type Utility = f64;
