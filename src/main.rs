use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use cfrbot::agent::{self_play, StrategyAgent};
use cfrbot::cards::parse_deck;
use cfrbot::error::{Error, Result};
use cfrbot::{HoldemEngine, KuhnCfr, LeducCfr, ParallelTrainer, StrategyStore, Trainer};

#[derive(Parser)]
#[command(name = "cfrbot", about = "MCCFR poker strategy trainer and player")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GameKind {
    Kuhn,
    Leduc,
    Holdem,
}

#[derive(Subcommand)]
enum Command {
    /// Train an MCCFR strategy
    Train {
        #[arg(long, value_enum, default_value = "holdem")]
        game: GameKind,
        /// Training iterations (each runs one traversal per player)
        #[arg(long)]
        iters: usize,
        /// Restrict dealing to these cards, e.g. "SA,SK,SQ,..."
        #[arg(long)]
        deck: Option<String>,
        /// Resume from a node-table checkpoint
        #[arg(long)]
        load: Option<PathBuf>,
        /// Write the node-table checkpoint here after training
        #[arg(long)]
        save: Option<PathBuf>,
        /// Write the averaged strategy here (.txt for the text form)
        #[arg(long)]
        strategy: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        threads: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Play self-play hands from a trained strategy
    Play {
        #[arg(long)]
        strategy: PathBuf,
        #[arg(long, default_value_t = 10)]
        hands: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train {
            game,
            iters,
            deck,
            load,
            save,
            strategy,
            threads,
            seed,
        } => train(game, iters, deck, load, save, strategy, threads, seed),
        Command::Play { strategy, hands, seed } => play(&strategy, hands, seed),
    }
}

fn is_text(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "txt")
}

fn save_store(store: &StrategyStore, path: &Path) -> Result<()> {
    if is_text(path) {
        store.save_text(path)
    } else {
        store.save_binary(path)
    }
}

fn load_store(path: &Path) -> Result<StrategyStore> {
    if is_text(path) {
        StrategyStore::load_text(path)
    } else {
        StrategyStore::load_binary(path)
    }
}

#[allow(clippy::too_many_arguments)]
fn train(
    game: GameKind,
    iters: usize,
    deck: Option<String>,
    load: Option<PathBuf>,
    save: Option<PathBuf>,
    strategy: Option<PathBuf>,
    threads: usize,
    seed: u64,
) -> Result<()> {
    if game != GameKind::Holdem {
        if deck.is_some() {
            return Err(Error::Config("--deck only applies to holdem".into()));
        }
        if load.is_some() || save.is_some() {
            return Err(Error::Config("checkpoints only apply to holdem".into()));
        }
        if threads > 1 {
            return Err(Error::Config("--threads only applies to holdem".into()));
        }
    }

    match game {
        GameKind::Kuhn => {
            let mut trainer = KuhnCfr::new(3, seed)?;
            let value = trainer.run_iterations(iters)?;
            info!("kuhn: {} iterations, game value {:.4}", trainer.iterations, value);
            if let Some(path) = strategy {
                trainer.save_strategies(&path)?;
                info!("strategies written to {}", path.display());
            }
        }
        GameKind::Leduc => {
            let mut trainer = LeducCfr::new(3, 20, seed)?;
            let value = trainer.run_iterations(iters)?;
            info!("leduc: {} iterations, game value {:.4}", trainer.iterations, value);
            if let Some(path) = strategy {
                trainer.save_strategies(&path)?;
                info!("strategies written to {}", path.display());
            }
        }
        GameKind::Holdem => {
            let custom_deck = deck.as_deref().map(parse_deck).transpose()?;
            if threads > 1 {
                let mut trainer = ParallelTrainer::new(threads);
                if let Some(cards) = custom_deck {
                    trainer.set_custom_deck(cards);
                }
                if load.is_some() {
                    return Err(Error::Config(
                        "checkpoints resume single-threaded training only".into(),
                    ));
                }
                let value = trainer.run_iterations(iters, seed)?;
                info!("holdem: game value {:.4}, {} info sets", value, trainer.nodes().len());
                if let Some(path) = strategy {
                    let store = store_from_nodes(trainer.nodes().as_ref())?;
                    save_store(&store, &path)?;
                    info!("strategy written to {}", path.display());
                }
            } else {
                let mut trainer = Trainer::new(HoldemEngine::new(seed), seed);
                if let Some(cards) = custom_deck {
                    trainer.set_custom_deck(cards);
                }
                if let Some(path) = load {
                    trainer.load_checkpoint(&path)?;
                    info!("resumed {} info sets from {}", trainer.nodes().len(), path.display());
                }
                let value = trainer.run_iterations(iters)?;
                info!("holdem: game value {:.4}, {} info sets", value, trainer.nodes().len());
                if let Some(path) = save {
                    trainer.save_checkpoint(&path)?;
                    info!("checkpoint written to {}", path.display());
                }
                if let Some(path) = strategy {
                    let store = trainer.strategy_store()?;
                    save_store(&store, &path)?;
                    info!("strategy written to {}", path.display());
                }
            }
        }
    }
    Ok(())
}

fn store_from_nodes(
    nodes: &cfrbot::node::NodeTable<cfrbot::AbstractAction>,
) -> Result<StrategyStore> {
    let mut store = StrategyStore::new();
    for (key, actions, probs) in nodes.average_records() {
        store.insert(key, actions.into_iter().zip(probs).collect())?;
    }
    Ok(store)
}

fn play(strategy: &Path, hands: usize, seed: u64) -> Result<()> {
    let store = load_store(strategy)?;
    info!("loaded {} info sets from {}", store.len(), strategy.display());
    let mut agent = StrategyAgent::from_store(&store, seed);
    let mut engine = HoldemEngine::new(seed);
    let totals = self_play(&mut engine, &mut agent, hands)?;
    info!(
        "{} hands: seat 0 {:+.1}, seat 1 {:+.1}",
        hands, totals[0], totals[1]
    );
    Ok(())
}
