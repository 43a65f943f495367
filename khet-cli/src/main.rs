//! Khet CLI - Command-line interface
//!
//! Commands:
//! - play: Engine vs engine from the classic layout
//! - train: Self-play tuning of the heuristic weights
//! - arena: Parallel match between two engine setups
//! - inspect-weights: Load a network manifest and run one forward pass

mod arena;
mod inspect;
mod options;
mod play;
mod train;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "khet")]
#[command(about = "Khet engine: MCTS with a value/policy network or heuristic fallback")]
struct Cli {
    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single engine-vs-engine game
    Play(play::PlayArgs),
    /// Tune heuristic weights by self-play
    Train(train::TrainArgs),
    /// Match two engine setups against each other
    Arena(arena::ArenaArgs),
    /// Inspect a network weights manifest
    InspectWeights(inspect::InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Play(args) => play::run(args, cli.seed),
        Commands::Train(args) => train::run(args, cli.seed),
        Commands::Arena(args) => arena::run(args, cli.seed),
        Commands::InspectWeights(args) => inspect::run(args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
