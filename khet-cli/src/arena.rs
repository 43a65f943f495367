//! Arena command - parallel match between two engine setups
//!
//! Side A is configured by the shared engine options. Side B defaults to
//! the same setup in heuristic mode, or uses `--b-heuristics` and
//! `--b-weights` when given.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use khet_core::HeuristicWeights;
use khet_mcts::EngineConfig;
use khet_selfplay::{play_match, MatchResult, DEFAULT_MAX_MOVES};

use crate::options::EngineOptions;

#[derive(Args)]
pub struct ArenaArgs {
    #[command(flatten)]
    pub engine: EngineOptions,

    /// Heuristic weights for side B
    #[arg(long, value_name = "FILE")]
    pub b_heuristics: Option<PathBuf>,

    /// Network weights for side B
    #[arg(long, value_name = "FILE")]
    pub b_weights: Option<PathBuf>,

    /// Number of games (colours alternate)
    #[arg(long, default_value = "10")]
    pub games: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_MOVES)]
    pub max_moves: u32,
}

pub fn run(args: ArenaArgs, seed: Option<u64>) -> Result<()> {
    let config_a = args.engine.engine_config(seed)?;
    let config_b = side_b_config(&config_a, &args)?;

    tracing::info!(
        "Arena: {} games, A {} vs B {}",
        args.games,
        describe(&config_a),
        describe(&config_b)
    );

    let result = play_match(&config_a, &config_b, args.games, args.max_moves, config_a.seed)?;
    print_results(&result);

    Ok(())
}

fn side_b_config(config_a: &EngineConfig, args: &ArenaArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig {
        weights_path: args.b_weights.clone(),
        ..config_a.clone()
    };
    if let Some(path) = &args.b_heuristics {
        config = config.with_heuristics(HeuristicWeights::load(path)?);
    }
    Ok(config)
}

fn describe(config: &EngineConfig) -> String {
    match &config.weights_path {
        Some(path) => format!("network {}", path.display()),
        None => "heuristic".to_string(),
    }
}

fn print_results(result: &MatchResult) {
    println!("{}", result);
    println!(
        "A win rate {:.1}%, B win rate {:.1}%",
        result.a_win_rate() * 100.0,
        result.b_win_rate() * 100.0
    );
}
