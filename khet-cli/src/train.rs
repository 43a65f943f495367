//! Train command - self-play tuning of the heuristic weights
//!
//! ## Architecture
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_trainer(), train(), save_results()

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use khet_core::HeuristicWeights;
use khet_mcts::CancelToken;
use khet_selfplay::{Trainer, TrainerConfig};

#[derive(Args)]
pub struct TrainArgs {
    /// Number of self-play games
    #[arg(long, default_value = "50")]
    pub games: u32,

    /// Trainer config JSON file (partial files allowed)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Starting heuristic weights; defaults when absent
    #[arg(long, value_name = "FILE")]
    pub heuristics: Option<PathBuf>,

    /// MCTS iterations per self-play move
    #[arg(long)]
    pub iterations: Option<u32>,

    #[arg(long)]
    pub learning_rate: Option<f32>,

    /// Ply cap per game
    #[arg(long)]
    pub max_moves: Option<u32>,

    /// Where to write the tuned weights
    #[arg(long, default_value = "heuristics.json")]
    pub output: PathBuf,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run(args: TrainArgs, seed: Option<u64>) -> Result<()> {
    let mut trainer = build_trainer(&args, seed)?;

    tracing::info!(
        "Training for {} games ({} iterations per move, lr {})",
        args.games,
        trainer.config().iterations,
        trainer.config().learning_rate
    );

    let weights = train(&mut trainer, args.games)?;
    save_results(&weights, &args)?;

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn build_trainer(args: &TrainArgs, seed: Option<u64>) -> Result<Trainer> {
    let mut config = match &args.config {
        Some(path) => TrainerConfig::load(path)?,
        None => TrainerConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config = config.with_iterations(iterations);
    }
    if let Some(lr) = args.learning_rate {
        config = config.with_learning_rate(lr);
    }
    if let Some(max_moves) = args.max_moves {
        config = config.with_max_moves(max_moves);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config.validate()?;

    let weights = match &args.heuristics {
        Some(path) => HeuristicWeights::load(path)?,
        None => HeuristicWeights::default(),
    };
    Ok(Trainer::with_weights(config, weights))
}

fn train(trainer: &mut Trainer, games: u32) -> Result<HeuristicWeights> {
    let progress = ProgressBar::new(games as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?,
    );

    let cancel = CancelToken::new();
    let weights = trainer.run(games, &cancel, |report| {
        progress.set_message(format!("loss {:.4}", report.loss_after));
        progress.inc(1);
    })?;

    progress.finish_with_message("done");
    Ok(weights)
}

fn save_results(weights: &HeuristicWeights, args: &TrainArgs) -> Result<()> {
    weights.save(&args.output)?;
    println!("Saved weights to {}", args.output.display());
    println!(
        "{}",
        serde_json::to_string_pretty(weights).context("Failed to format weights")?
    );
    Ok(())
}
