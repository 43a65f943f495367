//! Engine options shared by every command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use khet_core::HeuristicWeights;
use khet_mcts::{Difficulty, EngineConfig, MctsConfig};

#[derive(Args, Clone, Debug)]
pub struct EngineOptions {
    /// Engine config JSON file (partial files allowed)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Heuristic weights JSON file, as written by `khet train`
    #[arg(long, value_name = "FILE")]
    pub heuristics: Option<PathBuf>,

    /// Network weights manifest; heuristic evaluation when absent
    #[arg(long, value_name = "FILE")]
    pub weights: Option<PathBuf>,

    /// Search preset: easy, medium, hard or expert
    #[arg(long)]
    pub difficulty: Option<Difficulty>,

    /// MCTS iterations per move, overriding the preset
    #[arg(long)]
    pub iterations: Option<u32>,
}

impl EngineOptions {
    /// Config file first, then command-line overrides
    pub fn engine_config(&self, seed: Option<u64>) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };

        if let Some(difficulty) = self.difficulty {
            config.mcts = MctsConfig {
                iterations: difficulty.iterations(),
                rollout_depth: difficulty.rollout_depth(),
                ..config.mcts
            };
        }
        if let Some(iterations) = self.iterations {
            config = config.with_iterations(iterations);
        }
        if let Some(path) = &self.heuristics {
            let weights = HeuristicWeights::load(path)
                .with_context(|| format!("Failed to load heuristics: {}", path.display()))?;
            config = config.with_heuristics(weights);
        }
        if let Some(path) = &self.weights {
            config = config.with_weights_path(path);
        }
        if let Some(seed) = seed {
            config = config.with_seed(seed);
        }

        Ok(config)
    }
}
