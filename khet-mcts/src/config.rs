//! Search and engine configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use khet_core::HeuristicWeights;
use serde::{Deserialize, Serialize};

/// Preset strength levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn iterations(self) -> u32 {
        match self {
            Difficulty::Easy => 60,
            Difficulty::Medium => 250,
            Difficulty::Hard => 800,
            Difficulty::Expert => 2500,
        }
    }

    pub fn rollout_depth(self) -> u32 {
        match self {
            Difficulty::Easy => 12,
            Difficulty::Medium => 16,
            Difficulty::Hard => 20,
            Difficulty::Expert => 24,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// Dirichlet noise mixed into the root priors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootNoise {
    /// Dirichlet concentration
    pub alpha: f32,
    /// Share of the prior replaced by noise
    pub weight: f32,
}

impl Default for RootNoise {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            weight: 0.25,
        }
    }
}

/// MCTS parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Iterations per `choose_move`
    pub iterations: u32,
    /// UCB1 exploration constant (uniform priors)
    pub exploration: f32,
    /// PUCT constant (network priors)
    pub c_puct: f32,
    /// Base priority of an unvisited child under network priors
    pub unvisited_priority: f32,
    /// Maximum plies per rollout
    pub rollout_depth: u32,
    /// Probability that a rollout ply is chosen greedily
    pub greedy_fraction: f32,
    /// Moves sampled for a greedy rollout ply
    pub greedy_candidates: usize,
    /// Logistic temperature applied to the final rollout score
    pub rollout_scale: f32,
    /// Run the immediate-win / threat filters before searching
    pub tactical_filter: bool,
    /// Root prior noise; off for play, on for self-play
    pub root_noise: Option<RootNoise>,
    /// Visit-count temperature for the first `temperature_plies` plies.
    /// Zero always plays the most visited move.
    pub temperature: f32,
    pub temperature_plies: u32,
    /// Temperature from `temperature_plies` onward
    pub late_temperature: f32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Medium)
    }
}

impl MctsConfig {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            iterations: difficulty.iterations(),
            exploration: 1.41, // sqrt(2)
            c_puct: 1.5,
            unvisited_priority: 1000.0,
            rollout_depth: difficulty.rollout_depth(),
            greedy_fraction: 0.3,
            greedy_candidates: 4,
            rollout_scale: 400.0,
            tactical_filter: true,
            root_noise: None,
            temperature: 0.0,
            temperature_plies: 20,
            late_temperature: 0.0,
        }
    }

    /// Self-play exploration: root noise, then temperature 1.0 for the
    /// opening plies and 0.1 after
    pub fn with_exploration(self) -> Self {
        self.with_root_noise(RootNoise::default())
            .with_temperature(1.0, 20, 0.1)
    }

    pub fn with_root_noise(mut self, noise: RootNoise) -> Self {
        self.root_noise = Some(noise);
        self
    }

    pub fn with_temperature(mut self, early: f32, plies: u32, late: f32) -> Self {
        self.temperature = early;
        self.temperature_plies = plies;
        self.late_temperature = late;
        self
    }

    /// Move-choice temperature at game ply `ply`
    pub fn temperature_at(&self, ply: u32) -> f32 {
        if ply < self.temperature_plies {
            self.temperature
        } else {
            self.late_temperature
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_rollout_depth(mut self, depth: u32) -> Self {
        self.rollout_depth = depth;
        self
    }

    pub fn with_tactical_filter(mut self, enabled: bool) -> Self {
        self.tactical_filter = enabled;
        self
    }
}

/// Engine configuration, loadable from a partial JSON file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mcts: MctsConfig,
    /// Heuristic used by rollouts
    pub heuristics: HeuristicWeights,
    /// Network weights manifest; heuristic mode when absent or unusable
    pub weights_path: Option<PathBuf>,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mcts: MctsConfig::default(),
            heuristics: HeuristicWeights::default(),
            weights_path: None,
            seed: 42,
        }
    }
}

impl EngineConfig {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            mcts: MctsConfig::for_difficulty(difficulty),
            ..Default::default()
        }
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse engine config: {}", path.display()))?;
        Ok(config)
    }

    pub fn with_mcts(mut self, mcts: MctsConfig) -> Self {
        self.mcts = mcts;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.mcts.iterations = iterations;
        self
    }

    pub fn with_heuristics(mut self, heuristics: HeuristicWeights) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn with_weights_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.weights_path = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
