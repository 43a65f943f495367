//! Self-play heuristic tuner
//!
//! Finite-difference hill climbing over [`HeuristicWeights`]: play a game,
//! score every recorded position against the final result, nudge each
//! weight along its one-sided difference quotient.
//!
//! ## Architecture
//! - Level 2: `Trainer::run` - game loop with cancellation
//! - Level 3: `Trainer::step` - one game and one update
//! - Level 4: loss and gradient

use std::path::Path;

use anyhow::{bail, Context};
use khet_core::{evaluate, GameState, HeuristicWeights, Player, NUM_PARAMS};
use khet_mcts::{CancelToken, Engine, EngineConfig, MctsConfig, SearchError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::game_runner::{GameRecord, GameRunner, DEFAULT_MAX_MOVES};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tuner settings, loadable from a partial JSON file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Finite-difference step
    pub epsilon: f32,
    pub learning_rate: f32,
    /// Divisor applied to heuristic scores before `tanh`
    pub loss_scale: f32,
    pub min_weight: f32,
    pub max_weight: f32,
    /// Ply cap per game; reaching it is a draw
    pub max_moves: u32,
    /// MCTS iterations per self-play move
    pub iterations: u32,
    pub rollout_depth: u32,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            learning_rate: 50.0,
            loss_scale: 500.0,
            min_weight: 0.0,
            max_weight: 500.0,
            max_moves: DEFAULT_MAX_MOVES,
            iterations: 40,
            rollout_depth: 8,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trainer config: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid trainer config: {}", path.display()))
    }

    /// Parse and validate a (possibly partial) JSON config
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse trainer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the finite-difference update cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            bail!("epsilon must be positive, got {}", self.epsilon);
        }
        if self.loss_scale.is_nan() || self.loss_scale <= 0.0 {
            bail!("loss_scale must be positive, got {}", self.loss_scale);
        }
        // False for NaN bounds as well
        let ordered = self.min_weight <= self.max_weight;
        if !ordered {
            bail!(
                "invalid weight bounds: min {}, max {}",
                self.min_weight,
                self.max_weight
            );
        }
        Ok(())
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_max_moves(mut self, max_moves: u32) -> Self {
        self.max_moves = max_moves;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Engine settings both self-play sides use: root noise and an opening
    /// temperature keep the games from repeating
    fn engine_config(&self, weights: HeuristicWeights, seed: u64) -> EngineConfig {
        EngineConfig::default()
            .with_mcts(
                MctsConfig::default()
                    .with_iterations(self.iterations)
                    .with_rollout_depth(self.rollout_depth)
                    .with_exploration(),
            )
            .with_heuristics(weights)
            .with_seed(seed)
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// What one training game did
#[derive(Clone, Debug)]
pub struct GameReport {
    /// 1-based game number
    pub game: u32,
    pub winner: Option<Player>,
    pub move_count: u32,
    /// Loss over the game's positions before the update
    pub loss_before: f32,
    /// Same positions after the update
    pub loss_after: f32,
    /// Weights after the update
    pub weights: HeuristicWeights,
}

impl std::fmt::Display for GameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self.winner {
            Some(p) => format!("{} wins", p),
            None => "draw".to_string(),
        };
        write!(
            f,
            "game {}: {} in {} plies, loss {:.4} -> {:.4}",
            self.game, result, self.move_count, self.loss_before, self.loss_after
        )
    }
}

// ============================================================================
// TRAINER
// ============================================================================

/// Owns the weights being tuned
pub struct Trainer {
    config: TrainerConfig,
    weights: HeuristicWeights,
    rng: ChaCha8Rng,
    games_played: u32,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self::with_weights(config, HeuristicWeights::default())
    }

    /// Start from existing weights
    pub fn with_weights(config: TrainerConfig, weights: HeuristicWeights) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            weights,
            games_played: 0,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn weights(&self) -> &HeuristicWeights {
        &self.weights
    }

    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    /// Play and learn from one game
    pub fn step(&mut self) -> Result<GameReport, SearchError> {
        let report = self.step_cancellable(&CancelToken::new())?;
        report.ok_or(SearchError::NoLegalMoves)
    }

    /// Train for up to `games` games, calling `on_game` after each.
    ///
    /// Cancellation is checked before every game and between moves. A game
    /// cut short is discarded, so the returned weights are always the
    /// result of whole updates.
    pub fn run<F>(
        &mut self,
        games: u32,
        cancel: &CancelToken,
        mut on_game: F,
    ) -> Result<HeuristicWeights, SearchError>
    where
        F: FnMut(&GameReport),
    {
        for _ in 0..games {
            if cancel.is_cancelled() {
                tracing::info!("Training cancelled after {} games", self.games_played);
                break;
            }
            match self.step_cancellable(cancel)? {
                Some(report) => {
                    tracing::debug!("{}", report);
                    on_game(&report);
                }
                None => {
                    tracing::info!("Training cancelled mid-game after {} games", self.games_played);
                    break;
                }
            }
        }

        tracing::info!(
            "Training finished: {} games, weights {:?}",
            self.games_played,
            self.weights
        );
        Ok(self.weights)
    }

    /// One game plus update; `None` when the game was cancelled
    fn step_cancellable(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Option<GameReport>, SearchError> {
        let record = self.play_self_game(cancel)?;
        if record.cancelled {
            return Ok(None);
        }

        let samples: Vec<(GameState, f32)> = record
            .training_targets()
            .map(|(s, z)| (s.clone(), z))
            .collect();

        let loss_before = loss(&samples, &self.weights, self.config.loss_scale);
        let updated = gradient_step(&samples, &self.weights, &self.config);
        let loss_after = loss(&samples, &updated, self.config.loss_scale);

        self.weights = updated;
        self.games_played += 1;

        Ok(Some(GameReport {
            game: self.games_played,
            winner: record.winner,
            move_count: record.move_count,
            loss_before,
            loss_after,
            weights: self.weights,
        }))
    }

    fn play_self_game(&mut self, cancel: &CancelToken) -> Result<GameRecord, SearchError> {
        let runner = GameRunner::new(self.config.max_moves, self.config.seed);
        let mut silver = Engine::new(self.config.engine_config(self.weights, self.rng.gen()));
        let mut red = Engine::new(self.config.engine_config(self.weights, self.rng.gen()));
        runner.play(&mut silver, &mut red, GameState::new_game(), cancel)
    }
}

// ============================================================================
// LOSS AND GRADIENT (Level 4)
// ============================================================================

/// Mean squared error between `tanh(score / scale)` and the game result,
/// both from the side to move. Zero for no samples.
pub fn loss(samples: &[(GameState, f32)], weights: &HeuristicWeights, scale: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f32 = samples
        .iter()
        .map(|(state, z)| {
            let prediction = (evaluate(state, weights) / scale).tanh();
            (prediction - z).powi(2)
        })
        .sum();
    total / samples.len() as f32
}

/// One finite-difference update. Every delta is measured against the same
/// base weights before any of them is applied. A config that fails
/// [`TrainerConfig::validate`] leaves the weights unchanged.
pub fn gradient_step(
    samples: &[(GameState, f32)],
    weights: &HeuristicWeights,
    config: &TrainerConfig,
) -> HeuristicWeights {
    if let Err(e) = config.validate() {
        tracing::warn!("Skipping weight update: {}", e);
        return *weights;
    }

    let base = weights.params();
    let base_loss = loss(samples, weights, config.loss_scale);

    let mut gradient = [0.0f32; NUM_PARAMS];
    for (i, g) in gradient.iter_mut().enumerate() {
        let mut nudged = base;
        nudged[i] += config.epsilon;
        let nudged_loss = loss(samples, &HeuristicWeights::from_params(nudged), config.loss_scale);
        *g = (nudged_loss - base_loss) / config.epsilon;
    }

    let mut next = base;
    for (w, g) in next.iter_mut().zip(gradient) {
        *w = (*w - config.learning_rate * g).clamp(config.min_weight, config.max_weight);
    }
    HeuristicWeights::from_params(next)
}
