//! Khet MCTS - Monte Carlo Tree Search engine
//!
//! This crate provides:
//! - Arena search tree with PUCT (network priors) or UCB1 (uniform priors)
//! - Semi-greedy heuristic rollouts
//! - Tactical root filters (immediate win, opponent threats)
//! - A resumable `Search` and the `Engine` facade

pub mod config;
pub mod engine;
pub mod rollout;
pub mod search;
pub mod tactics;
pub mod tree;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use config::{Difficulty, EngineConfig, MctsConfig, RootNoise};
pub use engine::{Engine, EvalMode};
pub use search::{LeafEvaluator, MoveStats, Search, SearchError, SearchStats, SearchStatus};
pub use tree::{MctsTree, NodeId};

/// Shared cancellation flag for searches and training runs
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
