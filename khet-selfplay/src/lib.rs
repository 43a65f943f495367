//! Khet self-play - games, heuristic tuning and engine matches
//!
//! This crate provides:
//! - `GameRunner` for single engine-vs-engine games
//! - `Trainer`, a finite-difference tuner for heuristic weights
//! - `arena::play_match`, parallel matches between two engine configs

pub mod arena;
pub mod game_runner;
pub mod trainer;

pub use arena::{play_match, MatchResult};
pub use game_runner::{GameRecord, GameRunner, DEFAULT_MAX_MOVES};
pub use trainer::{GameReport, Trainer, TrainerConfig};
