//! Khet core - rules engine and evaluation
//!
//! This crate provides the game logic for Khet 2.0 on the 10x8 board:
//! - Board geometry, directions and square restrictions
//! - Piece kinds and their laser interactions
//! - Game state, move generation and two-phase move application
//! - Laser resolution with pending hits
//! - Heuristic position evaluation
//! - Board encoding and move-index mapping for the network

pub mod board;
pub mod pieces;
pub mod game;
pub mod laser;
pub mod eval;
pub mod encode;

// Re-exports for convenient access
pub use board::{Direction, Square, COLS, ROWS, NUM_SQUARES};
pub use pieces::{Piece, PieceKind, LaserEffect, laser_effect, sphinx_home};
pub use game::{GameState, GameError, Move, Player};
pub use laser::{LaserTrace, PendingHit, TraceOutcome, TraceStep};
pub use eval::{
    HeuristicWeights, evaluate, evaluate_for, material_score, NUM_PARAMS, WIN_SCORE, THREAT_SCORE,
};
pub use encode::{
    encode, decode, move_index, index_to_move, policy_index, split_policy_index, INPUT_LEN,
    POLICY_LEN,
};
