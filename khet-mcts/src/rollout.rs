//! Semi-greedy rollouts for heuristic leaf evaluation
//!
//! ## Architecture
//! - Level 3: Single rollout
//! - Level 4: Move choice per ply

use khet_core::{evaluate_for, material_score, GameState, HeuristicWeights, Move, Player};
use rand::prelude::*;

use crate::MctsConfig;

/// Outcome of one rollout
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RolloutResult {
    /// Score in [0, 1] for the root player
    pub value: f32,
    pub moves_played: u32,
}

/// Logistic squash of a heuristic score into [0, 1]
pub fn squash(score: f32, scale: f32) -> f32 {
    1.0 / (1.0 + (-score / scale).exp())
}

// ============================================================================
// ROLLOUT (Level 3)
// ============================================================================

/// Play up to `config.rollout_depth` plies from `state` and score the result
/// for `root_player`.
pub fn rollout<R: Rng>(
    state: &GameState,
    root_player: Player,
    config: &MctsConfig,
    weights: &HeuristicWeights,
    rng: &mut R,
) -> RolloutResult {
    let mut current = state.clone();
    let mut moves_played = 0;

    while !current.is_over() && moves_played < config.rollout_depth {
        let legal_moves = current.legal_moves();
        if legal_moves.is_empty() {
            break;
        }

        let mv = if rng.gen::<f32>() < config.greedy_fraction {
            select_greedy_move(&current, &legal_moves, config.greedy_candidates, weights, rng)
        } else {
            legal_moves[rng.gen_range(0..legal_moves.len())]
        };
        current.play_unchecked(mv);
        moves_played += 1;
    }

    let value = match current.winner() {
        Some(w) if w == root_player => 1.0,
        Some(_) => 0.0,
        None => squash(
            evaluate_for(&current, root_player, weights),
            config.rollout_scale,
        ),
    };

    RolloutResult { value, moves_played }
}

// ============================================================================
// MOVE CHOICE (Level 4)
// ============================================================================

/// Sample up to `candidates` moves and keep the best by material after the
/// move, for the side making it.
fn select_greedy_move<R: Rng>(
    state: &GameState,
    moves: &[Move],
    candidates: usize,
    weights: &HeuristicWeights,
    rng: &mut R,
) -> Move {
    let mover = state.current_player();
    let mut best = moves[0];
    let mut best_score = f32::NEG_INFINITY;

    for &mv in moves.choose_multiple(rng, candidates.max(1)) {
        let score = material_score(&state.with_move(mv), mover, weights);
        if score > best_score {
            best_score = score;
            best = mv;
        }
    }

    best
}
