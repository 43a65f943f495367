//! Search speed benchmark
//!
//! Measures:
//! 1. Move generation + laser throughput
//! 2. Rollouts per second
//! 3. Time per `choose_move` at each difficulty

use std::time::Instant;

use khet_core::{GameState, HeuristicWeights, Player};
use khet_mcts::rollout::rollout;
use khet_mcts::{Difficulty, Engine, EngineConfig, MctsConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// TEST POSITIONS
// ============================================================================

/// Opening position after a few deterministic plies
fn test_position_midgame() -> GameState {
    let mut state = GameState::new_game();
    for i in 0..12 {
        let moves = state.legal_moves();
        if moves.is_empty() {
            break;
        }
        state.play_unchecked(moves[(i * 17 + 5) % moves.len()]);
    }
    state
}

// ============================================================================
// BENCHMARKS
// ============================================================================

fn benchmark_movegen(state: &GameState, name: &str) {
    let rounds = 2000;
    let start = Instant::now();
    let mut total = 0usize;
    for _ in 0..rounds {
        for mv in state.legal_moves() {
            let after = state.with_move(mv);
            total += after.last_trace().len();
        }
    }
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "  {}: {} move+laser applications in {:.2}s ({:.0}/sec, {} beam cells)",
        name,
        rounds * state.legal_moves().len(),
        elapsed,
        (rounds * state.legal_moves().len()) as f64 / elapsed,
        total
    );
}

fn benchmark_rollouts(state: &GameState, name: &str) {
    let weights = HeuristicWeights::default();
    let config = MctsConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let count = 2000;

    let start = Instant::now();
    let mut plies = 0u64;
    for _ in 0..count {
        plies += rollout(state, Player::Silver, &config, &weights, &mut rng).moves_played as u64;
    }
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "  {}: {} rollouts ({} plies) in {:.2}s ({:.0} rollouts/sec)",
        name,
        count,
        plies,
        elapsed,
        count as f64 / elapsed
    );
}

fn benchmark_choose_move(state: &GameState, name: &str) {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let mut engine = Engine::new(EngineConfig::for_difficulty(difficulty));
        let repeats = 3;
        let start = Instant::now();
        for _ in 0..repeats {
            let _ = engine.choose_move(state);
        }
        let avg_ms = start.elapsed().as_secs_f64() * 1000.0 / repeats as f64;
        println!(
            "  {} {:?} ({} iterations): {:.1}ms per move",
            name,
            difficulty,
            difficulty.iterations(),
            avg_ms
        );
    }
}

fn main() {
    let opening = GameState::new_game();
    let midgame = test_position_midgame();

    println!("\n=== MOVE GENERATION + LASER ===");
    benchmark_movegen(&opening, "opening");
    benchmark_movegen(&midgame, "midgame");

    println!("\n=== ROLLOUTS ===");
    benchmark_rollouts(&opening, "opening");
    benchmark_rollouts(&midgame, "midgame");

    println!("\n=== CHOOSE MOVE ===");
    benchmark_choose_move(&opening, "opening");
    benchmark_choose_move(&midgame, "midgame");
}
