//! Play command - one engine-vs-engine game from the classic layout
//!
//! ## Architecture
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_engines(), play_game(), report_result()
//! - Level 4: formatting utilities

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use khet_core::{GameState, Move, PendingHit, Player};
use khet_mcts::Engine;
use khet_selfplay::DEFAULT_MAX_MOVES;

use crate::options::EngineOptions;

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    pub engine: EngineOptions,

    /// Network weights for Red only; Red otherwise matches Silver
    #[arg(long, value_name = "FILE")]
    pub red_weights: Option<PathBuf>,

    /// Ply cap; reaching it is a draw
    #[arg(long, default_value_t = DEFAULT_MAX_MOVES)]
    pub max_moves: u32,

    /// Print the board after every move
    #[arg(long)]
    pub boards: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run(args: PlayArgs, seed: Option<u64>) -> Result<()> {
    let (mut silver, mut red) = build_engines(&args, seed)?;

    tracing::info!(
        "Silver: {} mode, {} iterations; Red: {} mode, {} iterations",
        silver.mode(),
        silver.config().mcts.iterations,
        red.mode(),
        red.config().mcts.iterations
    );

    let state = play_game(&mut silver, &mut red, &args)?;
    report_result(&state, args.max_moves);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn build_engines(args: &PlayArgs, seed: Option<u64>) -> Result<(Engine, Engine)> {
    let silver_config = args.engine.engine_config(seed)?;
    let mut red_config = silver_config.clone().with_seed(silver_config.seed.wrapping_add(1));
    if let Some(path) = &args.red_weights {
        red_config = red_config.with_weights_path(path);
    }
    Ok((Engine::new(silver_config), Engine::new(red_config)))
}

fn play_game(silver: &mut Engine, red: &mut Engine, args: &PlayArgs) -> Result<GameState> {
    let mut state = GameState::new_game();

    while !state.is_over() && state.move_count() < args.max_moves {
        let mover = state.current_player();
        let engine = match mover {
            Player::Silver => &mut *silver,
            Player::Red => &mut *red,
        };
        let mv = engine.choose_move(&state)?;
        let hit = state.apply_move(mv)?;
        state.commit_hit();

        println!("{}", format_ply(state.move_count(), mover, mv, hit.as_ref()));
        if args.boards {
            println!("{}", state);
        }
    }

    Ok(state)
}

fn report_result(state: &GameState, max_moves: u32) {
    println!();
    println!("{}", state);
    match state.winner() {
        Some(winner) => println!("{} wins after {} plies", winner, state.move_count()),
        None => println!("Draw: ply cap of {} reached", max_moves),
    }
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

fn format_ply(ply: u32, mover: Player, mv: Move, hit: Option<&PendingHit>) -> String {
    let laser = match hit {
        Some(h) if h.winner.is_some() => format!("laser takes the Pharaoh on {}", h.square),
        Some(h) => format!("laser destroys {:?} on {}", h.piece.kind, h.square),
        None => "no hit".to_string(),
    };
    format!("{:>3}. {:<6} {:<8} {}", ply, mover.to_string(), mv.to_string(), laser)
}
