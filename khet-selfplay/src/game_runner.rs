//! Game runner - plays single engine-vs-engine games
//!
//! Level 3 - Step-level implementation

use khet_core::{GameState, Move, Player};
use khet_mcts::{CancelToken, Engine, EngineConfig, SearchError};

/// Default ply cap; reaching it is a draw
pub const DEFAULT_MAX_MOVES: u32 = 200;

/// Everything that happened in one game
#[derive(Clone, Debug)]
pub struct GameRecord {
    /// Winner, `None` for a draw or an abandoned game
    pub winner: Option<Player>,
    /// Move history
    pub moves: Vec<Move>,
    /// Plies played
    pub move_count: u32,
    pub final_state: GameState,
    /// State before each move, in order
    pub states: Vec<GameState>,
    /// Stopped by a cancellation before the game ended
    pub cancelled: bool,
}

impl GameRecord {
    pub fn is_draw(&self) -> bool {
        self.winner.is_none() && !self.cancelled
    }

    /// Game result from `player`'s side: +1 win, -1 loss, 0 draw
    pub fn outcome_for(&self, player: Player) -> f32 {
        match self.winner {
            Some(w) if w == player => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }

    /// Recorded states paired with the result for the side to move there
    pub fn training_targets(&self) -> impl Iterator<Item = (&GameState, f32)> + '_ {
        self.states
            .iter()
            .map(|s| (s, self.outcome_for(s.current_player())))
    }
}

/// Plays games to completion or the ply cap
pub struct GameRunner {
    max_moves: u32,
    /// Random seed counter
    seed_counter: u64,
}

impl GameRunner {
    pub fn new(max_moves: u32, seed: u64) -> Self {
        Self {
            max_moves,
            seed_counter: seed,
        }
    }

    pub fn max_moves(&self) -> u32 {
        self.max_moves
    }

    /// Build fresh engines from the two configs and play the classic opening
    pub fn play_game(
        &mut self,
        silver: &EngineConfig,
        red: &EngineConfig,
    ) -> Result<GameRecord, SearchError> {
        let mut silver = Engine::new(silver.clone().with_seed(self.next_seed()));
        let mut red = Engine::new(red.clone().with_seed(self.next_seed()));
        self.play(&mut silver, &mut red, GameState::new_game(), &CancelToken::new())
    }

    /// Play from `initial` with caller-owned engines. The token is checked
    /// before every move; a cancelled game comes back with `cancelled` set.
    pub fn play(
        &self,
        silver: &mut Engine,
        red: &mut Engine,
        initial: GameState,
        cancel: &CancelToken,
    ) -> Result<GameRecord, SearchError> {
        let mut state = initial;
        let mut moves = Vec::new();
        let mut states = Vec::new();
        let mut cancelled = false;

        while !state.is_over() && (moves.len() as u32) < self.max_moves {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let engine = match state.current_player() {
                Player::Silver => &mut *silver,
                Player::Red => &mut *red,
            };
            let mv = engine.choose_move(&state)?;

            states.push(state.clone());
            state.apply_move(mv)?;
            state.commit_hit();
            moves.push(mv);
        }

        Ok(GameRecord {
            winner: state.winner(),
            move_count: moves.len() as u32,
            moves,
            final_state: state,
            states,
            cancelled,
        })
    }

    fn next_seed(&mut self) -> u64 {
        let seed = self.seed_counter;
        self.seed_counter = self.seed_counter.wrapping_add(1);
        seed
    }

    /// Reset seed counter
    pub fn reset_seed(&mut self, seed: u64) {
        self.seed_counter = seed;
    }
}

impl Default for GameRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MOVES, 42)
    }
}
