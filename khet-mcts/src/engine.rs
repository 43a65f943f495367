//! Engine facade: configuration, optional network and move choice

use std::path::Path;
use std::sync::Arc;

use khet_core::{GameState, Move, Player};
use khet_nn::KhetNet;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::search::{LeafEvaluator, Search, SearchError, SearchStats};
use crate::EngineConfig;

/// How leaves are evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMode {
    /// Value/policy network with PUCT
    Network,
    /// Rollouts scored by the heuristic, UCB1
    Heuristic,
}

impl std::fmt::Display for EvalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalMode::Network => write!(f, "network"),
            EvalMode::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Single-threaded move chooser
pub struct Engine {
    config: EngineConfig,
    network: Option<Arc<KhetNet>>,
    rng: ChaCha8Rng,
    last_stats: Option<SearchStats>,
}

impl Engine {
    /// Create an engine. A configured weights file is loaded fail-soft.
    pub fn new(config: EngineConfig) -> Self {
        let weights_path = config.weights_path.clone();
        let engine = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            network: None,
            last_stats: None,
        };
        match weights_path {
            Some(path) => engine.with_weights_file(&path),
            None => engine,
        }
    }

    /// Share an already loaded network
    pub fn with_network(mut self, network: Arc<KhetNet>) -> Self {
        self.network = Some(network);
        self
    }

    /// Load a weights manifest; on failure log a warning and stay in
    /// heuristic mode.
    pub fn with_weights_file(mut self, path: &Path) -> Self {
        match KhetNet::load(path) {
            Ok(net) => self.network = Some(Arc::new(net)),
            Err(e) => {
                tracing::warn!(
                    "Could not load network weights from {}: {}; using heuristic evaluation",
                    path.display(),
                    e
                );
                self.network = None;
            }
        }
        self
    }

    pub fn mode(&self) -> EvalMode {
        if self.network.is_some() {
            EvalMode::Network
        } else {
            EvalMode::Heuristic
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn network(&self) -> Option<&Arc<KhetNet>> {
        self.network.as_ref()
    }

    /// Statistics of the last `choose_move`
    pub fn last_stats(&self) -> Option<&SearchStats> {
        self.last_stats.as_ref()
    }

    fn evaluator(&self) -> LeafEvaluator {
        LeafEvaluator::new(
            self.network.clone(),
            self.config.heuristics,
            self.config.mcts.clone(),
        )
    }

    /// Begin a resumable search from `state`
    pub fn start_search(&mut self, state: &GameState) -> Result<Search, SearchError> {
        let seed = self.rng.gen();
        Search::new(state, self.evaluator(), seed)
    }

    /// Search to completion and return the chosen move. Without a move
    /// temperature this is the most visited root move.
    pub fn choose_move(&mut self, state: &GameState) -> Result<Move, SearchError> {
        let mut search = self.start_search(state)?;
        search.step(u32::MAX);

        let stats = search.stats();
        tracing::debug!("{} search: {}", self.mode(), stats);
        self.last_stats = Some(stats);

        search.select_move().ok_or(SearchError::NoLegalMoves)
    }

    /// Value of `state` for `root_player` in [0, 1], as the search would
    /// see it at a leaf
    pub fn evaluate_leaf(&mut self, state: &GameState, root_player: Player) -> f32 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
        self.evaluator().evaluate(state, &[], root_player, &mut rng).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Difficulty, MctsConfig};
    use khet_core::{Direction, GameError, Piece, PieceKind, Square};

    fn sq(col: i8, row: i8) -> Square {
        Square::new(col, row)
    }

    fn piece(kind: PieceKind, owner: Player, facing: Direction) -> Piece {
        Piece::new(kind, owner, facing)
    }

    fn quick_engine(seed: u64) -> Engine {
        let config = EngineConfig::for_difficulty(Difficulty::Easy)
            .with_iterations(24)
            .with_seed(seed);
        Engine::new(config)
    }

    #[test]
    fn test_missing_weights_fall_back() {
        let config = EngineConfig::default().with_weights_path("/nonexistent/net.json");
        let engine = Engine::new(config);
        assert_eq!(engine.mode(), EvalMode::Heuristic);
    }

    #[test]
    fn test_choose_move_is_legal_without_weights() {
        let mut engine = quick_engine(7);
        let mut game = GameState::new_game();
        for _ in 0..4 {
            let mv = engine.choose_move(&game).unwrap();
            assert!(game.is_legal(mv), "{} is not legal", mv);
            game.apply_move(mv).unwrap();
            game.commit_hit();
            if game.is_over() {
                break;
            }
        }
        assert!(engine.last_stats().is_some());
    }

    #[test]
    fn test_same_seed_same_move() {
        let game = GameState::new_game();
        let a = quick_engine(11).choose_move(&game).unwrap();
        let b = quick_engine(11).choose_move(&game).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pharaoh_in_line_is_taken() {
        // Rotating the sphinx west fires along rank 1 onto the red pharaoh
        let game = GameState::empty(Player::Silver)
            .with_piece(sq(9, 0), piece(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(0, 7), piece(PieceKind::Sphinx, Player::Red, Direction::South))
            .with_piece(sq(4, 5), piece(PieceKind::Pharaoh, Player::Silver, Direction::North))
            .with_piece(sq(3, 0), piece(PieceKind::Pharaoh, Player::Red, Direction::North));
        let mut engine = quick_engine(1);
        let mv = engine.choose_move(&game).unwrap();
        assert_eq!(mv, Move::Rotate { at: sq(9, 0), facing: Direction::West });

        let mut after = game.clone();
        let hit = after.apply_move(mv).unwrap().unwrap();
        assert_eq!(hit.square, sq(3, 0));
        after.commit_hit();
        assert_eq!(after.winner(), Some(Player::Silver));
    }

    #[test]
    fn test_evaluate_leaf_bounds() {
        let mut engine = Engine::new(
            EngineConfig::default().with_mcts(MctsConfig::default().with_rollout_depth(4)),
        );
        let v = engine.evaluate_leaf(&GameState::new_game(), Player::Silver);
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn test_evaluate_leaf_sees_winning_reply() {
        // Red to move: turning its sphinx east fires along rank 8 onto the silver pharaoh
        let game = GameState::empty(Player::Red)
            .with_piece(sq(9, 0), piece(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(0, 7), piece(PieceKind::Sphinx, Player::Red, Direction::South))
            .with_piece(sq(6, 7), piece(PieceKind::Pharaoh, Player::Silver, Direction::South))
            .with_piece(sq(4, 2), piece(PieceKind::Pharaoh, Player::Red, Direction::North));
        assert!(game.has_immediate_win());

        let mut engine = Engine::new(
            EngineConfig::default().with_mcts(MctsConfig::default().with_rollout_depth(0)),
        );
        let silver = engine.evaluate_leaf(&game, Player::Silver);
        let red = engine.evaluate_leaf(&game, Player::Red);
        assert!(silver < 0.1, "threatened side scored {}", silver);
        assert!(red > 0.9, "threatening side scored {}", red);
    }

    #[test]
    fn test_exploring_engine_varies_opening() {
        let config = EngineConfig::for_difficulty(Difficulty::Easy)
            .with_mcts(MctsConfig::for_difficulty(Difficulty::Easy).with_exploration())
            .with_iterations(40)
            .with_seed(5);
        let mut engine = Engine::new(config);
        let game = GameState::new_game();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..6 {
            let mv = engine.choose_move(&game).unwrap();
            assert!(game.is_legal(mv));
            seen.insert(mv);
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_finished_game_is_rejected() {
        let mut game = GameState::empty(Player::Silver)
            .with_piece(sq(9, 0), piece(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(4, 4), piece(PieceKind::Pharaoh, Player::Silver, Direction::North))
            .with_piece(sq(9, 5), piece(PieceKind::Pharaoh, Player::Red, Direction::South));
        let mv = game.immediate_win().unwrap();
        game.play_unchecked(mv);
        let mut engine = quick_engine(0);
        assert_eq!(
            engine.choose_move(&game),
            Err(SearchError::Game(GameError::GameOver(Player::Silver)))
        );
    }
}
