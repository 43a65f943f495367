//! Arena - many independent games between two engine configs
//!
//! Level 2 - Phase-level implementation

use std::sync::Arc;

use khet_core::{GameState, Player};
use khet_mcts::{CancelToken, Engine, EngineConfig, SearchError};
use khet_nn::KhetNet;
use rayon::prelude::*;

use crate::game_runner::{GameRecord, GameRunner};

/// Result of a match between config A and config B
#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    pub a_wins: u32,
    pub b_wins: u32,
    /// Games that hit the ply cap
    pub draws: u32,
    /// Average game length in plies
    pub avg_length: f32,
    pub games_played: u32,
}

impl MatchResult {
    /// Create empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Win rate for config A
    pub fn a_win_rate(&self) -> f32 {
        if self.games_played == 0 {
            0.0
        } else {
            self.a_wins as f32 / self.games_played as f32
        }
    }

    /// Win rate for config B
    pub fn b_win_rate(&self) -> f32 {
        if self.games_played == 0 {
            0.0
        } else {
            self.b_wins as f32 / self.games_played as f32
        }
    }

    /// Wins = 1.0, Draws = 0.5
    pub fn score_for_a(&self) -> f32 {
        self.a_wins as f32 + 0.5 * self.draws as f32
    }

    pub fn score_for_b(&self) -> f32 {
        self.b_wins as f32 + 0.5 * self.draws as f32
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "A {} - B {} - draws {} ({} games, avg {:.1} plies)",
            self.a_wins, self.b_wins, self.draws, self.games_played, self.avg_length
        )
    }
}

/// Play `games` games in parallel, A taking Silver in even-numbered games.
///
/// Each game owns its engines; a network named by either config is loaded
/// once and shared read-only across games.
pub fn play_match(
    config_a: &EngineConfig,
    config_b: &EngineConfig,
    games: usize,
    max_moves: u32,
    seed: u64,
) -> Result<MatchResult, SearchError> {
    if games == 0 {
        return Ok(MatchResult::empty());
    }

    let side_a = Side::prepare(config_a);
    let side_b = Side::prepare(config_b);

    let results: Vec<(bool, GameRecord)> = (0..games)
        .into_par_iter()
        .map(|index| {
            let a_is_silver = index % 2 == 0;
            let game_seed = seed.wrapping_add(index as u64 * 2);
            let mut a = side_a.engine(game_seed);
            let mut b = side_b.engine(game_seed.wrapping_add(1));
            let runner = GameRunner::new(max_moves, game_seed);
            let record = if a_is_silver {
                runner.play(&mut a, &mut b, GameState::new_game(), &CancelToken::new())
            } else {
                runner.play(&mut b, &mut a, GameState::new_game(), &CancelToken::new())
            }?;
            Ok((a_is_silver, record))
        })
        .collect::<Result<_, SearchError>>()?;

    Ok(aggregate_results(&results))
}

// ============================================================================
// Level 3 - Steps
// ============================================================================

/// Engine config with its network resolved up front
struct Side {
    config: EngineConfig,
    network: Option<Arc<KhetNet>>,
}

impl Side {
    fn prepare(config: &EngineConfig) -> Self {
        let network = config.weights_path.as_ref().and_then(|path| {
            match KhetNet::load(path) {
                Ok(net) => Some(Arc::new(net)),
                Err(e) => {
                    tracing::warn!(
                        "Could not load network weights from {}: {}; using heuristic evaluation",
                        path.display(),
                        e
                    );
                    None
                }
            }
        });
        let config = EngineConfig {
            weights_path: None,
            ..config.clone()
        };
        Self { config, network }
    }

    fn engine(&self, seed: u64) -> Engine {
        let engine = Engine::new(self.config.clone().with_seed(seed));
        match &self.network {
            Some(net) => engine.with_network(Arc::clone(net)),
            None => engine,
        }
    }
}

fn aggregate_results(results: &[(bool, GameRecord)]) -> MatchResult {
    let mut out = MatchResult::empty();
    let mut total_length = 0u64;

    for (a_is_silver, record) in results {
        let a_player = if *a_is_silver { Player::Silver } else { Player::Red };
        match record.winner {
            Some(w) if w == a_player => out.a_wins += 1,
            Some(_) => out.b_wins += 1,
            None => out.draws += 1,
        }
        total_length += record.move_count as u64;
        out.games_played += 1;
    }

    if out.games_played > 0 {
        out.avg_length = total_length as f32 / out.games_played as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use khet_mcts::MctsConfig;

    fn fast_config() -> EngineConfig {
        EngineConfig::default().with_mcts(
            MctsConfig::default()
                .with_iterations(6)
                .with_rollout_depth(3),
        )
    }

    #[test]
    fn test_empty_match() {
        let result = play_match(&fast_config(), &fast_config(), 0, 10, 1).unwrap();
        assert_eq!(result.games_played, 0);
        assert_eq!(result.a_win_rate(), 0.0);
    }

    #[test]
    fn test_match_totals() {
        let result = play_match(&fast_config(), &fast_config(), 4, 6, 7).unwrap();
        assert_eq!(result.games_played, 4);
        assert_eq!(result.a_wins + result.b_wins + result.draws, 4);
        assert!(result.avg_length <= 6.0);
    }

    #[test]
    fn test_match_deterministic() {
        let a = play_match(&fast_config(), &fast_config(), 2, 6, 3).unwrap();
        let b = play_match(&fast_config(), &fast_config(), 2, 6, 3).unwrap();
        assert_eq!((a.a_wins, a.b_wins, a.draws), (b.a_wins, b.b_wins, b.draws));
        assert_eq!(a.avg_length, b.avg_length);
    }

    #[test]
    fn test_missing_network_falls_back() {
        let networked = fast_config().with_weights_path("/nonexistent/weights.json");
        let result = play_match(&networked, &fast_config(), 2, 4, 0).unwrap();
        assert_eq!(result.games_played, 2);
    }

    #[test]
    fn test_aggregate_alternating_colours() {
        let win = |p| GameRecord {
            winner: Some(p),
            moves: Vec::new(),
            move_count: 10,
            final_state: GameState::new_game(),
            states: Vec::new(),
            cancelled: false,
        };
        let draw = GameRecord {
            winner: None,
            move_count: 20,
            ..win(Player::Silver)
        };
        let results = vec![
            (true, win(Player::Silver)),
            (false, win(Player::Silver)),
            (false, win(Player::Red)),
            (true, draw),
        ];
        let out = aggregate_results(&results);
        assert_eq!(out.a_wins, 2);
        assert_eq!(out.b_wins, 1);
        assert_eq!(out.draws, 1);
        assert_eq!(out.avg_length, 12.5);
        assert_eq!(out.score_for_a(), 2.5);
    }
}
