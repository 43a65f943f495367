//! MCTS search loop
//!
//! Implements the core MCTS algorithm as a resumable object:
//! 1. Selection - PUCT or UCB1 down the tree, replaying moves
//! 2. Expansion - one child per legal move, priors from the network or uniform,
//!    with optional Dirichlet noise on the root
//! 3. Evaluation - terminal result, network value or semi-greedy rollout
//! 4. Backpropagation - root-perspective value added along the path
//!
//! The final move is the most visited root child, or a sample from the
//! temperature-scaled visit counts when the config asks for exploration.
//!
//! ## Architecture
//! - Level 2: `Search` (step / run / cancel)
//! - Level 3: One iteration, leaf evaluation
//! - Level 4: Statistics

use std::ops::ControlFlow;
use std::sync::Arc;

use khet_core::{encode, move_index, GameError, GameState, HeuristicWeights, Move, Player};
use khet_nn::KhetNet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;

use crate::rollout::rollout;
use crate::tactics::{plan_root, RootPlan};
use crate::tree::{MctsTree, NodeId, Selection};
use crate::{CancelToken, MctsConfig};

// ============================================================================
// ERRORS AND STATUS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("no legal moves in this position")]
    NoLegalMoves,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Whether a search wants more `step` calls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    Running,
    Finished,
}

// ============================================================================
// LEAF EVALUATION (Level 3)
// ============================================================================

/// Produces priors and a root-perspective value for a leaf
#[derive(Clone, Debug)]
pub struct LeafEvaluator {
    network: Option<Arc<KhetNet>>,
    weights: HeuristicWeights,
    config: MctsConfig,
}

impl LeafEvaluator {
    pub fn new(
        network: Option<Arc<KhetNet>>,
        weights: HeuristicWeights,
        config: MctsConfig,
    ) -> Self {
        Self {
            network,
            weights,
            config,
        }
    }

    pub fn uses_network(&self) -> bool {
        self.network.is_some()
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    pub fn selection(&self) -> Selection {
        if self.uses_network() {
            Selection::Puct {
                c_puct: self.config.c_puct,
                unvisited_priority: self.config.unvisited_priority,
            }
        } else {
            Selection::Ucb1 {
                exploration: self.config.exploration,
            }
        }
    }

    /// Priors over `moves` and the value of `state` for `root_player`, in [0, 1]
    pub fn evaluate(
        &self,
        state: &GameState,
        moves: &[Move],
        root_player: Player,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<f32>, f32) {
        if let Some(winner) = state.winner() {
            let value = if winner == root_player { 1.0 } else { 0.0 };
            return (vec![], value);
        }

        match &self.network {
            Some(net) => {
                let out = net.forward(&encode(state));
                let value = if state.current_player() == root_player {
                    (1.0 + out.value) / 2.0
                } else {
                    (1.0 - out.value) / 2.0
                };
                (network_priors(state, moves, &out.policy), value)
            }
            None => {
                let r = rollout(state, root_player, &self.config, &self.weights, rng);
                (uniform_priors(moves.len()), r.value)
            }
        }
    }
}

fn uniform_priors(n: usize) -> Vec<f32> {
    vec![1.0 / n.max(1) as f32; n]
}

/// Policy mass restricted to `moves` and renormalised
fn network_priors(state: &GameState, moves: &[Move], policy: &[f32]) -> Vec<f32> {
    let raw: Vec<f32> = moves
        .iter()
        .map(|&mv| {
            move_index(state, mv)
                .and_then(|i| policy.get(i).copied())
                .unwrap_or(0.0)
        })
        .collect();
    let total: f32 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.into_iter().map(|p| p / total).collect()
    } else {
        uniform_priors(moves.len())
    }
}

// ============================================================================
// SEARCH (Level 2)
// ============================================================================

/// A search in progress. Drive it with [`Search::step`] or [`Search::run`].
pub struct Search {
    tree: MctsTree,
    root_state: GameState,
    root_player: Player,
    root_moves: Vec<Move>,
    /// Set when the tactical filters settled the move without search
    decided: Option<Move>,
    evaluator: LeafEvaluator,
    rng: ChaCha8Rng,
    target: u32,
    completed: u32,
    cancel: CancelToken,
}

impl Search {
    pub fn new(
        state: &GameState,
        evaluator: LeafEvaluator,
        seed: u64,
    ) -> Result<Self, SearchError> {
        if let Some(winner) = state.winner() {
            return Err(GameError::GameOver(winner).into());
        }

        let (root_moves, decided) = if evaluator.config.tactical_filter {
            match plan_root(state).ok_or(SearchError::NoLegalMoves)? {
                RootPlan::Win(mv) | RootPlan::Forced(mv) => (vec![mv], Some(mv)),
                RootPlan::Search(moves) => (moves, None),
            }
        } else {
            let moves = state.legal_moves();
            if moves.is_empty() {
                return Err(SearchError::NoLegalMoves);
            }
            (moves, None)
        };

        Ok(Self {
            tree: MctsTree::new(),
            root_state: state.clone(),
            root_player: state.current_player(),
            root_moves,
            decided,
            target: evaluator.config.iterations,
            evaluator,
            rng: ChaCha8Rng::seed_from_u64(seed),
            completed: 0,
            cancel: CancelToken::new(),
        })
    }

    /// Run up to `budget` iterations
    pub fn step(&mut self, budget: u32) -> SearchStatus {
        for _ in 0..budget {
            if self.is_finished() {
                break;
            }
            self.iterate();
        }
        if self.is_finished() {
            SearchStatus::Finished
        } else {
            SearchStatus::Running
        }
    }

    /// Step in chunks of `yield_every`, calling `on_yield` between chunks.
    /// Returning `ControlFlow::Break` cancels the search.
    pub fn run<F>(&mut self, yield_every: u32, mut on_yield: F) -> Option<Move>
    where
        F: FnMut(&Search) -> ControlFlow<()>,
    {
        while self.step(yield_every.max(1)) == SearchStatus::Running {
            if on_yield(self).is_break() {
                self.cancel();
                break;
            }
        }
        self.best_move()
    }

    pub fn is_finished(&self) -> bool {
        self.decided.is_some() || self.cancel.is_cancelled() || self.completed >= self.target
    }

    /// Stop after the current iteration; the tree stays usable
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token another thread can use to cancel this search
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Most visited root move so far, or the first candidate before any
    /// iteration has run
    pub fn best_move(&self) -> Option<Move> {
        self.decided
            .or_else(|| self.tree.best_move())
            .or_else(|| self.root_moves.first().copied())
    }

    /// The move to play: the most visited root move, or a sample from the
    /// visit counts when the configured temperature for this ply is above
    /// zero
    pub fn select_move(&mut self) -> Option<Move> {
        if self.decided.is_some() {
            return self.decided;
        }
        let temperature = self
            .evaluator
            .config
            .temperature_at(self.root_state.move_count());
        if temperature < 1e-6 {
            return self.best_move();
        }
        let policy = self.tree.root_policy(temperature);
        sample_move(&policy, &mut self.rng).or_else(|| self.best_move())
    }

    pub fn iterations(&self) -> u32 {
        self.completed
    }

    pub fn tree(&self) -> &MctsTree {
        &self.tree
    }

    pub fn root_state(&self) -> &GameState {
        &self.root_state
    }

    // ========================================================================
    // Level 3: One Iteration
    // ========================================================================

    fn iterate(&mut self) {
        let selection = self.evaluator.selection();
        let mut state = self.root_state.clone();
        let mut path = vec![NodeId::ROOT];
        let mut node = NodeId::ROOT;

        // Phase 1: Selection
        while self.tree.get(node).is_expanded() && !state.is_over() {
            let Some(child) = self.tree.select_child(node, selection) else {
                break;
            };
            if let Some(mv) = self.tree.get(child).incoming_move {
                state.play_unchecked(mv);
            }
            path.push(child);
            node = child;
        }

        // Phase 2 + 3: Expansion and evaluation
        let value = if state.is_over() {
            self.evaluator.evaluate(&state, &[], self.root_player, &mut self.rng).1
        } else {
            let moves = if node == NodeId::ROOT {
                self.root_moves.clone()
            } else {
                state.legal_moves()
            };
            let (priors, value) = self
                .evaluator
                .evaluate(&state, &moves, self.root_player, &mut self.rng);
            let children: Vec<(Move, f32)> = moves.into_iter().zip(priors).collect();
            self.tree.expand(node, &children);
            if node == NodeId::ROOT && self.completed == 0 {
                self.add_root_noise();
            }
            value
        };

        // Phase 4: Backpropagation
        self.tree.backpropagate(&path, value);
        self.completed += 1;
    }

    /// Mix Dirichlet noise into the freshly expanded root's priors
    fn add_root_noise(&mut self) {
        let Some(noise) = self.evaluator.config.root_noise else {
            return;
        };
        let children = self.tree.get(NodeId::ROOT).children.clone();
        let samples = dirichlet_noise(children.len(), noise.alpha, &mut self.rng);
        for (id, eta) in children.into_iter().zip(samples) {
            let child = self.tree.get_mut(id);
            child.prior = (1.0 - noise.weight) * child.prior + noise.weight * eta;
        }
    }

    // ========================================================================
    // Level 4: Statistics
    // ========================================================================

    pub fn stats(&self) -> SearchStats {
        let mut moves: Vec<MoveStats> = self
            .tree
            .root_statistics()
            .into_iter()
            .map(|(mv, visits, mean_value, prior)| MoveStats {
                mv,
                visits,
                mean_value,
                prior,
            })
            .collect();
        moves.sort_by(|a, b| b.visits.cmp(&a.visits));

        SearchStats {
            iterations: self.completed,
            nodes: self.tree.len(),
            best: self.best_move(),
            tactical: self.decided.is_some(),
            moves,
        }
    }
}

/// Dirichlet sample of size `n` from normalised Gamma variates. Empty when
/// `alpha` is not a valid concentration.
fn dirichlet_noise<R: Rng>(n: usize, alpha: f32, rng: &mut R) -> Vec<f32> {
    let gamma = match Gamma::new(alpha as f64, 1.0) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!("Skipping root noise, alpha {}: {}", alpha, e);
            return vec![];
        }
    };
    let samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();
    let total: f32 = samples.iter().sum();
    if total > 0.0 {
        samples.into_iter().map(|s| s / total).collect()
    } else {
        vec![]
    }
}

/// Draw a move from `(move, probability)` pairs
fn sample_move<R: Rng>(policy: &[(Move, f32)], rng: &mut R) -> Option<Move> {
    let r: f32 = rng.gen();
    let mut cumulative = 0.0;
    for &(mv, p) in policy {
        cumulative += p;
        if r < cumulative {
            return Some(mv);
        }
    }
    // Rounding left `r` past the last bucket
    policy.iter().rev().find(|&&(_, p)| p > 0.0).map(|&(mv, _)| mv)
}

/// Per-root-move summary
#[derive(Clone, Debug, PartialEq)]
pub struct MoveStats {
    pub mv: Move,
    pub visits: u32,
    pub mean_value: f32,
    pub prior: f32,
}

/// Summary of a finished (or interrupted) search
#[derive(Clone, Debug, PartialEq)]
pub struct SearchStats {
    pub iterations: u32,
    pub nodes: usize,
    pub best: Option<Move>,
    /// Move came from the tactical filters
    pub tactical: bool,
    /// Root moves, most visited first
    pub moves: Vec<MoveStats>,
}

impl std::fmt::Display for SearchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.tactical {
            return match self.best {
                Some(mv) => write!(f, "{} (tactical)", mv),
                None => write!(f, "no move"),
            };
        }
        write!(f, "{} iterations, {} nodes", self.iterations, self.nodes)?;
        for m in self.moves.iter().take(3) {
            write!(f, "; {} n={} q={:.3} p={:.3}", m.mv, m.visits, m.mean_value, m.prior)?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RootNoise;
    use khet_core::{Direction, Piece, PieceKind, Square};
    use khet_nn::{required_layers, Architecture, Manifest};

    fn sq(col: i8, row: i8) -> Square {
        Square::new(col, row)
    }

    fn piece(kind: PieceKind, owner: Player, facing: Direction) -> Piece {
        Piece::new(kind, owner, facing)
    }

    fn config(iterations: u32) -> MctsConfig {
        MctsConfig::default()
            .with_iterations(iterations)
            .with_rollout_depth(6)
    }

    fn evaluator(iterations: u32) -> LeafEvaluator {
        LeafEvaluator::new(None, HeuristicWeights::default(), config(iterations))
    }

    /// Network whose only non-zero parameter is the value head's output bias
    fn value_bias_network(bias: f32) -> KhetNet {
        let arch = Architecture {
            hidden_channels: 2,
            num_res_blocks: 1,
        };
        let mut manifest = Manifest::new(arch);
        for (name, shape) in required_layers(&arch) {
            let len: usize = shape.iter().product();
            let fill = match name.as_str() {
                "value_fc2.bias" => bias,
                n if n.ends_with("running_var") => 1.0,
                _ => 0.0,
            };
            manifest.insert(name, &shape, &vec![fill; len]);
        }
        KhetNet::from_manifest(&manifest).unwrap()
    }

    #[test]
    fn test_root_visits_match_iterations() {
        let mut search = Search::new(&GameState::new_game(), evaluator(40), 1).unwrap();
        assert_eq!(search.step(15), SearchStatus::Running);
        assert_eq!(search.iterations(), 15);
        assert_eq!(search.tree().total_simulations(), 15);
        assert_eq!(search.step(100), SearchStatus::Finished);
        assert_eq!(search.iterations(), 40);
        assert_eq!(search.tree().total_simulations(), 40);
    }

    #[test]
    fn test_visits_never_decrease() {
        let mut search = Search::new(&GameState::new_game(), evaluator(60), 2).unwrap();
        let mut previous: Vec<u32> = vec![];
        while search.step(10) == SearchStatus::Running {
            let visits: Vec<u32> = search.tree().root_statistics().iter().map(|s| s.1).collect();
            for (old, new) in previous.iter().zip(&visits) {
                assert!(new >= old);
            }
            previous = visits;
        }
    }

    #[test]
    fn test_best_move_is_legal() {
        let game = GameState::new_game();
        let mut search = Search::new(&game, evaluator(30), 3).unwrap();
        let mv = search.run(7, |_| ControlFlow::Continue(())).unwrap();
        assert!(game.is_legal(mv));
    }

    #[test]
    fn test_run_break_cancels() {
        let mut search = Search::new(&GameState::new_game(), evaluator(1000), 4).unwrap();
        let mut yields = 0;
        let mv = search.run(5, |_| {
            yields += 1;
            if yields == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(mv.is_some());
        assert_eq!(search.iterations(), 10);
        assert!(search.is_finished());
        assert_eq!(search.step(5), SearchStatus::Finished);
    }

    #[test]
    fn test_cancel_token_from_outside() {
        let mut search = Search::new(&GameState::new_game(), evaluator(100), 5).unwrap();
        let token = search.cancel_token();
        search.step(3);
        token.cancel();
        assert_eq!(search.step(50), SearchStatus::Finished);
        assert_eq!(search.iterations(), 3);
    }

    #[test]
    fn test_winning_move_needs_no_search() {
        let game = GameState::empty(Player::Silver)
            .with_piece(sq(9, 0), piece(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(0, 7), piece(PieceKind::Sphinx, Player::Red, Direction::South))
            .with_piece(sq(4, 4), piece(PieceKind::Pharaoh, Player::Silver, Direction::North))
            .with_piece(sq(9, 5), piece(PieceKind::Pharaoh, Player::Red, Direction::South));
        let mut search = Search::new(&game, evaluator(100), 6).unwrap();
        assert_eq!(search.step(1), SearchStatus::Finished);
        assert_eq!(search.iterations(), 0);
        assert!(search.stats().tactical);
    }

    #[test]
    fn test_finished_game_is_an_error() {
        let mut game = GameState::empty(Player::Silver)
            .with_piece(sq(9, 0), piece(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(4, 4), piece(PieceKind::Pharaoh, Player::Silver, Direction::North))
            .with_piece(sq(9, 5), piece(PieceKind::Pharaoh, Player::Red, Direction::South));
        let mv = game.immediate_win().unwrap();
        game.play_unchecked(mv);
        assert_eq!(
            Search::new(&game, evaluator(10), 0).err(),
            Some(SearchError::Game(GameError::GameOver(Player::Silver)))
        );
    }

    #[test]
    fn test_network_priors_renormalise() {
        let game = GameState::new_game();
        let moves = game.legal_moves();
        let mut policy = vec![0.0; khet_core::POLICY_LEN];
        let first = move_index(&game, moves[0]).unwrap();
        policy[first] = 0.2;
        let priors = network_priors(&game, &moves, &policy);
        assert!((priors[0] - 1.0).abs() < 1e-6);

        let zero = network_priors(&game, &moves, &vec![0.0; khet_core::POLICY_LEN]);
        assert!((zero[1] - 1.0 / moves.len() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_stats_sorted_by_visits() {
        let mut search = Search::new(&GameState::new_game(), evaluator(50), 8).unwrap();
        search.step(50);
        let stats = search.stats();
        assert_eq!(stats.iterations, 50);
        assert!(stats.moves.windows(2).all(|w| w[0].visits >= w[1].visits));
        assert_eq!(stats.best, Some(stats.moves[0].mv));
    }

    #[test]
    fn test_network_value_follows_root_player() {
        let evaluator = LeafEvaluator::new(
            Some(Arc::new(value_bias_network(0.5))),
            HeuristicWeights::default(),
            config(1),
        );
        let game = GameState::new_game();
        let moves = game.legal_moves();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let v = 0.5f32.tanh();

        // Silver is to move: the net speaks for Silver
        let (priors, own) = evaluator.evaluate(&game, &moves, Player::Silver, &mut rng);
        assert!((own - (1.0 + v) / 2.0).abs() < 1e-6);
        assert_eq!(priors.len(), moves.len());

        let (_, other) = evaluator.evaluate(&game, &moves, Player::Red, &mut rng);
        assert!((other - (1.0 - v) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_root_noise_perturbs_priors() {
        let game = GameState::new_game();
        let mut plain = Search::new(&game, evaluator(1), 9).unwrap();
        plain.step(1);
        let uniform: Vec<f32> = plain.stats().moves.iter().map(|m| m.prior).collect();
        assert!(uniform.windows(2).all(|w| w[0] == w[1]));

        let noisy_config = config(1).with_root_noise(RootNoise::default());
        let noisy = LeafEvaluator::new(None, HeuristicWeights::default(), noisy_config);
        let mut search = Search::new(&game, noisy, 9).unwrap();
        search.step(1);
        let priors: Vec<f32> = search.stats().moves.iter().map(|m| m.prior).collect();
        assert_eq!(priors.len(), uniform.len());
        let total: f32 = priors.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(priors.iter().all(|&p| p > 0.0));
        // Noise keeps at least (1 - weight) of the uniform prior
        let floor = 0.75 * uniform[0];
        assert!(priors.iter().all(|&p| p >= floor - 1e-6));
        assert!(priors.windows(2).any(|w| (w[0] - w[1]).abs() > 1e-4));
    }

    #[test]
    fn test_invalid_noise_alpha_is_skipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(dirichlet_noise(5, 0.0, &mut rng).is_empty());
        let noise = dirichlet_noise(5, 0.3, &mut rng);
        assert_eq!(noise.len(), 5);
        assert!((noise.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_temperature_plays_most_visited() {
        let mut search = Search::new(&GameState::new_game(), evaluator(80), 10).unwrap();
        search.step(80);
        for _ in 0..5 {
            assert_eq!(search.select_move(), search.best_move());
        }
    }

    #[test]
    fn test_temperature_samples_visited_moves() {
        let game = GameState::new_game();
        let hot = LeafEvaluator::new(
            None,
            HeuristicWeights::default(),
            config(150).with_temperature(1.0, 20, 0.1),
        );
        let mut search = Search::new(&game, hot, 11).unwrap();
        search.step(150);

        let visits: Vec<(Move, u32)> = search
            .tree()
            .root_statistics()
            .into_iter()
            .map(|(mv, n, _, _)| (mv, n))
            .collect();
        let mut picked = std::collections::HashSet::new();
        for _ in 0..40 {
            let mv = search.select_move().unwrap();
            assert!(game.is_legal(mv));
            assert!(visits.iter().any(|&(m, n)| m == mv && n > 0));
            picked.insert(mv);
        }
        assert!(picked.len() > 1, "temperature 1.0 kept picking one move");
    }

    #[test]
    fn test_late_temperature_applies_after_opening() {
        let mut game = GameState::new_game();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        while game.move_count() < 2 {
            let moves = game.legal_moves();
            game.play_unchecked(moves[rng.gen_range(0..moves.len())]);
        }
        // Past the opening plies with a zero late temperature: greedy again
        let cold_late = LeafEvaluator::new(
            None,
            HeuristicWeights::default(),
            config(60).with_temperature(1.0, 2, 0.0),
        );
        if let Ok(mut search) = Search::new(&game, cold_late, 12) {
            search.step(60);
            for _ in 0..5 {
                assert_eq!(search.select_move(), search.best_move());
            }
        }
    }
}
