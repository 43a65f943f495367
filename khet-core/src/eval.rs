//! Position evaluation

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::board::{Direction, Square};
use crate::game::{GameState, Player};
use crate::pieces::{Piece, PieceKind};

/// Score of a decided game
pub const WIN_SCORE: f32 = 10_000.0;

/// Score for a side to move that has an immediately winning move
pub const THREAT_SCORE: f32 = 5_000.0;

/// Value of a beam line onto the enemy Pharaoh
const PHARAOH_LINE: f32 = WIN_SCORE / 10.0;

/// Centre distance normaliser (half the board's Manhattan radius)
const CENTER_RADIUS: f32 = 4.5;

/// Number of tunable weights
pub const NUM_PARAMS: usize = 10;

/// Heuristic weights for position evaluation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    pub pyramid_value: f32,
    pub scarab_value: f32,
    pub anubis_value: f32,
    /// Per friendly piece next to the Pharaoh
    pub pharaoh_guard: f32,
    /// Per adjacent Anubis facing away from the Pharaoh
    pub anubis_shield: f32,
    /// Per open orthogonal side or board edge around the Pharaoh
    pub pharaoh_exposure: f32,
    pub pharaoh_corner: f32,
    /// Multiplier on the value of an enemy piece in our beam
    pub laser_kill: f32,
    /// Multiplier on the value of our own piece in our beam
    pub laser_self_hit: f32,
    pub center_control: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            pyramid_value: 100.0,
            scarab_value: 150.0,
            anubis_value: 120.0,
            pharaoh_guard: 15.0,
            anubis_shield: 40.0,
            pharaoh_exposure: 20.0,
            pharaoh_corner: 25.0,
            laser_kill: 1.0,
            laser_self_hit: 0.8,
            center_control: 5.0,
        }
    }
}

impl HeuristicWeights {
    /// Field names in parameter order
    pub const PARAM_NAMES: [&'static str; NUM_PARAMS] = [
        "pyramid_value",
        "scarab_value",
        "anubis_value",
        "pharaoh_guard",
        "anubis_shield",
        "pharaoh_exposure",
        "pharaoh_corner",
        "laser_kill",
        "laser_self_hit",
        "center_control",
    ];

    /// Flatten into a parameter vector for tuning
    pub fn params(&self) -> [f32; NUM_PARAMS] {
        [
            self.pyramid_value,
            self.scarab_value,
            self.anubis_value,
            self.pharaoh_guard,
            self.anubis_shield,
            self.pharaoh_exposure,
            self.pharaoh_corner,
            self.laser_kill,
            self.laser_self_hit,
            self.center_control,
        ]
    }

    pub fn from_params(p: [f32; NUM_PARAMS]) -> Self {
        Self {
            pyramid_value: p[0],
            scarab_value: p[1],
            anubis_value: p[2],
            pharaoh_guard: p[3],
            anubis_shield: p[4],
            pharaoh_exposure: p[5],
            pharaoh_corner: p[6],
            laser_kill: p[7],
            laser_self_hit: p[8],
            center_control: p[9],
        }
    }

    /// Material value of a piece kind. Pharaoh and Sphinx carry none.
    pub fn piece_value(&self, kind: PieceKind) -> f32 {
        match kind {
            PieceKind::Pyramid => self.pyramid_value,
            PieceKind::Scarab => self.scarab_value,
            PieceKind::Anubis => self.anubis_value,
            PieceKind::Pharaoh | PieceKind::Sphinx => 0.0,
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read heuristics file: {}", path.display()))?;
        let weights = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse heuristics file: {}", path.display()))?;
        Ok(weights)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write heuristics file: {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Evaluate from the side to move's perspective
pub fn evaluate(state: &GameState, weights: &HeuristicWeights) -> f32 {
    evaluate_for(state, state.current_player(), weights)
}

/// Evaluate from `player`'s perspective
///
/// A side to move holding a winning reply scores [`THREAT_SCORE`] for that
/// side, ahead of the static terms.
pub fn evaluate_for(state: &GameState, player: Player, weights: &HeuristicWeights) -> f32 {
    if let Some(winner) = state.winner() {
        return if winner == player { WIN_SCORE } else { -WIN_SCORE };
    }
    if state.has_immediate_win() {
        return if state.current_player() == player {
            THREAT_SCORE
        } else {
            -THREAT_SCORE
        };
    }

    side_score(state, player, weights) - side_score(state, player.opponent(), weights)
}

/// Fast material-only score from `player`'s perspective
pub fn material_score(state: &GameState, player: Player, weights: &HeuristicWeights) -> f32 {
    if let Some(winner) = state.winner() {
        return if winner == player { WIN_SCORE } else { -WIN_SCORE };
    }

    state
        .pieces()
        .map(|(_, p)| {
            let v = weights.piece_value(p.kind);
            if p.owner == player {
                v
            } else {
                -v
            }
        })
        .sum()
}

fn side_score(state: &GameState, player: Player, weights: &HeuristicWeights) -> f32 {
    let mut score = 0.0;

    for (sq, piece) in state.pieces().filter(|(_, p)| p.owner == player) {
        score += weights.piece_value(piece.kind);
        if piece.kind != PieceKind::Sphinx {
            score +=
                weights.center_control * (CENTER_RADIUS - sq.center_distance()) / CENTER_RADIUS;
        }
    }

    if let Some(pharaoh) = state.pharaoh_square(player) {
        score += pharaoh_safety(state, pharaoh, player, weights);
    }

    score + laser_outlook(state, player, weights)
}

fn pharaoh_safety(
    state: &GameState,
    pharaoh: Square,
    player: Player,
    weights: &HeuristicWeights,
) -> f32 {
    let mut score = 0.0;

    for n in pharaoh.neighbors() {
        let Some(piece) = state.piece_at(n) else {
            continue;
        };
        if piece.owner != player {
            continue;
        }
        score += weights.pharaoh_guard;
        if piece.kind == PieceKind::Anubis && faces_away(&piece, pharaoh, n) {
            score += weights.anubis_shield;
        }
    }

    let open_sides = Direction::ALL
        .iter()
        .map(|&d| pharaoh.step(d))
        .filter(|sq| sq.is_valid() && state.piece_at(*sq).is_none())
        .count();
    score -= weights.pharaoh_exposure * open_sides as f32;

    if pharaoh.is_corner() {
        score += weights.pharaoh_corner;
    } else {
        score -= weights.pharaoh_exposure * pharaoh.edges_touched() as f32;
    }

    score
}

/// Whether an Anubis at `at` shows its front away from `pharaoh`
fn faces_away(anubis: &Piece, pharaoh: Square, at: Square) -> bool {
    let (fc, fr) = anubis.facing.delta();
    let dc = at.col - pharaoh.col;
    let dr = at.row - pharaoh.row;
    dc * fc + dr * fr > 0
}

/// One-ply outcome of `player` firing on the current board
fn laser_outlook(state: &GameState, player: Player, weights: &HeuristicWeights) -> f32 {
    let (_, hit) = state.trace_laser(player);
    let Some(hit) = hit else {
        return 0.0;
    };

    let own = hit.piece.owner == player;
    match (hit.piece.kind, own) {
        (PieceKind::Pharaoh, false) => PHARAOH_LINE,
        (PieceKind::Pharaoh, true) => -PHARAOH_LINE,
        (kind, false) => weights.laser_kill * weights.piece_value(kind),
        (kind, true) => -weights.laser_self_hit * weights.piece_value(kind),
    }
}
