//! Board encoding for the network and the move-index mapping
//!
//! ## Input layout
//!
//! 16 planes of 8 rows by 10 columns, row-major within each plane:
//!
//! | planes | content |
//! |--------|---------|
//! | 0-4    | mover's Pharaoh, Sphinx, Pyramid, Scarab, Anubis |
//! | 5-9    | opponent's pieces, same order |
//! | 10-13  | facing N, E, S, W (either owner) |
//! | 14     | all ones when Silver is to move |
//! | 15     | `min(move_count / 300, 1)` |
//!
//! ## Policy layout
//!
//! `(row * 10 + col) * 12 + slot`. Slots 0-7 are step directions in
//! [`NEIGHBOR_OFFSETS`] order, 8/9 rotate counter-clockwise/clockwise, and a
//! Sphinx rotation uses `8 + target facing`.

use crate::board::{Direction, Square, NEIGHBOR_OFFSETS, NUM_SQUARES};
use crate::game::{GameState, Move, Player};
use crate::pieces::{Piece, PieceKind};

pub const NUM_PLANES: usize = 16;

/// Length of an encoded board
pub const INPUT_LEN: usize = NUM_PLANES * NUM_SQUARES;

/// Move slots per square
pub const POLICY_SLOTS: usize = 12;

/// Length of the policy vector
pub const POLICY_LEN: usize = NUM_SQUARES * POLICY_SLOTS;

const FACING_PLANE: usize = 10;
const SILVER_PLANE: usize = 14;
const PLY_PLANE: usize = 15;

/// Move count at which the ply plane saturates
const PLY_HORIZON: f32 = 300.0;

const ROTATE_CCW: usize = 8;
const ROTATE_CW: usize = 9;

// ============================================================================
// BOARD ENCODING
// ============================================================================

/// Encode a position from the side to move's point of view
pub fn encode(state: &GameState) -> Vec<f32> {
    let mut planes = vec![0.0f32; INPUT_LEN];
    let mover = state.current_player();

    for (sq, piece) in state.pieces() {
        let side = if piece.owner == mover { 0 } else { 5 };
        planes[(side + piece.kind.index()) * NUM_SQUARES + sq.index()] = 1.0;
        planes[(FACING_PLANE + piece.facing.index()) * NUM_SQUARES + sq.index()] = 1.0;
    }

    if mover == Player::Silver {
        planes[SILVER_PLANE * NUM_SQUARES..(SILVER_PLANE + 1) * NUM_SQUARES].fill(1.0);
    }

    let ply = (state.move_count() as f32 / PLY_HORIZON).min(1.0);
    planes[PLY_PLANE * NUM_SQUARES..].fill(ply);

    planes
}

/// Rebuild pieces, facings, side to move and (below the horizon) the move
/// count from encoded planes.
pub fn decode(planes: &[f32]) -> Option<GameState> {
    if planes.len() != INPUT_LEN {
        return None;
    }

    let mover = if planes[SILVER_PLANE * NUM_SQUARES] > 0.5 {
        Player::Silver
    } else {
        Player::Red
    };
    let mut state = GameState::empty(mover);

    for sq in Square::all() {
        let i = sq.index();
        let Some(plane) = (0..10).find(|p| planes[p * NUM_SQUARES + i] > 0.5) else {
            continue;
        };
        let owner = if plane < 5 { mover } else { mover.opponent() };
        let kind = PieceKind::from_index(plane % 5)?;
        let facing = Direction::ALL
            .into_iter()
            .find(|d| planes[(FACING_PLANE + d.index()) * NUM_SQUARES + i] > 0.5)?;
        state.place(sq, Piece::new(kind, owner, facing));
    }

    let ply = planes[PLY_PLANE * NUM_SQUARES];
    state.set_move_count((ply * PLY_HORIZON).round() as u32);

    Some(state)
}

// ============================================================================
// MOVE INDEX
// ============================================================================

/// Slot of a one-step displacement
pub fn translation_slot(dc: i8, dr: i8) -> Option<usize> {
    NEIGHBOR_OFFSETS.iter().position(|&o| o == (dc, dr))
}

pub fn policy_index(sq: Square, slot: usize) -> usize {
    debug_assert!(slot < POLICY_SLOTS);
    sq.index() * POLICY_SLOTS + slot
}

/// Inverse of [`policy_index`]
pub fn split_policy_index(index: usize) -> (Square, usize) {
    (Square::from_index(index / POLICY_SLOTS), index % POLICY_SLOTS)
}

/// Policy index of a move in `state`. `None` for moves that do not fit the
/// layout (no piece to rotate, non-adjacent step).
pub fn move_index(state: &GameState, mv: Move) -> Option<usize> {
    match mv {
        Move::Translate { from, to } | Move::Swap { from, to } => {
            let slot = translation_slot(to.col - from.col, to.row - from.row)?;
            Some(policy_index(from, slot))
        }
        Move::Rotate { at, facing } => {
            let piece = state.piece_at(at)?;
            let slot = if piece.kind == PieceKind::Sphinx {
                ROTATE_CCW + facing.index()
            } else if facing == piece.facing.counter_clockwise() {
                ROTATE_CCW
            } else if facing == piece.facing.clockwise() {
                ROTATE_CW
            } else {
                return None;
            };
            Some(policy_index(at, slot))
        }
    }
}

/// Move addressed by a policy index in `state`. Legality is not checked.
pub fn index_to_move(state: &GameState, index: usize) -> Option<Move> {
    if index >= POLICY_LEN {
        return None;
    }
    let (sq, slot) = split_policy_index(index);
    let piece = state.piece_at(sq)?;

    if slot < ROTATE_CCW {
        if piece.kind == PieceKind::Sphinx {
            return None;
        }
        let (dc, dr) = NEIGHBOR_OFFSETS[slot];
        let to = sq.offset(dc, dr);
        if !to.is_valid() {
            return None;
        }
        return Some(match state.piece_at(to) {
            None => Move::Translate { from: sq, to },
            Some(_) => Move::Swap { from: sq, to },
        });
    }

    let facing = match (piece.kind, slot) {
        (PieceKind::Sphinx, s) => Direction::from_index((s - ROTATE_CCW) as u8),
        (_, ROTATE_CCW) => piece.facing.counter_clockwise(),
        (_, ROTATE_CW) => piece.facing.clockwise(),
        _ => return None,
    };
    Some(Move::Rotate { at: sq, facing })
}
