//! Laser resolution
//!
//! The resolver walks a beam cell by cell and reports what it did without
//! touching the board. Removing a struck piece is a separate step
//! ([`crate::GameState::commit_hit`]).

use serde::{Deserialize, Serialize};

use crate::board::{Direction, Square, NUM_SQUARES};
use crate::game::Player;
use crate::pieces::{laser_effect, LaserEffect, Piece, PieceKind};

/// Upper bound on beam length; every cell entered from every side
const MAX_BEAM_STEPS: usize = NUM_SQUARES * 4;

/// Outcome recorded for one cell of a beam
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOutcome {
    Passthrough,
    Reflected(Direction),
    Destroyed,
    Blocked,
    OffBoard,
}

/// One cell visited by the beam
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub square: Square,
    /// Beam heading when it entered the cell
    pub heading: Direction,
    pub outcome: TraceOutcome,
}

/// Ordered beam path of a single shot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaserTrace {
    pub steps: Vec<TraceStep>,
}

impl LaserTrace {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Final step of the beam
    pub fn last(&self) -> Option<&TraceStep> {
        self.steps.last()
    }

    /// Square of the destroyed piece, if the shot destroyed one
    pub fn destroyed_square(&self) -> Option<Square> {
        self.last()
            .filter(|s| s.outcome == TraceOutcome::Destroyed)
            .map(|s| s.square)
    }
}

/// A removal computed by the resolver but not yet applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHit {
    pub square: Square,
    pub piece: Piece,
    /// Set when the struck piece is a Pharaoh: its owner's opponent wins
    pub winner: Option<Player>,
}

impl PendingHit {
    fn new(square: Square, piece: Piece) -> Self {
        let winner = match piece.kind {
            PieceKind::Pharaoh => Some(piece.owner.opponent()),
            _ => None,
        };
        Self { square, piece, winner }
    }
}

/// Trace a beam leaving `origin` (the firing Sphinx) with `heading`.
pub fn resolve_beam(
    cells: &[Option<Piece>; NUM_SQUARES],
    origin: Square,
    heading: Direction,
) -> (LaserTrace, Option<PendingHit>) {
    let mut steps = Vec::new();
    let mut pos = origin;
    let mut heading = heading;

    for _ in 0..MAX_BEAM_STEPS {
        pos = pos.step(heading);
        if !pos.is_valid() {
            steps.push(TraceStep { square: pos, heading, outcome: TraceOutcome::OffBoard });
            return (LaserTrace { steps }, None);
        }

        let piece = match cells[pos.index()] {
            Some(p) => p,
            None => {
                steps.push(TraceStep { square: pos, heading, outcome: TraceOutcome::Passthrough });
                continue;
            }
        };

        match laser_effect(&piece, heading) {
            LaserEffect::Reflect(next) => {
                steps.push(TraceStep {
                    square: pos,
                    heading,
                    outcome: TraceOutcome::Reflected(next),
                });
                heading = next;
            }
            LaserEffect::Destroy => {
                steps.push(TraceStep { square: pos, heading, outcome: TraceOutcome::Destroyed });
                return (LaserTrace { steps }, Some(PendingHit::new(pos, piece)));
            }
            LaserEffect::Block => {
                steps.push(TraceStep { square: pos, heading, outcome: TraceOutcome::Blocked });
                return (LaserTrace { steps }, None);
            }
        }
    }

    // Unreachable for legal positions: mirrors cannot form a closed loop
    // that excludes the source.
    tracing::warn!("laser beam exceeded {} steps, stopping", MAX_BEAM_STEPS);
    (LaserTrace { steps }, None)
}
