//! Piece kinds and their laser interaction rules

use serde::{Deserialize, Serialize};

use crate::board::{Direction, Square};
use crate::game::Player;

/// Piece kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pharaoh,
    Sphinx,
    Pyramid,
    Scarab,
    Anubis,
}

impl PieceKind {
    pub const ALL: [PieceKind; 5] = [
        PieceKind::Pharaoh,
        PieceKind::Sphinx,
        PieceKind::Pyramid,
        PieceKind::Scarab,
        PieceKind::Anubis,
    ];

    /// Plane offset used by the board encoder
    pub fn index(self) -> usize {
        match self {
            PieceKind::Pharaoh => 0,
            PieceKind::Sphinx => 1,
            PieceKind::Pyramid => 2,
            PieceKind::Scarab => 3,
            PieceKind::Anubis => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn letter(self) -> char {
        match self {
            PieceKind::Pharaoh => 'P',
            PieceKind::Sphinx => 'X',
            PieceKind::Pyramid => 'Y',
            PieceKind::Scarab => 'S',
            PieceKind::Anubis => 'A',
        }
    }
}

/// A piece on the board
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub owner: Player,
    pub facing: Direction,
}

impl Piece {
    pub const fn new(kind: PieceKind, owner: Player, facing: Direction) -> Self {
        Self { kind, owner, facing }
    }
}

impl std::fmt::Display for Piece {
    /// Compact cell label: kind letter, owner, facing (e.g. `YsE`)
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = match self.owner {
            Player::Silver => 's',
            Player::Red => 'r',
        };
        write!(f, "{}{}{}", self.kind.letter(), owner, self.facing)
    }
}

// ============================================================================
// MIRRORS
// ============================================================================

/// Mirror orientation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mirror {
    /// "/" diagonal
    Slash,
    /// "\" diagonal
    Backslash,
}

/// "/" mirror, indexed by beam heading N,E,S,W
const SLASH: [Direction; 4] = [
    Direction::East,
    Direction::North,
    Direction::West,
    Direction::South,
];

/// "\" mirror, indexed by beam heading N,E,S,W
const BACKSLASH: [Direction; 4] = [
    Direction::West,
    Direction::South,
    Direction::East,
    Direction::North,
];

impl Mirror {
    /// New beam heading after reflecting off this mirror
    pub fn reflect(self, heading: Direction) -> Direction {
        match self {
            Mirror::Slash => SLASH[heading.index()],
            Mirror::Backslash => BACKSLASH[heading.index()],
        }
    }
}

/// Pyramid geometry for a facing: mirror diagonal and the two solid sides.
/// The facing names the corner the solid triangle sits in, rotated so that
/// facing N is the NE triangle.
fn pyramid_geometry(facing: Direction) -> (Mirror, [Direction; 2]) {
    match facing {
        Direction::North => (Mirror::Backslash, [Direction::North, Direction::East]),
        Direction::East => (Mirror::Slash, [Direction::South, Direction::East]),
        Direction::South => (Mirror::Backslash, [Direction::South, Direction::West]),
        Direction::West => (Mirror::Slash, [Direction::North, Direction::West]),
    }
}

fn scarab_mirror(facing: Direction) -> Mirror {
    match facing {
        Direction::North | Direction::South => Mirror::Backslash,
        Direction::East | Direction::West => Mirror::Slash,
    }
}

// ============================================================================
// LASER INTERACTION
// ============================================================================

/// What a beam does when it enters a piece's cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaserEffect {
    Reflect(Direction),
    Destroy,
    Block,
}

/// Resolve a beam travelling `heading` into `piece`.
pub fn laser_effect(piece: &Piece, heading: Direction) -> LaserEffect {
    // Side of the cell the beam enters through
    let hit_side = heading.opposite();

    match piece.kind {
        PieceKind::Sphinx => LaserEffect::Block,
        PieceKind::Pharaoh => LaserEffect::Destroy,
        PieceKind::Anubis => {
            if hit_side == piece.facing {
                LaserEffect::Block
            } else {
                LaserEffect::Destroy
            }
        }
        PieceKind::Pyramid => {
            let (mirror, solid) = pyramid_geometry(piece.facing);
            if solid.contains(&hit_side) {
                LaserEffect::Destroy
            } else {
                LaserEffect::Reflect(mirror.reflect(heading))
            }
        }
        PieceKind::Scarab => LaserEffect::Reflect(scarab_mirror(piece.facing).reflect(heading)),
    }
}

// ============================================================================
// SPHINX
// ============================================================================

/// Home square of a side's Sphinx
pub fn sphinx_home(player: Player) -> Square {
    match player {
        Player::Silver => Square::new(9, 0),
        Player::Red => Square::new(0, 7),
    }
}

/// The two facings that point from the Sphinx's corner into the board
pub fn sphinx_facings(player: Player) -> [Direction; 2] {
    match player {
        Player::Silver => [Direction::North, Direction::West],
        Player::Red => [Direction::South, Direction::East],
    }
}

/// The single alternate facing a Sphinx may rotate to
pub fn sphinx_alternate(player: Player, current: Direction) -> Direction {
    let [a, b] = sphinx_facings(player);
    if current == a {
        b
    } else {
        a
    }
}
