//! Board geometry: squares, compass directions and square restrictions

use serde::{Deserialize, Serialize};

use crate::game::Player;

/// Board width (files A-J)
pub const COLS: i8 = 10;

/// Board height (ranks 1-8)
pub const ROWS: i8 = 8;

/// Number of cells on the board
pub const NUM_SQUARES: usize = (COLS as usize) * (ROWS as usize);

/// Board square. Coordinates are signed so that the point where a laser
/// leaves the board can still be described.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Square {
    pub col: i8,
    pub row: i8,
}

impl Square {
    pub const fn new(col: i8, row: i8) -> Self {
        Self { col, row }
    }

    /// Check if this square is on the board
    pub fn is_valid(&self) -> bool {
        self.col >= 0 && self.col < COLS && self.row >= 0 && self.row < ROWS
    }

    /// Flat index `row * COLS + col`. Only meaningful for valid squares.
    pub fn index(&self) -> usize {
        debug_assert!(self.is_valid(), "index of off-board square {:?}", self);
        self.row as usize * COLS as usize + self.col as usize
    }

    /// Inverse of [`Square::index`]
    pub fn from_index(index: usize) -> Self {
        Self::new((index % COLS as usize) as i8, (index / COLS as usize) as i8)
    }

    pub fn offset(&self, dc: i8, dr: i8) -> Square {
        Square::new(self.col + dc, self.row + dr)
    }

    /// Adjacent square in a compass direction
    pub fn step(&self, dir: Direction) -> Square {
        let (dc, dr) = dir.delta();
        self.offset(dc, dr)
    }

    /// The up-to-eight on-board neighbours
    pub fn neighbors(&self) -> impl Iterator<Item = Square> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |&(dc, dr)| self.offset(dc, dr))
            .filter(|sq| sq.is_valid())
    }

    pub fn is_corner(&self) -> bool {
        (self.col == 0 || self.col == COLS - 1) && (self.row == 0 || self.row == ROWS - 1)
    }

    /// Number of board edges this square touches (0, 1 or 2)
    pub fn edges_touched(&self) -> u8 {
        let horizontal = (self.col == 0 || self.col == COLS - 1) as u8;
        let vertical = (self.row == 0 || self.row == ROWS - 1) as u8;
        horizontal + vertical
    }

    /// Manhattan distance to the geometric centre of the board
    pub fn center_distance(&self) -> f32 {
        let cx = (COLS as f32 - 1.0) / 2.0;
        let cy = (ROWS as f32 - 1.0) / 2.0;
        (self.col as f32 - cx).abs() + (self.row as f32 - cy).abs()
    }

    /// Iterate every on-board square in index order
    pub fn all() -> impl Iterator<Item = Square> {
        (0..NUM_SQUARES).map(Square::from_index)
    }
}

impl std::fmt::Display for Square {
    /// Algebraic name, e.g. `J1`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}{}", (b'A' + self.col as u8) as char, self.row + 1)
        } else {
            write!(f, "({},{})", self.col, self.row)
        }
    }
}

/// 8-neighbourhood offsets in policy-slot order (see `encode::translation_slot`)
pub const NEIGHBOR_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Compass direction. North increases the row index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index % 4) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit vector (dcol, drow)
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self as u8 + 2)
    }

    pub fn clockwise(self) -> Self {
        Self::from_index(self as u8 + 1)
    }

    pub fn counter_clockwise(self) -> Self {
        Self::from_index(self as u8 + 3)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        };
        write!(f, "{}", c)
    }
}

/// Which side, if any, may occupy a square.
///
/// Silver owns file J plus B1 and B8, Red owns file A plus I1 and I8.
pub fn square_restriction(sq: Square) -> Option<Player> {
    match (sq.col, sq.row) {
        (9, _) => Some(Player::Silver),
        (1, 0) | (1, 7) => Some(Player::Silver),
        (0, _) => Some(Player::Red),
        (8, 0) | (8, 7) => Some(Player::Red),
        _ => None,
    }
}

/// Whether `player` may place a piece on `sq`
pub fn may_occupy(sq: Square, player: Player) -> bool {
    square_restriction(sq).map_or(true, |owner| owner == player)
}
