//! Game state, move generation and move application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{may_occupy, Direction, Square, COLS, NEIGHBOR_OFFSETS, NUM_SQUARES, ROWS};
use crate::laser::{resolve_beam, LaserTrace, PendingHit};
use crate::pieces::{sphinx_alternate, sphinx_facings, sphinx_home, Piece, PieceKind};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Player colour. Silver moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Silver = 0,
    Red = 1,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::Silver => Player::Red,
            Player::Red => Player::Silver,
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Player::Silver => write!(f, "Silver"),
            Player::Red => write!(f, "Red"),
        }
    }
}

/// A legal action. `Rotate` carries the facing after the rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Rotate { at: Square, facing: Direction },
    Translate { from: Square, to: Square },
    Swap { from: Square, to: Square },
}

impl Move {
    /// Square of the piece that acts
    pub fn origin(&self) -> Square {
        match *self {
            Move::Rotate { at, .. } => at,
            Move::Translate { from, .. } | Move::Swap { from, .. } => from,
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Move::Rotate { at, facing } => write!(f, "{}@{}", at, facing),
            Move::Translate { from, to } => write!(f, "{}-{}", from, to),
            Move::Swap { from, to } => write!(f, "{}x{}", from, to),
        }
    }
}

/// Errors from applying caller-supplied moves
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("illegal move: {0}")]
    IllegalMove(Move),

    #[error("game is over, {0} won")]
    GameOver(Player),

    #[error("board invariant violated: {0}")]
    InvariantViolation(String),
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Game state. `Clone` is a deep copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    /// Row-major cells, index `row * COLS + col`
    cells: [Option<Piece>; NUM_SQUARES],

    current_player: Player,

    winner: Option<Player>,

    /// Plies played so far
    move_count: u32,

    /// Beam of the most recent shot
    last_trace: LaserTrace,

    /// Removal waiting for `commit_hit`
    pending_hit: Option<PendingHit>,
}

/// Silver's half of the classic (Khet 2.0) layout. Red mirrors it by 180°.
const CLASSIC_SILVER: [(i8, i8, PieceKind, Direction); 13] = [
    (9, 0, PieceKind::Sphinx, Direction::North),
    (4, 0, PieceKind::Pharaoh, Direction::North),
    (3, 0, PieceKind::Anubis, Direction::North),
    (5, 0, PieceKind::Anubis, Direction::North),
    (4, 3, PieceKind::Scarab, Direction::West),
    (5, 3, PieceKind::Scarab, Direction::North),
    (2, 0, PieceKind::Pyramid, Direction::East),
    (2, 3, PieceKind::Pyramid, Direction::East),
    (2, 4, PieceKind::Pyramid, Direction::North),
    (3, 5, PieceKind::Pyramid, Direction::East),
    (7, 1, PieceKind::Pyramid, Direction::South),
    (9, 3, PieceKind::Pyramid, Direction::North),
    (9, 4, PieceKind::Pyramid, Direction::East),
];

impl GameState {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Classic opening position, Silver to move
    pub fn new_game() -> Self {
        let mut state = Self::empty(Player::Silver);
        for &(col, row, kind, facing) in &CLASSIC_SILVER {
            state.place(Square::new(col, row), Piece::new(kind, Player::Silver, facing));
            state.place(
                Square::new(COLS - 1 - col, ROWS - 1 - row),
                Piece::new(kind, Player::Red, facing.opposite()),
            );
        }
        state
    }

    /// Board with no pieces. Used for constructed positions.
    pub fn empty(to_move: Player) -> Self {
        Self {
            cells: [None; NUM_SQUARES],
            current_player: to_move,
            winner: None,
            move_count: 0,
            last_trace: LaserTrace::default(),
            pending_hit: None,
        }
    }

    /// Put a piece on a square, replacing whatever was there
    pub fn place(&mut self, sq: Square, piece: Piece) {
        assert!(sq.is_valid(), "cannot place a piece off the board at {:?}", sq);
        self.cells[sq.index()] = Some(piece);
    }

    /// Builder form of [`GameState::place`]
    pub fn with_piece(mut self, sq: Square, piece: Piece) -> Self {
        self.place(sq, piece);
        self
    }

    pub fn set_move_count(&mut self, move_count: u32) {
        self.move_count = move_count;
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn last_trace(&self) -> &LaserTrace {
        &self.last_trace
    }

    pub fn pending_hit(&self) -> Option<&PendingHit> {
        self.pending_hit.as_ref()
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        if sq.is_valid() {
            self.cells[sq.index()]
        } else {
            None
        }
    }

    /// Iterate pieces on the board in square order
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.map(|p| (Square::from_index(i), p)))
    }

    pub fn pharaoh_square(&self, player: Player) -> Option<Square> {
        self.find(PieceKind::Pharaoh, player)
    }

    pub fn sphinx_square(&self, player: Player) -> Option<Square> {
        self.find(PieceKind::Sphinx, player)
    }

    fn find(&self, kind: PieceKind, player: Player) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.kind == kind && p.owner == player)
            .map(|(sq, _)| sq)
    }

    // ========================================================================
    // MOVE GENERATION
    // ========================================================================

    /// All legal moves for the side to move (empty once the game is over)
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.winner.is_some() {
            return vec![];
        }

        let mut moves = Vec::with_capacity(128);
        let player = self.current_player;

        for (sq, piece) in self.pieces() {
            if piece.owner != player {
                continue;
            }

            self.generate_rotations(sq, &piece, &mut moves);

            if piece.kind != PieceKind::Sphinx {
                self.generate_steps(sq, &piece, &mut moves);
            }
        }

        moves
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.legal_moves().contains(&mv)
    }

    fn generate_rotations(&self, at: Square, piece: &Piece, moves: &mut Vec<Move>) {
        if piece.kind == PieceKind::Sphinx {
            let facing = sphinx_alternate(piece.owner, piece.facing);
            moves.push(Move::Rotate { at, facing });
        } else {
            moves.push(Move::Rotate { at, facing: piece.facing.clockwise() });
            moves.push(Move::Rotate { at, facing: piece.facing.counter_clockwise() });
        }
    }

    fn generate_steps(&self, from: Square, piece: &Piece, moves: &mut Vec<Move>) {
        for &(dc, dr) in &NEIGHBOR_OFFSETS {
            let to = from.offset(dc, dr);
            if !to.is_valid() || !may_occupy(to, piece.owner) {
                continue;
            }

            match self.cells[to.index()] {
                None => moves.push(Move::Translate { from, to }),
                Some(target) => {
                    let swappable = piece.kind == PieceKind::Scarab
                        && matches!(target.kind, PieceKind::Pyramid | PieceKind::Anubis);
                    // The displaced piece lands on our origin square
                    if swappable && may_occupy(from, target.owner) {
                        moves.push(Move::Swap { from, to });
                    }
                }
            }
        }
    }

    // ========================================================================
    // APPLY MOVE
    // ========================================================================

    /// Apply a caller-supplied move: validate it, move the piece, fire the
    /// mover's laser and hand the turn over.
    ///
    /// The struck piece, if any, stays on the board until [`commit_hit`]
    /// is called. A hit still pending from the previous move is committed
    /// first. On error the state is left untouched.
    ///
    /// [`commit_hit`]: GameState::commit_hit
    pub fn apply_move(&mut self, mv: Move) -> Result<Option<PendingHit>, GameError> {
        let mut next = self.clone();
        next.commit_hit();

        if let Some(winner) = next.winner {
            return Err(GameError::GameOver(winner));
        }
        if !next.is_legal(mv) {
            return Err(GameError::IllegalMove(mv));
        }

        let before = next.pieces().count();
        next.apply_unchecked(mv);
        if next.pieces().count() != before {
            return Err(GameError::InvariantViolation(format!(
                "{} changed the piece count from {} to {}",
                mv,
                before,
                next.pieces().count()
            )));
        }
        next.check_invariants()?;

        let hit = next.pending_hit;
        *self = next;
        Ok(hit)
    }

    /// Apply the pending laser hit, if any. Idempotent when nothing is pending.
    pub fn commit_hit(&mut self) -> Option<PendingHit> {
        let hit = self.pending_hit.take()?;
        self.cells[hit.square.index()] = None;
        if let Some(winner) = hit.winner {
            self.winner = Some(winner);
        }
        Some(hit)
    }

    /// Clone, apply a move known to be legal and commit its hit.
    pub fn with_move(&self, mv: Move) -> Self {
        let mut next = self.clone();
        next.play_unchecked(mv);
        next
    }

    /// In-place apply + commit for moves taken from [`GameState::legal_moves`]
    pub fn play_unchecked(&mut self, mv: Move) {
        self.commit_hit();
        self.apply_unchecked(mv);
        self.commit_hit();
    }

    fn apply_unchecked(&mut self, mv: Move) {
        match mv {
            Move::Rotate { at, facing } => {
                if let Some(piece) = self.cells[at.index()].as_mut() {
                    piece.facing = facing;
                }
            }
            Move::Translate { from, to } => {
                debug_assert!(self.cells[to.index()].is_none(), "translate onto occupied {}", to);
                self.cells[to.index()] = self.cells[from.index()].take();
            }
            Move::Swap { from, to } => {
                self.cells.swap(from.index(), to.index());
            }
        }

        self.fire_laser();
        self.current_player = self.current_player.opponent();
        self.move_count += 1;
    }

    fn fire_laser(&mut self) {
        let (trace, hit) = self.trace_laser(self.current_player);
        self.last_trace = trace;
        self.pending_hit = hit;
    }

    /// Trace `player`'s beam on the current board without changing it
    pub fn trace_laser(&self, player: Player) -> (LaserTrace, Option<PendingHit>) {
        let home = sphinx_home(player);
        match self.cells[home.index()] {
            Some(p) if p.kind == PieceKind::Sphinx && p.owner == player => {
                resolve_beam(&self.cells, home, p.facing)
            }
            _ => (LaserTrace::default(), None),
        }
    }

    // ========================================================================
    // TACTICS
    // ========================================================================

    /// A move that wins on the spot for the side to move
    pub fn immediate_win(&self) -> Option<Move> {
        let me = self.current_player;
        self.legal_moves()
            .into_iter()
            .find(|&mv| self.with_move(mv).winner == Some(me))
    }

    pub fn has_immediate_win(&self) -> bool {
        self.immediate_win().is_some()
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Check Sphinx anchoring and Pharaoh uniqueness
    pub fn check_invariants(&self) -> Result<(), GameError> {
        for player in [Player::Silver, Player::Red] {
            let sphinxes: Vec<(Square, Piece)> = self
                .pieces()
                .filter(|(_, p)| p.kind == PieceKind::Sphinx && p.owner == player)
                .collect();
            match sphinxes.as_slice() {
                [] => {}
                [(sq, p)] => {
                    if *sq != sphinx_home(player) {
                        return Err(GameError::InvariantViolation(format!(
                            "{} sphinx relocated to {}",
                            player, sq
                        )));
                    }
                    if !sphinx_facings(player).contains(&p.facing) {
                        return Err(GameError::InvariantViolation(format!(
                            "{} sphinx faces {}",
                            player, p.facing
                        )));
                    }
                }
                _ => {
                    return Err(GameError::InvariantViolation(format!(
                        "{} has {} sphinxes",
                        player,
                        sphinxes.len()
                    )))
                }
            }

            let pharaohs = self
                .pieces()
                .filter(|(_, p)| p.kind == PieceKind::Pharaoh && p.owner == player)
                .count();
            if pharaohs > 1 {
                return Err(GameError::InvariantViolation(format!(
                    "{} has {} pharaohs",
                    player, pharaohs
                )));
            }
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new_game()
    }
}

impl std::fmt::Display for GameState {
    /// Text diagram, rank 8 at the top
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in (0..ROWS).rev() {
            write!(f, "{} ", row + 1)?;
            for col in 0..COLS {
                match self.cells[Square::new(col, row).index()] {
                    Some(p) => write!(f, " {}", p)?,
                    None => write!(f, "  . ")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, " ")?;
        for col in 0..COLS {
            write!(f, "   {}", (b'A' + col as u8) as char)?;
        }
        writeln!(f)?;
        match self.winner {
            Some(w) => write!(f, "winner: {}", w),
            None => write!(f, "to move: {} (ply {})", self.current_player, self.move_count),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::square_restriction;
    use crate::laser::TraceOutcome;

    fn sq(col: i8, row: i8) -> Square {
        Square::new(col, row)
    }

    /// Both sphinxes and pharaohs, nothing else
    fn bare_game() -> GameState {
        GameState::empty(Player::Silver)
            .with_piece(sq(9, 0), Piece::new(PieceKind::Sphinx, Player::Silver, Direction::North))
            .with_piece(sq(0, 7), Piece::new(PieceKind::Sphinx, Player::Red, Direction::South))
            .with_piece(sq(4, 0), Piece::new(PieceKind::Pharaoh, Player::Silver, Direction::North))
            .with_piece(sq(5, 7), Piece::new(PieceKind::Pharaoh, Player::Red, Direction::South))
    }

    #[test]
    fn test_classic_setup() {
        let game = GameState::new_game();
        assert_eq!(game.pieces().count(), 26);
        assert_eq!(game.current_player(), Player::Silver);
        assert_eq!(game.pharaoh_square(Player::Silver), Some(sq(4, 0)));
        assert_eq!(game.pharaoh_square(Player::Red), Some(sq(5, 7)));
        assert_eq!(game.sphinx_square(Player::Red), Some(sq(0, 7)));
        assert_eq!(
            game.piece_at(sq(0, 7)).map(|p| p.facing),
            Some(Direction::South)
        );
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_sphinx_has_single_rotation_and_no_steps() {
        let game = bare_game();
        let sphinx_moves: Vec<Move> = game
            .legal_moves()
            .into_iter()
            .filter(|m| m.origin() == sq(9, 0))
            .collect();
        assert_eq!(
            sphinx_moves,
            vec![Move::Rotate { at: sq(9, 0), facing: Direction::West }]
        );
    }

    #[test]
    fn test_pharaoh_move_count() {
        let game = bare_game();
        let pharaoh_moves = game
            .legal_moves()
            .into_iter()
            .filter(|m| m.origin() == sq(4, 0))
            .count();
        // Two rotations plus five neighbours on the back rank
        assert_eq!(pharaoh_moves, 7);
    }

    #[test]
    fn test_translations_respect_restrictions() {
        let mut game = GameState::new_game();
        for _ in 0..40 {
            let moves = game.legal_moves();
            if moves.is_empty() {
                break;
            }
            let player = game.current_player();
            for mv in &moves {
                if let Move::Translate { to, .. } = mv {
                    assert_ne!(square_restriction(*to), Some(player.opponent()));
                }
            }
            let mv = moves[(game.move_count() as usize * 7) % moves.len()];
            game.apply_move(mv).unwrap();
            game.commit_hit();
        }
    }

    #[test]
    fn test_scarab_swaps_with_pyramid() {
        let game = bare_game()
            .with_piece(sq(4, 3), Piece::new(PieceKind::Scarab, Player::Silver, Direction::North))
            .with_piece(sq(5, 3), Piece::new(PieceKind::Pyramid, Player::Red, Direction::North))
            .with_piece(sq(4, 4), Piece::new(PieceKind::Pharaoh, Player::Red, Direction::North));
        let moves = game.legal_moves();
        assert!(moves.contains(&Move::Swap { from: sq(4, 3), to: sq(5, 3) }));
        // A Scarab never swaps with a Pharaoh
        assert!(!moves.contains(&Move::Swap { from: sq(4, 3), to: sq(4, 4) }));
    }

    #[test]
    fn test_swap_blocked_by_origin_restriction() {
        // Silver scarab on B1 (Silver-only) cannot swap a red pyramid onto it
        let game = bare_game()
            .with_piece(sq(1, 0), Piece::new(PieceKind::Scarab, Player::Silver, Direction::North))
            .with_piece(sq(2, 1), Piece::new(PieceKind::Pyramid, Player::Red, Direction::North))
            .with_piece(sq(1, 1), Piece::new(PieceKind::Pyramid, Player::Silver, Direction::North));
        let moves = game.legal_moves();
        assert!(!moves.contains(&Move::Swap { from: sq(1, 0), to: sq(2, 1) }));
        assert!(moves.contains(&Move::Swap { from: sq(1, 0), to: sq(1, 1) }));
    }

    #[test]
    fn test_illegal_move_leaves_state_untouched() {
        let mut game = GameState::new_game();
        let before = game.clone();
        let bogus = Move::Translate { from: sq(4, 0), to: sq(4, 2) };
        assert_eq!(game.apply_move(bogus), Err(GameError::IllegalMove(bogus)));
        assert_eq!(game, before);
    }

    #[test]
    fn test_pending_hit_then_commit() {
        // Silver fires N up file J into a red pyramid whose solid side faces S
        let mut game = bare_game()
            .with_piece(sq(9, 5), Piece::new(PieceKind::Pyramid, Player::Red, Direction::East))
            .with_piece(sq(2, 2), Piece::new(PieceKind::Pyramid, Player::Silver, Direction::North));
        let mv = Move::Rotate { at: sq(2, 2), facing: Direction::East };
        let hit = game.apply_move(mv).unwrap().expect("pyramid should be struck");

        assert_eq!(hit.square, sq(9, 5));
        assert_eq!(game.last_trace().last().unwrap().outcome, TraceOutcome::Destroyed);
        // Still on the board until committed
        assert!(game.piece_at(sq(9, 5)).is_some());
        assert_eq!(game.commit_hit(), Some(hit));
        assert!(game.piece_at(sq(9, 5)).is_none());
        assert_eq!(game.commit_hit(), None);
        assert_eq!(game.current_player(), Player::Red);
        assert_eq!(game.move_count(), 1);
    }

    #[test]
    fn test_firing_at_pharaoh_wins() {
        let mut game = bare_game().with_piece(
            sq(9, 6),
            Piece::new(PieceKind::Pharaoh, Player::Red, Direction::South),
        );
        // Replace the default red pharaoh so only one exists
        game.cells[sq(5, 7).index()] = None;
        let mv = Move::Rotate { at: sq(4, 0), facing: Direction::East };
        let hit = game.apply_move(mv).unwrap().unwrap();
        assert_eq!(hit.winner, Some(Player::Silver));
        assert_eq!(game.winner(), None);
        game.commit_hit();
        assert_eq!(game.winner(), Some(Player::Silver));
        assert!(game.legal_moves().is_empty());
        assert_eq!(
            game.apply_move(mv),
            Err(GameError::GameOver(Player::Silver))
        );
    }

    #[test]
    fn test_pending_hit_committed_before_next_move() {
        let mut game = bare_game()
            .with_piece(sq(9, 5), Piece::new(PieceKind::Anubis, Player::Red, Direction::North));
        game.apply_move(Move::Rotate { at: sq(4, 0), facing: Direction::East })
            .unwrap()
            .unwrap();
        let red_move = Move::Rotate { at: sq(5, 7), facing: Direction::East };
        game.apply_move(red_move).unwrap();
        assert!(game.piece_at(sq(9, 5)).is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let game = GameState::new_game();
        let mut copy = game.clone();
        let mv = copy.legal_moves()[0];
        copy.apply_move(mv).unwrap();
        assert_ne!(copy, game);
        assert_eq!(game.move_count(), 0);
        assert_eq!(game, GameState::new_game());
    }

    #[test]
    fn test_relocated_sphinx_is_invariant_violation() {
        let game = GameState::empty(Player::Silver).with_piece(
            sq(8, 0),
            Piece::new(PieceKind::Sphinx, Player::Silver, Direction::North),
        );
        assert!(matches!(
            game.check_invariants(),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_immediate_win_detection() {
        // Silver's own anubis shields the red pharaoh on file J. Stepping it
        // off the file wins.
        let game = bare_game()
            .with_piece(sq(9, 3), Piece::new(PieceKind::Anubis, Player::Silver, Direction::South))
            .with_piece(sq(9, 6), Piece::new(PieceKind::Pharaoh, Player::Red, Direction::South));
        assert!(game.trace_laser(Player::Silver).1.is_none());
        let win = game.immediate_win().expect("a winning move exists");
        let after = game.with_move(win);
        assert_eq!(after.winner(), Some(Player::Silver));
    }

    #[test]
    fn test_display_has_all_ranks() {
        let text = GameState::new_game().to_string();
        assert!(text.starts_with("8 "));
        assert!(text.contains("to move: Silver"));
    }
}
