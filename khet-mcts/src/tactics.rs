//! Root move filters applied before search

use khet_core::{GameState, Move};

/// What the filters decided about a root position
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootPlan {
    /// A move that wins on the spot
    Win(Move),
    /// Exactly one candidate survived; no search needed
    Forced(Move),
    /// Moves worth searching
    Search(Vec<Move>),
}

/// Run the tactical filters over the legal moves of `state`.
///
/// Returns `None` when there are no legal moves.
pub fn plan_root(state: &GameState) -> Option<RootPlan> {
    let moves = state.legal_moves();
    if moves.is_empty() {
        return None;
    }

    let me = state.current_player();
    let mut safe = Vec::with_capacity(moves.len());

    for &mv in &moves {
        let after = state.with_move(mv);
        match after.winner() {
            Some(w) if w == me => return Some(RootPlan::Win(mv)),
            // Shot our own Pharaoh
            Some(_) => continue,
            None => {}
        }
        if !after.has_immediate_win() {
            safe.push(mv);
        }
    }

    let candidates = if !safe.is_empty() && safe.len() < moves.len() {
        tracing::debug!(
            "threat filter kept {} of {} moves",
            safe.len(),
            moves.len()
        );
        safe
    } else {
        moves
    };

    Some(match candidates.as_slice() {
        [only] => RootPlan::Forced(*only),
        _ => RootPlan::Search(candidates),
    })
}
