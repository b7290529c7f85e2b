//! Information disclosure schedule for the evader.

use serde::Serialize;

use crate::domain::graph::NodeId;
use crate::domain::model::{GameStatus, Move, Player, Role};

/// Reveal on turn 1 and on every multiple of 3. Turn 0 never reveals.
pub fn is_reveal_turn(turn_number: u32) -> bool {
    turn_number == 1 || (turn_number != 0 && turn_number % 3 == 0)
}

/// Whether a committed move is stored as revealed. Uses the turn number at
/// commit time.
pub fn move_is_revealed(turn_number: u32, mover_role: Role) -> bool {
    mover_role == Role::Evader && is_reveal_turn(turn_number)
}

/// What one viewer may see of the evader right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaderVisibility {
    pub evader_id: i64,
    /// Live position is disclosed to this viewer.
    pub live_visible: bool,
    /// Live position when visible, otherwise `None`.
    pub position: Option<NodeId>,
    /// Destination of the most recent revealed evader move.
    pub last_revealed: Option<NodeId>,
}

/// Live visibility uses the game's *current* turn, which can differ from the
/// turn of the last evader move.
pub fn evader_visibility(
    evader: &Player,
    viewer_player_id: Option<i64>,
    status: GameStatus,
    current_turn: u32,
    moves: &[Move],
) -> EvaderVisibility {
    let live_visible = viewer_player_id == Some(evader.id)
        || status == GameStatus::Finished
        || (status == GameStatus::InProgress && is_reveal_turn(current_turn));

    let last_revealed = moves
        .iter()
        .filter(|m| m.player_id == evader.id && m.revealed)
        .max_by_key(|m| m.turn_number)
        .map(|m| m.to_position);

    EvaderVisibility {
        evader_id: evader.id,
        live_visible,
        position: live_visible.then_some(evader.current_position),
        last_revealed,
    }
}

/// Public move log entry: unrevealed evader moves keep their ticket kind but
/// hide both endpoints. Passes carry no ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveView {
    pub turn_number: u32,
    pub player_id: i64,
    pub ticket: Option<crate::domain::tickets::TicketKind>,
    pub from_position: Option<NodeId>,
    pub to_position: Option<NodeId>,
    pub revealed: bool,
}

pub fn redact_move(mv: &Move, evader_id: Option<i64>, viewer_player_id: Option<i64>) -> MoveView {
    let hidden = evader_id == Some(mv.player_id)
        && viewer_player_id != Some(mv.player_id)
        && !mv.revealed;
    MoveView {
        turn_number: mv.turn_number,
        player_id: mv.player_id,
        ticket: mv.ticket,
        from_position: (!hidden).then_some(mv.from_position),
        to_position: (!hidden).then_some(mv.to_position),
        revealed: mv.revealed,
    }
}
