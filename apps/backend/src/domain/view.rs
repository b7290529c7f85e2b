//! Per-viewer projection of one game snapshot.
//!
//! A `SessionView` is rebuilt from scratch on every refresh and never patched
//! in place. Everything the UI gates on (whose turn, which destinations are
//! offered, what is hidden) is derived here so the local view and the commit
//! re-validation read the same rules.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::graph::{candidate_destinations, NodeId, TransportGraph};
use crate::domain::model::{Game, GameStatus, Move, Role};
use crate::domain::reveal::{evader_visibility, redact_move, EvaderVisibility, MoveView};
use crate::domain::tickets::{has_ticket, TicketKind, Tickets};
use crate::domain::turns::{seat_to_act, Roster};
use crate::errors::domain::DomainError;

/// Game, roster and move log read together in one store transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub game: Game,
    pub roster: Roster,
    pub moves: Vec<Move>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub is_active: bool,
    /// `None` for the evader when this viewer may not see the live position.
    pub position: Option<NodeId>,
    pub tickets: Tickets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub game_id: i64,
    pub status: GameStatus,
    pub current_turn: u32,
    pub winner: Option<Role>,
    pub viewer_player_id: Option<i64>,
    pub active_player_id: Option<i64>,
    pub is_my_turn: bool,
    /// Offered destinations per ticket kind. Empty unless it is the viewer's
    /// turn; kinds the viewer holds none of, or may not spend, are absent.
    pub candidates: BTreeMap<TicketKind, BTreeSet<NodeId>>,
    pub players: Vec<PlayerView>,
    pub evader: Option<EvaderVisibility>,
    pub moves: Vec<MoveView>,
}

impl SessionView {
    pub fn candidates_for(&self, kind: TicketKind) -> Option<&BTreeSet<NodeId>> {
        self.candidates.get(&kind)
    }

    pub fn player(&self, player_id: i64) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

pub fn derive_view(
    snapshot: &GameSnapshot,
    viewer_user_id: i64,
    graph: &dyn TransportGraph,
) -> Result<SessionView, DomainError> {
    let GameSnapshot {
        game,
        roster,
        moves,
    } = snapshot;

    let viewer = roster.by_user(viewer_user_id);
    let viewer_player_id = viewer.map(|p| p.id);

    let active_player_id = match game.status {
        GameStatus::InProgress => Some(seat_to_act(roster, game.current_turn)?.1.id),
        GameStatus::Waiting | GameStatus::Finished => None,
    };
    let is_my_turn = active_player_id.is_some() && active_player_id == viewer_player_id;

    let candidates = match viewer {
        Some(me) if is_my_turn => TicketKind::ALL
            .iter()
            .filter(|kind| kind.usable_by(me.role) && has_ticket(&me.tickets, **kind))
            .map(|kind| {
                (
                    *kind,
                    candidate_destinations(graph, me.current_position, *kind),
                )
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    let evader = roster
        .evader()
        .map(|e| evader_visibility(e, viewer_player_id, game.status, game.current_turn, moves));
    let evader_id = evader.as_ref().map(|e| e.evader_id);

    let players = roster
        .players()
        .iter()
        .map(|p| {
            let position = match &evader {
                Some(vis) if vis.evader_id == p.id => vis.position,
                _ => Some(p.current_position),
            };
            PlayerView {
                id: p.id,
                user_id: p.user_id,
                role: p.role,
                is_active: p.is_active,
                position,
                tickets: p.tickets,
            }
        })
        .collect();

    let mut log: Vec<MoveView> = moves
        .iter()
        .map(|m| redact_move(m, evader_id, viewer_player_id))
        .collect();
    log.sort_by_key(|m| m.turn_number);

    Ok(SessionView {
        game_id: game.id,
        status: game.status,
        current_turn: game.current_turn,
        winner: game.winner,
        viewer_player_id,
        active_player_id,
        is_my_turn,
        candidates,
        players,
        evader,
        moves: log,
    })
}
