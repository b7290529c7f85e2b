//! Game, player and move records as the domain sees them.
//!
//! Store adapters convert their row types into these; nothing here knows how
//! the rows are persisted.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::graph::NodeId;
use crate::domain::tickets::{TicketKind, Tickets};

/// Game lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Finished,
}

impl GameStatus {
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        matches!(
            (self, next),
            (GameStatus::Waiting, GameStatus::InProgress)
                | (GameStatus::InProgress, GameStatus::Finished)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::InProgress => "in_progress",
            GameStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Seeker,
    Evader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub name: String,
    pub status: GameStatus,
    /// Incremented by exactly one per accepted move.
    pub current_turn: u32,
    pub hidden_role_player_id: Option<i64>,
    pub winner: Option<Role>,
    /// Bumped by every seat change: join, leave, departure mid-game.
    pub roster_version: u32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub game_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub current_position: NodeId,
    pub is_active: bool,
    pub tickets: Tickets,
    pub joined_at: OffsetDateTime,
}

impl Player {
    pub fn is_evader(&self) -> bool {
        self.role == Role::Evader
    }
}

impl Move {
    pub fn is_pass(&self) -> bool {
        self.ticket.is_none()
    }
}

/// One accepted move or pass. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub id: i64,
    pub game_id: i64,
    pub player_id: i64,
    pub turn_number: u32,
    pub from_position: NodeId,
    pub to_position: NodeId,
    /// `None` for a pass recorded on behalf of a departed seat.
    pub ticket: Option<TicketKind>,
    pub revealed: bool,
    pub created_at: OffsetDateTime,
}
