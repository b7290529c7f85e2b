//! Persistent store interface.
//!
//! Every read and write goes through a `StoreTxn`. Writes become visible to
//! other transactions only on `commit`, all together or not at all.
//! `update_game` is a conditional write: it succeeds only while the stored
//! turn counter (and optionally status and roster version) still match what
//! the caller read.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::graph::NodeId;
use crate::domain::model::{Game, GameStatus, Move, Player, Role};
use crate::domain::tickets::{TicketKind, Tickets};
use crate::error::AppError;
use crate::errors::domain::{
    ConflictKind, DomainError, InfraErrorKind, NotFoundKind,
};

pub mod in_memory;
pub mod sea;

pub use in_memory::InMemoryStore;
pub use sea::SeaStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Conditional update matched no row.
    #[error("conditional update failed: expected turn {expected_turn}, found {actual_turn:?}")]
    Conflict {
        expected_turn: u32,
        actual_turn: Option<u32>,
    },
    /// Unique constraint hit on insert.
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Row could not be decoded into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                expected_turn,
                actual_turn,
            } => DomainError::conflict(
                ConflictKind::TurnAdvanced,
                match actual_turn {
                    Some(actual) if actual == expected_turn => {
                        format!("Game changed at turn {expected_turn} before commit")
                    }
                    Some(actual) => format!(
                        "Turn advanced from {expected_turn} to {actual} before commit"
                    ),
                    None => format!("Turn {expected_turn} was taken before commit"),
                },
            ),
            StoreError::Duplicate(d) => DomainError::conflict(ConflictKind::Other(d.clone()), d),
            StoreError::NotFound(d) => DomainError::not_found(NotFoundKind::Other(d.clone()), d),
            StoreError::Corrupt(d) => DomainError::infra(InfraErrorKind::DataCorruption, d),
            StoreError::Unavailable(d) => DomainError::infra(InfraErrorKind::StoreUnavailable, d),
        }
    }
}

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError>;
}

#[async_trait]
pub trait StoreTxn: Send {
    async fn find_game(&mut self, game_id: i64) -> Result<Option<Game>, StoreError>;

    /// Players of one game, in no particular order.
    async fn players_in_game(&mut self, game_id: i64) -> Result<Vec<Player>, StoreError>;

    /// Moves of one game ordered by `turn_number`.
    async fn moves_in_game(&mut self, game_id: i64) -> Result<Vec<Move>, StoreError>;

    async fn insert_game(&mut self, game: NewGame) -> Result<Game, StoreError>;

    /// `Duplicate` when the user already holds a seat in the game.
    async fn insert_player(&mut self, player: NewPlayer) -> Result<Player, StoreError>;

    /// `Conflict` when a move already exists for `(game_id, turn_number)`.
    async fn insert_move(&mut self, mv: NewMove) -> Result<Move, StoreError>;

    async fn update_player(&mut self, update: PlayerUpdate) -> Result<(), StoreError>;

    async fn delete_player(&mut self, game_id: i64, player_id: i64) -> Result<(), StoreError>;

    async fn update_game(&mut self, update: GameUpdate) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>);
}

/// Close a transaction: commit on `Ok`, roll back on `Err`.
///
/// The original error is preserved on rollback; a failed commit (including a
/// commit-time conflict) is converted like any other store error.
pub async fn finish_txn<T>(
    txn: Box<dyn StoreTxn>,
    out: Result<T, DomainError>,
) -> Result<T, AppError> {
    match out {
        Ok(val) => {
            txn.commit().await?;
            Ok(val)
        }
        Err(err) => {
            txn.rollback().await;
            Err(err.into())
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewGame {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct NewPlayer {
    pub game_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub current_position: NodeId,
    pub tickets: Tickets,
}

#[derive(Clone, Debug)]
pub struct NewMove {
    pub game_id: i64,
    pub player_id: i64,
    pub turn_number: u32,
    pub from_position: NodeId,
    pub to_position: NodeId,
    pub ticket: Option<TicketKind>,
    pub revealed: bool,
}

/// Partial player update; `None` fields are left untouched.
#[derive(Clone, Debug)]
pub struct PlayerUpdate {
    pub game_id: i64,
    pub player_id: i64,
    pub current_position: Option<NodeId>,
    pub tickets: Option<Tickets>,
    pub is_active: Option<bool>,
}

impl PlayerUpdate {
    pub fn new(game_id: i64, player_id: i64) -> Self {
        Self {
            game_id,
            player_id,
            current_position: None,
            tickets: None,
            is_active: None,
        }
    }

    pub fn with_position(mut self, position: NodeId) -> Self {
        self.current_position = Some(position);
        self
    }

    pub fn with_tickets(mut self, tickets: Tickets) -> Self {
        self.tickets = Some(tickets);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }
}

/// Conditional game update, guarded by the turn counter the caller read.
#[derive(Clone, Debug)]
pub struct GameUpdate {
    pub game_id: i64,
    pub expected_turn: u32,
    pub expected_status: Option<GameStatus>,
    pub expected_roster_version: Option<u32>,
    pub bump_roster_version: bool,
    pub status: Option<GameStatus>,
    pub current_turn: Option<u32>,
    pub hidden_role_player_id: Option<i64>,
    pub winner: Option<Role>,
}

impl GameUpdate {
    pub fn new(game_id: i64, expected_turn: u32) -> Self {
        Self {
            game_id,
            expected_turn,
            expected_status: None,
            expected_roster_version: None,
            bump_roster_version: false,
            status: None,
            current_turn: None,
            hidden_role_player_id: None,
            winner: None,
        }
    }

    pub fn expect_status(mut self, status: GameStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Also require the roster to be unchanged since it was read.
    pub fn expect_roster_version(mut self, version: u32) -> Self {
        self.expected_roster_version = Some(version);
        self
    }

    /// Record a seat change; pair with `expect_roster_version`.
    pub fn bump_roster_version(mut self) -> Self {
        self.bump_roster_version = true;
        self
    }

    pub fn with_status(mut self, status: GameStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_current_turn(mut self, turn: u32) -> Self {
        self.current_turn = Some(turn);
        self
    }

    pub fn with_hidden_role_player(mut self, player_id: i64) -> Self {
        self.hidden_role_player_id = Some(player_id);
        self
    }

    pub fn with_winner(mut self, winner: Role) -> Self {
        self.winner = Some(winner);
        self
    }

    /// Whether `game` still satisfies the guard.
    pub fn matches(&self, game: &Game) -> bool {
        game.current_turn == self.expected_turn
            && self.expected_status.is_none_or(|status| status == game.status)
            && self
                .expected_roster_version
                .is_none_or(|version| version == game.roster_version)
    }

    /// Apply the set fields to `game`.
    pub fn apply(&self, game: &mut Game) {
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(turn) = self.current_turn {
            game.current_turn = turn;
        }
        if let Some(id) = self.hidden_role_player_id {
            game.hidden_role_player_id = Some(id);
        }
        if let Some(winner) = self.winner {
            game.winner = Some(winner);
        }
        if self.bump_roster_version {
            game.roster_version = game.roster_version.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn game(turn: u32, status: GameStatus) -> Game {
        Game {
            id: 1,
            name: "g".into(),
            status,
            current_turn: turn,
            hidden_role_player_id: None,
            winner: None,
            roster_version: 3,
            created_at: datetime!(2024-01-01 10:00 UTC),
        }
    }

    #[test]
    fn guard_checks_turn_and_optional_status() {
        let update = GameUpdate::new(1, 4).with_current_turn(5);
        assert!(update.matches(&game(4, GameStatus::InProgress)));
        assert!(!update.matches(&game(5, GameStatus::InProgress)));

        let update = GameUpdate::new(1, 0).expect_status(GameStatus::Waiting);
        assert!(update.matches(&game(0, GameStatus::Waiting)));
        assert!(!update.matches(&game(0, GameStatus::InProgress)));
    }

    #[test]
    fn roster_guard_rejects_a_changed_roster() {
        let update = GameUpdate::new(1, 0)
            .expect_status(GameStatus::Waiting)
            .expect_roster_version(3)
            .bump_roster_version();
        let mut g = game(0, GameStatus::Waiting);
        assert!(update.matches(&g));
        update.apply(&mut g);
        assert_eq!(g.roster_version, 4);
        assert!(!update.matches(&g));
    }

    #[test]
    fn apply_touches_only_set_fields() {
        let mut g = game(4, GameStatus::InProgress);
        GameUpdate::new(1, 4)
            .with_status(GameStatus::Finished)
            .with_winner(Role::Seeker)
            .apply(&mut g);
        assert_eq!(g.current_turn, 4);
        assert_eq!(g.status, GameStatus::Finished);
        assert_eq!(g.winner, Some(Role::Seeker));
    }
}
