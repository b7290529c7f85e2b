//! SeaORM-backed store.
//!
//! One `StoreTxn` is one database transaction. The conditional game update is
//! an `UPDATE ... WHERE id = $1 AND current_turn = $2` (plus status and
//! roster version when asked); zero rows affected means another writer
//! changed the game first. The unique index on `moves (game_id, turn_number)`
//! backs it up.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{
    GameStore, GameUpdate, NewGame, NewMove, NewPlayer, PlayerUpdate, StoreError, StoreTxn,
};
use crate::domain::graph::NodeId;
use crate::domain::model::{Game, GameStatus, Move, Player, Role};
use crate::domain::tickets::{TicketKind, Tickets};
use crate::entities::{games, moves, players};
use crate::realtime::{ChangeEntity, ChangeEvent, ChangeOp, ChangePublisher};

pub struct SeaStore {
    connection: DatabaseConnection,
    publisher: Option<Arc<dyn ChangePublisher>>,
}

impl SeaStore {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self {
            connection,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ChangePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

pub struct SeaTxn {
    txn: DatabaseTransaction,
    publisher: Option<Arc<dyn ChangePublisher>>,
    events: Vec<ChangeEvent>,
}

#[async_trait]
impl GameStore for SeaStore {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError> {
        let txn = self.connection.begin().await?;
        Ok(Box::new(SeaTxn {
            txn,
            publisher: self.publisher.clone(),
            events: Vec::new(),
        }))
    }
}

impl SeaTxn {
    fn record(&mut self, game_id: i64, entity: ChangeEntity, op: ChangeOp) {
        let event = ChangeEvent::new(game_id, entity, op);
        if self.events.last() != Some(&event) {
            self.events.push(event);
        }
    }
}

#[async_trait]
impl StoreTxn for SeaTxn {
    async fn find_game(&mut self, game_id: i64) -> Result<Option<Game>, StoreError> {
        games::Entity::find_by_id(game_id)
            .one(&self.txn)
            .await?
            .map(game_from_row)
            .transpose()
    }

    async fn players_in_game(&mut self, game_id: i64) -> Result<Vec<Player>, StoreError> {
        players::Entity::find()
            .filter(players::Column::GameId.eq(game_id))
            .all(&self.txn)
            .await?
            .into_iter()
            .map(player_from_row)
            .collect()
    }

    async fn moves_in_game(&mut self, game_id: i64) -> Result<Vec<Move>, StoreError> {
        moves::Entity::find()
            .filter(moves::Column::GameId.eq(game_id))
            .order_by_asc(moves::Column::TurnNumber)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(move_from_row)
            .collect()
    }

    async fn insert_game(&mut self, game: NewGame) -> Result<Game, StoreError> {
        let now = OffsetDateTime::now_utc();
        let row = games::ActiveModel {
            id: NotSet,
            name: Set(game.name),
            status: Set(games::GameStatus::Waiting),
            current_turn: Set(0),
            hidden_role_player_id: Set(None),
            winner: Set(None),
            roster_version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.txn)
        .await?;
        self.record(row.id, ChangeEntity::Game, ChangeOp::Insert);
        game_from_row(row)
    }

    async fn insert_player(&mut self, player: NewPlayer) -> Result<Player, StoreError> {
        let row = players::ActiveModel {
            id: NotSet,
            game_id: Set(player.game_id),
            user_id: Set(player.user_id),
            role: Set(role_to_db(player.role)),
            current_position: Set(node_to_db(player.current_position)?),
            is_active: Set(true),
            taxi_tickets: Set(count_to_db(player.tickets.taxi)?),
            bus_tickets: Set(count_to_db(player.tickets.bus)?),
            underground_tickets: Set(count_to_db(player.tickets.underground)?),
            special_tickets: Set(count_to_db(player.tickets.special)?),
            joined_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(&self.txn)
        .await?;
        self.record(row.game_id, ChangeEntity::Player, ChangeOp::Insert);
        player_from_row(row)
    }

    async fn insert_move(&mut self, mv: NewMove) -> Result<Move, StoreError> {
        let turn_number = mv.turn_number;
        let result = moves::ActiveModel {
            id: NotSet,
            game_id: Set(mv.game_id),
            player_id: Set(mv.player_id),
            turn_number: Set(count_to_db(turn_number)?),
            from_position: Set(node_to_db(mv.from_position)?),
            to_position: Set(node_to_db(mv.to_position)?),
            ticket: Set(mv.ticket.map(ticket_to_db)),
            revealed: Set(mv.revealed),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(&self.txn)
        .await;

        let row = match result.map_err(StoreError::from) {
            Ok(row) => row,
            Err(StoreError::Duplicate(_)) => {
                return Err(StoreError::Conflict {
                    expected_turn: turn_number,
                    actual_turn: None,
                })
            }
            Err(e) => return Err(e),
        };
        self.record(row.game_id, ChangeEntity::Move, ChangeOp::Insert);
        move_from_row(row)
    }

    async fn update_player(&mut self, update: PlayerUpdate) -> Result<(), StoreError> {
        let mut query = players::Entity::update_many()
            .filter(players::Column::Id.eq(update.player_id))
            .filter(players::Column::GameId.eq(update.game_id));
        if let Some(pos) = update.current_position {
            query = query.col_expr(players::Column::CurrentPosition, Expr::val(node_to_db(pos)?).into());
        }
        if let Some(t) = update.tickets {
            query = query
                .col_expr(players::Column::TaxiTickets, Expr::val(count_to_db(t.taxi)?).into())
                .col_expr(players::Column::BusTickets, Expr::val(count_to_db(t.bus)?).into())
                .col_expr(
                    players::Column::UndergroundTickets,
                    Expr::val(count_to_db(t.underground)?).into(),
                )
                .col_expr(
                    players::Column::SpecialTickets,
                    Expr::val(count_to_db(t.special)?).into(),
                );
        }
        if let Some(active) = update.is_active {
            query = query.col_expr(players::Column::IsActive, Expr::val(active).into());
        }

        let result = query.exec(&self.txn).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("player {}", update.player_id)));
        }
        self.record(update.game_id, ChangeEntity::Player, ChangeOp::Update);
        Ok(())
    }

    async fn delete_player(&mut self, game_id: i64, player_id: i64) -> Result<(), StoreError> {
        let result = players::Entity::delete_many()
            .filter(players::Column::Id.eq(player_id))
            .filter(players::Column::GameId.eq(game_id))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("player {player_id}")));
        }
        self.record(game_id, ChangeEntity::Player, ChangeOp::Delete);
        Ok(())
    }

    async fn update_game(&mut self, update: GameUpdate) -> Result<(), StoreError> {
        let expected_turn = count_to_db(update.expected_turn)?;
        let mut query = games::Entity::update_many()
            .col_expr(
                games::Column::UpdatedAt,
                Expr::val(OffsetDateTime::now_utc()).into(),
            )
            .filter(games::Column::Id.eq(update.game_id))
            .filter(games::Column::CurrentTurn.eq(expected_turn));

        if let Some(status) = update.expected_status {
            query = query.filter(games::Column::Status.eq(status_to_db(status)));
        }
        if let Some(version) = update.expected_roster_version {
            query = query.filter(games::Column::RosterVersion.eq(count_to_db(version)?));
        }
        if update.bump_roster_version {
            query = query.col_expr(
                games::Column::RosterVersion,
                Expr::col(games::Column::RosterVersion).add(1),
            );
        }
        if let Some(status) = update.status {
            query = query.col_expr(
                games::Column::Status,
                Expr::val(status_to_db(status)).cast_as(Alias::new("game_status")),
            );
        }
        if let Some(turn) = update.current_turn {
            query = query.col_expr(games::Column::CurrentTurn, Expr::val(count_to_db(turn)?).into());
        }
        if let Some(player_id) = update.hidden_role_player_id {
            query = query.col_expr(
                games::Column::HiddenRolePlayerId,
                Expr::val(Some(player_id)).into(),
            );
        }
        if let Some(winner) = update.winner {
            query = query.col_expr(
                games::Column::Winner,
                Expr::val(role_to_db(winner)).cast_as(Alias::new("player_role")),
            );
        }

        let result = query.exec(&self.txn).await?;
        if result.rows_affected == 0 {
            // Distinguish a missing game from a lost race
            let current = games::Entity::find_by_id(update.game_id)
                .one(&self.txn)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("game {}", update.game_id)))?;
            return Err(StoreError::Conflict {
                expected_turn: update.expected_turn,
                actual_turn: u32::try_from(current.current_turn).ok(),
            });
        }
        self.record(update.game_id, ChangeEntity::Game, ChangeOp::Update);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let SeaTxn {
            txn,
            publisher,
            events,
        } = *self;
        txn.commit().await?;
        debug!(events = events.len(), "Database transaction committed");

        if let Some(publisher) = publisher {
            for event in events {
                if let Err(err) = publisher.publish(event).await {
                    warn!(game_id = event.game_id, error = %err, "Change notification failed");
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        if let Err(err) = self.txn.rollback().await {
            warn!(error = %err, "Rollback failed");
        }
    }
}

fn node_to_db(node: NodeId) -> Result<i32, StoreError> {
    i32::try_from(node).map_err(|_| StoreError::Corrupt(format!("node {node} out of range")))
}

fn count_to_db(n: u32) -> Result<i32, StoreError> {
    i32::try_from(n).map_err(|_| StoreError::Corrupt(format!("counter {n} out of range")))
}

fn from_db(column: &str, v: i32) -> Result<u32, StoreError> {
    u32::try_from(v).map_err(|_| StoreError::Corrupt(format!("negative {column}: {v}")))
}

fn status_to_db(status: GameStatus) -> games::GameStatus {
    match status {
        GameStatus::Waiting => games::GameStatus::Waiting,
        GameStatus::InProgress => games::GameStatus::InProgress,
        GameStatus::Finished => games::GameStatus::Finished,
    }
}

fn status_from_db(status: games::GameStatus) -> GameStatus {
    match status {
        games::GameStatus::Waiting => GameStatus::Waiting,
        games::GameStatus::InProgress => GameStatus::InProgress,
        games::GameStatus::Finished => GameStatus::Finished,
    }
}

fn role_to_db(role: Role) -> games::PlayerRole {
    match role {
        Role::Seeker => games::PlayerRole::Seeker,
        Role::Evader => games::PlayerRole::Evader,
    }
}

fn role_from_db(role: games::PlayerRole) -> Role {
    match role {
        games::PlayerRole::Seeker => Role::Seeker,
        games::PlayerRole::Evader => Role::Evader,
    }
}

fn ticket_to_db(kind: TicketKind) -> moves::TicketKind {
    match kind {
        TicketKind::Taxi => moves::TicketKind::Taxi,
        TicketKind::Bus => moves::TicketKind::Bus,
        TicketKind::Underground => moves::TicketKind::Underground,
        TicketKind::Special => moves::TicketKind::Special,
    }
}

fn ticket_from_db(kind: moves::TicketKind) -> TicketKind {
    match kind {
        moves::TicketKind::Taxi => TicketKind::Taxi,
        moves::TicketKind::Bus => TicketKind::Bus,
        moves::TicketKind::Underground => TicketKind::Underground,
        moves::TicketKind::Special => TicketKind::Special,
    }
}

fn game_from_row(row: games::Model) -> Result<Game, StoreError> {
    Ok(Game {
        id: row.id,
        name: row.name,
        status: status_from_db(row.status),
        current_turn: from_db("current_turn", row.current_turn)?,
        hidden_role_player_id: row.hidden_role_player_id,
        winner: row.winner.map(role_from_db),
        roster_version: from_db("roster_version", row.roster_version)?,
        created_at: row.created_at,
    })
}

fn player_from_row(row: players::Model) -> Result<Player, StoreError> {
    Ok(Player {
        id: row.id,
        game_id: row.game_id,
        user_id: row.user_id,
        role: role_from_db(row.role),
        current_position: from_db("current_position", row.current_position)?,
        is_active: row.is_active,
        tickets: Tickets::new(
            from_db("taxi_tickets", row.taxi_tickets)?,
            from_db("bus_tickets", row.bus_tickets)?,
            from_db("underground_tickets", row.underground_tickets)?,
            from_db("special_tickets", row.special_tickets)?,
        ),
        joined_at: row.joined_at,
    })
}

fn move_from_row(row: moves::Model) -> Result<Move, StoreError> {
    Ok(Move {
        id: row.id,
        game_id: row.game_id,
        player_id: row.player_id,
        turn_number: from_db("turn_number", row.turn_number)?,
        from_position: from_db("from_position", row.from_position)?,
        to_position: from_db("to_position", row.to_position)?,
        ticket: row.ticket.map(ticket_from_db),
        revealed: row.revealed,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn negative_counters_are_corrupt() {
        let row = players::Model {
            id: 1,
            game_id: 1,
            user_id: 1,
            role: games::PlayerRole::Seeker,
            current_position: 12,
            is_active: true,
            taxi_tickets: -1,
            bus_tickets: 0,
            underground_tickets: 0,
            special_tickets: 0,
            joined_at: datetime!(2024-01-01 10:00 UTC),
        };
        assert!(matches!(player_from_row(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn enums_map_both_ways() {
        for status in [GameStatus::Waiting, GameStatus::InProgress, GameStatus::Finished] {
            assert_eq!(status_from_db(status_to_db(status)), status);
        }
        for kind in TicketKind::ALL {
            assert_eq!(ticket_from_db(ticket_to_db(kind)), kind);
        }
        assert_eq!(role_from_db(role_to_db(Role::Evader)), Role::Evader);
    }
}
