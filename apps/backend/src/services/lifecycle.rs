//! Game lifecycle: create, join, start, leave, finish.
//!
//! Each operation runs in one store transaction and guards the game row with
//! a conditional update. Seat changes also expect and bump the roster
//! version, so two of them (or a seat change and a start) on the same game
//! cannot both commit from the same read.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::config::rules::GameRules;
use crate::domain::graph::NodeId;
use crate::domain::model::{Game, GameStatus, Player, Role};
use crate::domain::turns::Roster;
use crate::error::AppError;
use crate::errors::domain::{ConflictKind, DomainError, NotFoundKind, ValidationKind};
use crate::store::{
    finish_txn, GameStore, GameUpdate, NewGame, NewPlayer, PlayerUpdate, StoreError, StoreTxn,
};

pub struct GameLifecycle {
    store: Arc<dyn GameStore>,
    rules: Arc<GameRules>,
}

impl GameLifecycle {
    pub fn new(store: Arc<dyn GameStore>, rules: Arc<GameRules>) -> Self {
        Self { store, rules }
    }

    /// Create a waiting game with its creator seated as the evader.
    pub async fn create_game(
        &self,
        name: &str,
        creator_user_id: i64,
    ) -> Result<(Game, Player), AppError> {
        let mut txn = self.store.begin().await?;
        let out = self.create_in(txn.as_mut(), name, creator_user_id).await;
        let (game, player) = finish_txn(txn, out).await?;
        info!(game_id = game.id, user_id = creator_user_id, "Game created");
        Ok((game, player))
    }

    async fn create_in(
        &self,
        txn: &mut dyn StoreTxn,
        name: &str,
        creator_user_id: i64,
    ) -> Result<(Game, Player), DomainError> {
        let mut game = txn
            .insert_game(NewGame {
                name: name.to_owned(),
            })
            .await?;
        let start = pick_start(&self.rules.start_nodes, &[]).ok_or_else(|| {
            DomainError::validation(ValidationKind::GameFull, "No start positions configured")
        })?;
        let evader = txn
            .insert_player(NewPlayer {
                game_id: game.id,
                user_id: creator_user_id,
                role: Role::Evader,
                current_position: start,
                tickets: self.rules.allotment(Role::Evader),
            })
            .await?;
        txn.update_game(
            GameUpdate::new(game.id, 0)
                .expect_status(GameStatus::Waiting)
                .with_hidden_role_player(evader.id),
        )
        .await?;
        game.hidden_role_player_id = Some(evader.id);
        Ok((game, evader))
    }

    /// Seat `user_id` as a seeker in a waiting game.
    pub async fn join_game(&self, game_id: i64, user_id: i64) -> Result<Player, AppError> {
        let mut txn = self.store.begin().await?;
        let out = self.join_in(txn.as_mut(), game_id, user_id).await;
        let player = finish_txn(txn, out).await?;
        info!(game_id, user_id, player_id = player.id, "Player joined");
        Ok(player)
    }

    async fn join_in(
        &self,
        txn: &mut dyn StoreTxn,
        game_id: i64,
        user_id: i64,
    ) -> Result<Player, DomainError> {
        let game = require_game(txn, game_id).await?;
        require_status(&game, GameStatus::Waiting)?;

        let players = txn.players_in_game(game_id).await?;
        if players.iter().any(|p| p.user_id == user_id) {
            return Err(already_joined(user_id, game_id));
        }
        if players.len() >= self.rules.max_players {
            return Err(DomainError::validation(
                ValidationKind::GameFull,
                format!("Game {game_id} already has {} players", players.len()),
            ));
        }

        let taken: Vec<NodeId> = players.iter().map(|p| p.current_position).collect();
        let start = pick_start(&self.rules.start_nodes, &taken).ok_or_else(|| {
            DomainError::validation(ValidationKind::GameFull, "No free start position left")
        })?;

        let player = txn
            .insert_player(NewPlayer {
                game_id,
                user_id,
                role: Role::Seeker,
                current_position: start,
                tickets: self.rules.allotment(Role::Seeker),
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => already_joined(user_id, game_id),
                other => other.into(),
            })?;

        txn.update_game(
            GameUpdate::new(game_id, game.current_turn)
                .expect_status(GameStatus::Waiting)
                .expect_roster_version(game.roster_version)
                .bump_roster_version(),
        )
        .await?;
        Ok(player)
    }

    /// Waiting -> InProgress. Only the hidden-role player may start, and only
    /// with enough players seated.
    pub async fn start_game(&self, game_id: i64, requester_user_id: i64) -> Result<Game, AppError> {
        let mut txn = self.store.begin().await?;
        let out = self.start_in(txn.as_mut(), game_id, requester_user_id).await;
        let game = finish_txn(txn, out).await?;
        info!(game_id, "Game started");
        Ok(game)
    }

    async fn start_in(
        &self,
        txn: &mut dyn StoreTxn,
        game_id: i64,
        requester_user_id: i64,
    ) -> Result<Game, DomainError> {
        let mut game = require_game(txn, game_id).await?;
        require_status(&game, GameStatus::Waiting)?;

        let roster = Roster::new(txn.players_in_game(game_id).await?);
        let requester = roster
            .by_user(requester_user_id)
            .ok_or_else(|| not_a_member(requester_user_id, game_id))?;
        if game.hidden_role_player_id != Some(requester.id) {
            return Err(DomainError::validation(
                ValidationKind::NotHiddenRolePlayer,
                "Only the hidden-role player can start the game",
            ));
        }
        if roster.len() < self.rules.min_players {
            return Err(DomainError::validation(
                ValidationKind::NotEnoughPlayers,
                format!(
                    "{} players seated, {} required",
                    roster.len(),
                    self.rules.min_players
                ),
            ));
        }
        let evaders = roster.players().iter().filter(|p| p.is_evader()).count();
        if evaders != 1 {
            return Err(DomainError::invariant(format!(
                "game {game_id} has {evaders} evaders"
            )));
        }

        // The seat count checked above must still hold at commit
        txn.update_game(
            GameUpdate::new(game_id, game.current_turn)
                .expect_status(GameStatus::Waiting)
                .expect_roster_version(game.roster_version)
                .with_status(GameStatus::InProgress),
        )
        .await?;
        game.status = GameStatus::InProgress;
        Ok(game)
    }

    /// Leave a game. A waiting seat is released; an in-progress player is
    /// only marked inactive so roster order never changes mid-game.
    ///
    /// Leaving mid-game ends it when the other side can no longer play: the
    /// evader leaving hands the win to the seekers, the last active seeker
    /// leaving hands it to the evader.
    pub async fn leave_game(&self, game_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut txn = self.store.begin().await?;
        let out = self.leave_in(txn.as_mut(), game_id, user_id).await;
        let winner = finish_txn(txn, out).await?;
        info!(game_id, user_id, "Player left");
        if let Some(winner) = winner {
            info!(game_id, winner = ?winner, "Game finished by departure");
        }
        Ok(())
    }

    /// Returns the winner when the departure finished the game.
    async fn leave_in(
        &self,
        txn: &mut dyn StoreTxn,
        game_id: i64,
        user_id: i64,
    ) -> Result<Option<Role>, DomainError> {
        let game = require_game(txn, game_id).await?;
        let players = txn.players_in_game(game_id).await?;
        let player = players
            .iter()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| not_a_member(user_id, game_id))?;

        let seat_change = GameUpdate::new(game_id, game.current_turn)
            .expect_status(game.status)
            .expect_roster_version(game.roster_version)
            .bump_roster_version();

        match game.status {
            GameStatus::Waiting => {
                if game.hidden_role_player_id == Some(player.id) {
                    return Err(DomainError::validation_other(
                        "The hidden-role player cannot leave a waiting game",
                    ));
                }
                txn.delete_player(game_id, player.id).await?;
                txn.update_game(seat_change).await?;
                Ok(None)
            }
            GameStatus::InProgress => {
                if !player.is_active {
                    debug!(game_id, user_id, "Player already inactive");
                    return Ok(None);
                }
                txn.update_player(PlayerUpdate::new(game_id, player.id).with_active(false))
                    .await?;

                let winner = departure_winner(&players, player);
                let update = match winner {
                    Some(winner) => seat_change
                        .with_status(GameStatus::Finished)
                        .with_winner(winner),
                    None => seat_change,
                };
                txn.update_game(update).await?;
                Ok(winner)
            }
            GameStatus::Finished => Err(DomainError::validation(
                ValidationKind::PhaseMismatch,
                "Game is already finished",
            )),
        }
    }

    /// InProgress -> Finished, recording the winner. Called by whatever
    /// detects the end of the game.
    pub async fn finish_game(&self, game_id: i64, winner: Role) -> Result<Game, AppError> {
        let mut txn = self.store.begin().await?;
        let out = self.finish_in(txn.as_mut(), game_id, winner).await;
        let game = finish_txn(txn, out).await?;
        info!(game_id, winner = ?winner, "Game finished");
        Ok(game)
    }

    async fn finish_in(
        &self,
        txn: &mut dyn StoreTxn,
        game_id: i64,
        winner: Role,
    ) -> Result<Game, DomainError> {
        let mut game = require_game(txn, game_id).await?;
        require_status(&game, GameStatus::InProgress)?;
        txn.update_game(
            GameUpdate::new(game_id, game.current_turn)
                .expect_status(GameStatus::InProgress)
                .with_status(GameStatus::Finished)
                .with_winner(winner),
        )
        .await?;
        game.status = GameStatus::Finished;
        game.winner = Some(winner);
        Ok(game)
    }
}

async fn require_game(txn: &mut dyn StoreTxn, game_id: i64) -> Result<Game, DomainError> {
    txn.find_game(game_id)
        .await?
        .ok_or_else(|| DomainError::not_found(NotFoundKind::Game, format!("Game {game_id} not found")))
}

fn require_status(game: &Game, expected: GameStatus) -> Result<(), DomainError> {
    if game.status != expected {
        return Err(DomainError::validation(
            ValidationKind::PhaseMismatch,
            format!(
                "Game {} is {}, expected {}",
                game.id,
                game.status.as_str(),
                expected.as_str()
            ),
        ));
    }
    Ok(())
}

fn already_joined(user_id: i64, game_id: i64) -> DomainError {
    DomainError::conflict(
        ConflictKind::AlreadyJoined,
        format!("User {user_id} already joined game {game_id}"),
    )
}

fn not_a_member(user_id: i64, game_id: i64) -> DomainError {
    DomainError::validation(
        ValidationKind::NotAMember,
        format!("User {user_id} is not seated in game {game_id}"),
    )
}

/// Winning side once `leaving` drops out, or `None` while both sides still
/// have an active player.
fn departure_winner(players: &[Player], leaving: &Player) -> Option<Role> {
    if leaving.is_evader() {
        return Some(Role::Seeker);
    }
    let seekers_left = players
        .iter()
        .any(|p| p.id != leaving.id && p.is_active && !p.is_evader());
    (!seekers_left).then_some(Role::Evader)
}

/// Random start node not already occupied.
fn pick_start(start_nodes: &[NodeId], taken: &[NodeId]) -> Option<NodeId> {
    let free: Vec<NodeId> = start_nodes
        .iter()
        .copied()
        .filter(|n| !taken.contains(n))
        .collect();
    free.choose(&mut rand::rng()).copied()
}
