//! Move commit protocol.
//!
//! A proposal is re-validated against freshly read state inside one store
//! transaction, in a fixed order: phase, move log consistency, membership,
//! turn, ticket role, ticket count, destination. Only then are the writes
//! staged: a pass row for each departed seat being skipped, the move row,
//! the mover's position and tickets, and the conditional turn advance.
//! Local UI gating is never trusted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::graph::{candidate_destinations, TransportGraph};
use crate::domain::model::{GameStatus, Move};
use crate::domain::reveal::move_is_revealed;
use crate::domain::tickets::debit;
use crate::domain::turns::{active_player, seat_to_act, Roster};
use crate::error::AppError;
use crate::errors::domain::{DomainError, NotFoundKind, ValidationKind};
use crate::services::move_flow::ProposedMove;
use crate::store::{finish_txn, GameStore, GameUpdate, NewMove, PlayerUpdate, StoreTxn};

pub struct MoveAcceptor {
    store: Arc<dyn GameStore>,
    graph: Arc<dyn TransportGraph>,
}

impl MoveAcceptor {
    pub fn new(store: Arc<dyn GameStore>, graph: Arc<dyn TransportGraph>) -> Self {
        Self { store, graph }
    }

    /// Commit one proposal. Every failure comes back as a boundary error;
    /// nothing is written unless all three writes land.
    pub async fn commit(&self, proposal: &ProposedMove) -> Result<Move, AppError> {
        debug!(
            game_id = proposal.game_id,
            player_id = proposal.player_id,
            ticket = proposal.ticket.as_str(),
            destination = proposal.destination,
            "Committing move"
        );

        let mut txn = self.store.begin().await?;
        let out = self.validate_and_stage(txn.as_mut(), proposal).await;
        let result = finish_txn(txn, out).await;

        match &result {
            Ok(mv) => info!(
                game_id = mv.game_id,
                player_id = mv.player_id,
                turn = mv.turn_number,
                revealed = mv.revealed,
                "Move accepted"
            ),
            Err(err) => warn!(
                game_id = proposal.game_id,
                player_id = proposal.player_id,
                code = %err.code(),
                detail = err.detail(),
                "Move rejected"
            ),
        }
        result
    }

    async fn validate_and_stage(
        &self,
        txn: &mut dyn StoreTxn,
        proposal: &ProposedMove,
    ) -> Result<Move, DomainError> {
        let game = txn.find_game(proposal.game_id).await?.ok_or_else(|| {
            DomainError::not_found(
                NotFoundKind::Game,
                format!("Game {} not found", proposal.game_id),
            )
        })?;

        if game.status != GameStatus::InProgress {
            return Err(DomainError::validation(
                ValidationKind::PhaseMismatch,
                format!("Game is {}, not in progress", game.status.as_str()),
            ));
        }

        let roster = Roster::new(txn.players_in_game(game.id).await?);
        let moves = txn.moves_in_game(game.id).await?;
        check_move_log(&moves, game.current_turn)?;

        if roster.get(proposal.player_id).is_some_and(|p| !p.is_active) {
            return Err(DomainError::validation(
                ValidationKind::NotAMember,
                format!("Player {} has left the game", proposal.player_id),
            ));
        }
        let (turn, mover) = seat_to_act(&roster, game.current_turn)?;
        if mover.id != proposal.player_id {
            return Err(DomainError::validation(
                ValidationKind::OutOfTurn,
                format!("Turn {turn} belongs to player {}", mover.id),
            ));
        }

        if !proposal.ticket.usable_by(mover.role) {
            return Err(DomainError::validation(
                ValidationKind::TicketNotAllowed,
                format!(
                    "{} tickets are reserved for the evader",
                    proposal.ticket.as_str()
                ),
            ));
        }
        let tickets = debit(&mover.tickets, proposal.ticket)?;

        let reachable =
            candidate_destinations(self.graph.as_ref(), mover.current_position, proposal.ticket);
        if !reachable.contains(&proposal.destination) {
            return Err(DomainError::validation(
                ValidationKind::IllegalDestination,
                format!(
                    "Node {} is not reachable from {} by {}",
                    proposal.destination,
                    mover.current_position,
                    proposal.ticket.as_str()
                ),
            ));
        }

        let next_turn = turn
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("turn counter overflow"))?;

        // Departed seats between the counter and the mover keep the log dense
        for passed in game.current_turn..turn {
            let seat = active_player(&roster, passed)?;
            txn.insert_move(NewMove {
                game_id: game.id,
                player_id: seat.id,
                turn_number: passed,
                from_position: seat.current_position,
                to_position: seat.current_position,
                ticket: None,
                revealed: false,
            })
            .await?;
            debug!(game_id = game.id, player_id = seat.id, turn = passed, "Passed departed seat");
        }

        let mv = txn
            .insert_move(NewMove {
                game_id: game.id,
                player_id: mover.id,
                turn_number: turn,
                from_position: mover.current_position,
                to_position: proposal.destination,
                ticket: Some(proposal.ticket),
                revealed: move_is_revealed(turn, mover.role),
            })
            .await?;

        txn.update_player(
            PlayerUpdate::new(game.id, mover.id)
                .with_position(proposal.destination)
                .with_tickets(tickets),
        )
        .await?;

        txn.update_game(
            GameUpdate::new(game.id, game.current_turn)
                .expect_status(GameStatus::InProgress)
                .expect_roster_version(game.roster_version)
                .with_current_turn(next_turn),
        )
        .await?;

        Ok(mv)
    }
}

/// The move log must read `0, 1, .., current_turn - 1` with no gaps.
fn check_move_log(moves: &[Move], current_turn: u32) -> Result<(), DomainError> {
    for (expected, mv) in (0u32..).zip(moves) {
        if mv.turn_number != expected {
            return Err(DomainError::invariant(format!(
                "move log gap: expected turn {expected}, found {}",
                mv.turn_number
            )));
        }
    }
    if moves.len() as u64 != u64::from(current_turn) {
        return Err(DomainError::invariant(format!(
            "game is at turn {current_turn} but the move log holds {} moves",
            moves.len()
        )));
    }
    Ok(())
}
