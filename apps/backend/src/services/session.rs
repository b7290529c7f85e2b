//! Per-client game session.
//!
//! A session subscribes to change notifications for one game and, on every
//! signal, re-reads the whole game in one read transaction and rebuilds its
//! `SessionView` from scratch. Notification payloads are never applied.
//! Player actions go through the move state machine and the commit
//! protocol; the view is refreshed after every attempt, accepted or not.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::graph::NodeId;
use crate::domain::model::Move;
use crate::domain::tickets::TicketKind;
use crate::domain::turns::Roster;
use crate::domain::view::{derive_view, GameSnapshot, SessionView};
use crate::error::AppError;
use crate::errors::domain::{DomainError, NotFoundKind};
use crate::errors::ErrorCode;
use crate::realtime::Subscription;
use crate::services::lifecycle::GameLifecycle;
use crate::services::move_acceptor::MoveAcceptor;
use crate::services::move_flow::MoveFlow;
use crate::state::AppState;
use crate::store::{GameStore, StoreTxn};

/// Read game, roster and move log in one transaction.
pub async fn load_snapshot(store: &dyn GameStore, game_id: i64) -> Result<GameSnapshot, AppError> {
    let mut txn = store.begin().await?;
    let out = read_snapshot(txn.as_mut(), game_id).await;
    txn.rollback().await;
    Ok(out?)
}

async fn read_snapshot(
    txn: &mut dyn StoreTxn,
    game_id: i64,
) -> Result<GameSnapshot, DomainError> {
    let game = txn.find_game(game_id).await?.ok_or_else(|| {
        DomainError::not_found(NotFoundKind::Game, format!("Game {game_id} not found"))
    })?;
    let roster = Roster::new(txn.players_in_game(game_id).await?);
    let moves = txn.moves_in_game(game_id).await?;
    Ok(GameSnapshot {
        game,
        roster,
        moves,
    })
}

pub struct GameSession {
    state: AppState,
    game_id: i64,
    viewer_user_id: i64,
    subscription: Subscription,
    acceptor: MoveAcceptor,
    lifecycle: GameLifecycle,
    flow: MoveFlow,
    view_tx: watch::Sender<Option<Arc<SessionView>>>,
    halted: Option<AppError>,
}

impl GameSession {
    /// Subscribe first, then load, so no change between the two is missed.
    pub async fn open(
        state: AppState,
        game_id: i64,
        viewer_user_id: i64,
    ) -> Result<Self, AppError> {
        let subscription = state.hub.subscribe(game_id);
        let (view_tx, _) = watch::channel(None);
        let mut session = Self {
            acceptor: MoveAcceptor::new(Arc::clone(&state.store), Arc::clone(&state.graph)),
            lifecycle: GameLifecycle::new(Arc::clone(&state.store), Arc::clone(&state.rules)),
            state,
            game_id,
            viewer_user_id,
            subscription,
            flow: MoveFlow::Idle,
            view_tx,
            halted: None,
        };
        session.refresh().await?;
        info!(game_id, user_id = viewer_user_id, "Game session opened");
        Ok(session)
    }

    pub fn game_id(&self) -> i64 {
        self.game_id
    }

    /// Latest derived view.
    pub fn view(&self) -> Option<Arc<SessionView>> {
        self.view_tx.borrow().clone()
    }

    /// Receiver that observes every replacement of the view.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<SessionView>>> {
        self.view_tx.subscribe()
    }

    pub fn flow(&self) -> &MoveFlow {
        &self.flow
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Re-read everything and replace the view wholesale.
    pub async fn refresh(&mut self) -> Result<Arc<SessionView>, AppError> {
        let snapshot = load_snapshot(self.state.store.as_ref(), self.game_id).await?;
        let view = match derive_view(&snapshot, self.viewer_user_id, self.state.graph.as_ref()) {
            Ok(view) => Arc::new(view),
            Err(err) => {
                let err = AppError::from(err);
                self.halt(&err);
                return Err(err);
            }
        };

        self.reconcile_flow(&view);
        self.view_tx.send_replace(Some(Arc::clone(&view)));
        debug!(
            game_id = self.game_id,
            turn = view.current_turn,
            status = view.status.as_str(),
            "Session view refreshed"
        );
        Ok(view)
    }

    /// Wait for the next invalidation, fold any queued behind it into one,
    /// and refresh. `Ok(None)` once the notification source is gone.
    pub async fn process_next_invalidation(&mut self) -> Result<Option<Arc<SessionView>>, AppError> {
        let Some(event) = self.subscription.recv().await else {
            return Ok(None);
        };
        let coalesced = self.subscription.drain();
        debug!(
            game_id = self.game_id,
            entity = ?event.entity,
            op = ?event.op,
            coalesced,
            "Invalidation received"
        );
        self.refresh().await.map(Some)
    }

    /// Keep the view current until cancelled or halted.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.process_next_invalidation() => next,
            };
            match next {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(game_id = self.game_id, "Change notifications closed");
                    break;
                }
                Err(err) if err.is_fatal() => {
                    error!(game_id = self.game_id, error = %err, "Session halted");
                    break;
                }
                Err(err) => {
                    warn!(game_id = self.game_id, error = %err, "Refresh failed; waiting for next change");
                }
            }
        }
    }

    /// Choose a ticket. Returns the destinations it offers.
    pub fn select_transport(&mut self, ticket: TicketKind) -> Result<BTreeSet<NodeId>, AppError> {
        self.ensure_live()?;
        let view = self.require_view()?;
        if !view.is_my_turn {
            return Err(AppError::not_your_turn("It is not your turn"));
        }
        let candidates = view
            .candidates_for(ticket)
            .cloned()
            .ok_or_else(|| {
                AppError::insufficient_tickets(format!("No {} tickets left", ticket.as_str()))
            })?;
        self.flow.select_transport(ticket, candidates.clone())?;
        Ok(candidates)
    }

    /// Choose a destination and run the commit protocol.
    ///
    /// Afterwards the view is refreshed and, when the rejection allows it,
    /// the ticket selection is restored against the fresh candidates.
    pub async fn select_destination(&mut self, destination: NodeId) -> Result<Move, AppError> {
        self.ensure_live()?;
        let player_id = self
            .require_view()?
            .viewer_player_id
            .ok_or_else(|| AppError::invalid(ErrorCode::NotAMember, "You are not seated in this game"))?;

        let proposal = self
            .flow
            .select_destination(self.game_id, player_id, destination)?;

        let outcome = self.acceptor.commit(&proposal).await;
        if let Err(err) = self.flow.resolve(outcome.clone()) {
            let err = AppError::from(err);
            self.halt(&err);
            return Err(err);
        }
        if let Err(err) = &outcome {
            if err.is_fatal() {
                self.halt(err);
            }
        }

        let restore = self.flow.acknowledge();
        if let Err(err) = self.refresh().await {
            warn!(game_id = self.game_id, error = %err, "Refresh after commit failed");
        }
        if let Some(ticket) = restore {
            match self.view() {
                Some(view) => self.reselect(ticket, &view),
                None => self.flow = MoveFlow::Idle,
            }
        }
        outcome
    }

    /// Start the game (hidden-role player only).
    pub async fn start_game(&mut self) -> Result<Arc<SessionView>, AppError> {
        self.lifecycle
            .start_game(self.game_id, self.viewer_user_id)
            .await?;
        self.refresh().await
    }

    /// Leave the game and drop any pending selection.
    pub async fn leave_game(&mut self) -> Result<Arc<SessionView>, AppError> {
        if self.flow.is_awaiting_commit() {
            return Err(AppError::invalid(
                ErrorCode::MoveInFlight,
                "A move is awaiting commit",
            ));
        }
        self.lifecycle
            .leave_game(self.game_id, self.viewer_user_id)
            .await?;
        self.flow = MoveFlow::Idle;
        self.refresh().await
    }

    fn ensure_live(&self) -> Result<(), AppError> {
        match &self.halted {
            Some(cause) => Err(AppError::session_halted(format!(
                "Move submission stopped after: {}",
                cause.detail()
            ))),
            None => Ok(()),
        }
    }

    fn require_view(&self) -> Result<Arc<SessionView>, AppError> {
        self.view()
            .ok_or_else(|| AppError::internal("session has no view yet"))
    }

    fn halt(&mut self, cause: &AppError) {
        if self.halted.is_none() {
            error!(
                game_id = self.game_id,
                user_id = self.viewer_user_id,
                error = %cause,
                "Invariant violated; halting move submission"
            );
            self.halted = Some(cause.clone());
        }
        self.flow = MoveFlow::Idle;
    }

    /// Re-derive a pending ticket selection from the fresh view.
    fn reconcile_flow(&mut self, view: &SessionView) {
        if let Some(ticket) = self.flow.selected_ticket() {
            self.reselect(ticket, view);
        }
    }

    /// Keep `ticket` selected while it is still the viewer's turn, offering
    /// its fresh candidates (none once the ticket has run out).
    fn reselect(&mut self, ticket: TicketKind, view: &SessionView) {
        if self.is_halted() || !view.is_my_turn {
            self.flow = MoveFlow::Idle;
            return;
        }
        let candidates = view.candidates_for(ticket).cloned().unwrap_or_default();
        if let Err(err) = self.flow.select_transport(ticket, candidates) {
            debug!(error = %err, "Selection not re-derived");
            self.flow = MoveFlow::Idle;
        }
    }
}
