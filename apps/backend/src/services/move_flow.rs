//! Client-side move state machine.
//!
//! ```text
//! Idle ──select_transport──▶ SelectingTransport ──select_destination──▶ AwaitingCommit
//!  ▲                              │  ▲                                        │
//!  │                              └──┘ (change ticket)                     resolve
//!  │                                                                          ▼
//!  └────────────── acknowledge ◀──────────────── Committed | Rejected ◀───────┘
//! ```
//!
//! Entering `AwaitingCommit` consumes the selection, so a second proposal
//! cannot be produced while the first is in flight.

use std::collections::BTreeSet;

use crate::domain::graph::NodeId;
use crate::domain::model::Move;
use crate::domain::tickets::TicketKind;
use crate::error::AppError;
use crate::errors::domain::{DomainError, ValidationKind};

/// Player intent handed to the commit protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedMove {
    pub game_id: i64,
    pub player_id: i64,
    pub ticket: TicketKind,
    pub destination: NodeId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MoveFlow {
    #[default]
    Idle,
    SelectingTransport {
        ticket: TicketKind,
        candidates: BTreeSet<NodeId>,
    },
    AwaitingCommit {
        proposal: ProposedMove,
    },
    Committed {
        mv: Move,
    },
    Rejected {
        error: AppError,
        restore: Option<TicketKind>,
    },
}

impl MoveFlow {
    pub fn state_name(&self) -> &'static str {
        match self {
            MoveFlow::Idle => "idle",
            MoveFlow::SelectingTransport { .. } => "selecting_transport",
            MoveFlow::AwaitingCommit { .. } => "awaiting_commit",
            MoveFlow::Committed { .. } => "committed",
            MoveFlow::Rejected { .. } => "rejected",
        }
    }

    pub fn is_awaiting_commit(&self) -> bool {
        matches!(self, MoveFlow::AwaitingCommit { .. })
    }

    pub fn selected_ticket(&self) -> Option<TicketKind> {
        match self {
            MoveFlow::SelectingTransport { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    /// Choose (or change) the ticket to travel with.
    pub fn select_transport(
        &mut self,
        ticket: TicketKind,
        candidates: BTreeSet<NodeId>,
    ) -> Result<(), DomainError> {
        if self.is_awaiting_commit() {
            return Err(in_flight());
        }
        *self = MoveFlow::SelectingTransport { ticket, candidates };
        Ok(())
    }

    /// Pick a destination from the candidate set and enter `AwaitingCommit`.
    pub fn select_destination(
        &mut self,
        game_id: i64,
        player_id: i64,
        destination: NodeId,
    ) -> Result<ProposedMove, DomainError> {
        let ticket = match self {
            MoveFlow::SelectingTransport { ticket, candidates } => {
                if !candidates.contains(&destination) {
                    return Err(DomainError::validation(
                        ValidationKind::IllegalDestination,
                        format!(
                            "Node {destination} is not reachable by {}",
                            ticket.as_str()
                        ),
                    ));
                }
                *ticket
            }
            MoveFlow::AwaitingCommit { .. } => return Err(in_flight()),
            _ => {
                return Err(DomainError::validation(
                    ValidationKind::NoSelection,
                    "Select a transport before choosing a destination",
                ))
            }
        };

        let proposal = ProposedMove {
            game_id,
            player_id,
            ticket,
            destination,
        };
        *self = MoveFlow::AwaitingCommit {
            proposal: proposal.clone(),
        };
        Ok(proposal)
    }

    /// Record the single outcome of the commit protocol.
    pub fn resolve(&mut self, outcome: Result<Move, AppError>) -> Result<(), DomainError> {
        let MoveFlow::AwaitingCommit { proposal } = self else {
            return Err(DomainError::invariant(format!(
                "commit outcome delivered in state {}",
                self.state_name()
            )));
        };

        *self = match outcome {
            Ok(mv) => MoveFlow::Committed { mv },
            Err(error) => {
                let restore = error.restores_selection().then_some(proposal.ticket);
                MoveFlow::Rejected { error, restore }
            }
        };
        Ok(())
    }

    /// Leave a terminal state. Returns the ticket whose selection should be
    /// restored, if any.
    pub fn acknowledge(&mut self) -> Option<TicketKind> {
        match std::mem::take(self) {
            MoveFlow::Rejected { restore, .. } => restore,
            MoveFlow::Committed { .. } => None,
            other => {
                *self = other;
                None
            }
        }
    }
}

fn in_flight() -> DomainError {
    DomainError::validation(
        ValidationKind::MoveInFlight,
        "A move is already awaiting commit",
    )
}
