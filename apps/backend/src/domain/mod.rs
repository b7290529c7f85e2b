//! Domain layer: pure game rules and derived views.

pub mod graph;
pub mod model;
pub mod reveal;
pub mod tickets;
pub mod turns;
pub mod view;

#[cfg(test)]
mod test_prelude;
#[cfg(test)]
mod tests_props_tickets;
#[cfg(test)]
mod tests_props_turns;

// Re-exports for ergonomics
pub use graph::{candidate_destinations, NodeId, StaticGraph, TransportGraph};
pub use model::{Game, GameStatus, Move, Player, Role};
pub use reveal::{is_reveal_turn, move_is_revealed};
pub use tickets::{debit, has_ticket, TicketKind, Tickets, Transport};
pub use turns::{active_player, is_players_turn, seat_to_act, Roster};
pub use view::{derive_view, GameSnapshot, SessionView};
