#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod config;
pub mod domain;
pub mod entities;
pub mod error;
pub mod errors;
pub mod infra;
pub mod realtime;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-exports for public API
pub use config::db::{db_url, DbOwner, DbProfile};
pub use config::realtime::RealtimeConfig;
pub use config::rules::GameRules;
pub use domain::graph::{NodeId, StaticGraph, TransportGraph};
pub use domain::model::{Game, GameStatus, Move, Player, Role};
pub use domain::tickets::{TicketKind, Tickets};
pub use domain::view::SessionView;
pub use error::AppError;
pub use errors::ErrorCode;
pub use infra::db::connect_db;
pub use realtime::{ChangeEvent, ChangeHub, RealtimeBroker};
pub use services::{GameLifecycle, GameSession, MoveAcceptor, MoveFlow, ProposedMove};
pub use state::AppState;
pub use store::{GameStore, InMemoryStore, SeaStore};

// Prelude for test convenience
pub mod prelude {
    pub use super::domain::*;
    pub use super::error::*;
    pub use super::realtime::*;
    pub use super::services::*;
    pub use super::state::*;
    pub use super::store::*;
}

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}
