#![allow(dead_code)]

// tests/common/mod.rs
use std::sync::Arc;

use backend::config::rules::GameRules;
use backend::domain::graph::{Edge, NodeId, StaticGraph};
use backend::domain::model::{Game, GameStatus, Player, Role};
use backend::domain::tickets::{TicketKind, Tickets, Transport};
use backend::domain::turns::Roster;
use backend::domain::view::GameSnapshot;
use backend::realtime::ChangeHub;
use backend::services::{load_snapshot, GameLifecycle, MoveAcceptor, ProposedMove};
use backend::state::AppState;
use backend::store::{GameStore, GameUpdate, InMemoryStore, NewGame, NewMove, NewPlayer};

pub mod proptest_prelude;

// Logging is auto-installed for every test binary
#[ctor::ctor]
fn init_logging() {
    backend_test_support::logging::init();
}

pub const EVADER_USER: i64 = 100;
pub const SEEKER_B_USER: i64 = 200;
pub const SEEKER_C_USER: i64 = 300;

/// Small board:
///
/// ```text
/// 10 -taxi- 11      20 -taxi- 21      40 -taxi- 41
/// 10 -taxi- 15      20 -taxi- 25      40 -ug-   45
/// 10 -bus-  30      20 -bus-  29
/// 10 -ug-   60      15 -taxi- 30
/// ```
pub fn board() -> StaticGraph {
    let e = |a, b, transport| Edge { a, b, transport };
    StaticGraph::from_edges([
        e(10, 11, Transport::Taxi),
        e(10, 15, Transport::Taxi),
        e(10, 30, Transport::Bus),
        e(10, 60, Transport::Underground),
        e(15, 30, Transport::Taxi),
        e(20, 21, Transport::Taxi),
        e(20, 25, Transport::Taxi),
        e(20, 29, Transport::Bus),
        e(40, 41, Transport::Taxi),
        e(40, 45, Transport::Underground),
    ])
}

/// In-memory store wired to a change hub, plus the state a session needs.
pub struct Harness {
    pub store: InMemoryStore,
    pub hub: ChangeHub,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rules(GameRules::default())
    }

    pub fn with_rules(rules: GameRules) -> Self {
        let hub = ChangeHub::new();
        let store = InMemoryStore::new().with_publisher(Arc::new(hub.clone()));
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(board()),
            hub.clone(),
            rules,
        );
        Self { store, hub, state }
    }

    pub fn acceptor(&self) -> MoveAcceptor {
        MoveAcceptor::new(Arc::clone(&self.state.store), Arc::clone(&self.state.graph))
    }

    pub fn lifecycle(&self) -> GameLifecycle {
        GameLifecycle::new(Arc::clone(&self.state.store), Arc::clone(&self.state.rules))
    }

    pub async fn snapshot(&self, game_id: i64) -> GameSnapshot {
        load_snapshot(self.state.store.as_ref(), game_id)
            .await
            .expect("snapshot loads")
    }

    pub async fn game(&self, game_id: i64) -> Game {
        self.snapshot(game_id).await.game
    }

    pub async fn player(&self, game_id: i64, player_id: i64) -> Player {
        self.snapshot(game_id)
            .await
            .roster
            .get(player_id)
            .cloned()
            .expect("player exists")
    }
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub user_id: i64,
    pub role: Role,
    pub position: NodeId,
    pub tickets: Tickets,
}

impl Seat {
    pub fn evader(user_id: i64, position: NodeId) -> Self {
        Self {
            user_id,
            role: Role::Evader,
            position,
            tickets: GameRules::default().allotment(Role::Evader),
        }
    }

    pub fn seeker(user_id: i64, position: NodeId) -> Self {
        Self {
            user_id,
            role: Role::Seeker,
            position,
            tickets: GameRules::default().allotment(Role::Seeker),
        }
    }

    pub fn with_tickets(mut self, tickets: Tickets) -> Self {
        self.tickets = tickets;
        self
    }
}

/// A seeded game; `players` is in roster order.
pub struct Seeded {
    pub game_id: i64,
    pub players: Vec<Player>,
}

impl Seeded {
    pub fn player(&self, idx: usize) -> &Player {
        &self.players[idx]
    }

    /// A proposal from roster seat `idx`.
    pub fn propose(&self, idx: usize, ticket: TicketKind, destination: NodeId) -> ProposedMove {
        ProposedMove {
            game_id: self.game_id,
            player_id: self.players[idx].id,
            ticket,
            destination,
        }
    }
}

/// A: evader at 10, B: seeker at 20, C: seeker at 40.
pub fn three_seats() -> Vec<Seat> {
    vec![
        Seat::evader(EVADER_USER, 10),
        Seat::seeker(SEEKER_B_USER, 20),
        Seat::seeker(SEEKER_C_USER, 40),
    ]
}

/// A: evader at 10, B: seeker at 20.
pub fn two_seats() -> Vec<Seat> {
    vec![Seat::evader(EVADER_USER, 10), Seat::seeker(SEEKER_B_USER, 20)]
}

/// In-progress game at `current_turn` with a consistent move log.
pub async fn seed_in_progress(store: &dyn GameStore, seats: &[Seat], current_turn: u32) -> Seeded {
    seed_with_log(store, seats, current_turn, current_turn).await
}

/// In-progress game at `current_turn` whose log holds `logged_moves`
/// entries (`0..logged_moves`). Positions and tickets are taken from the
/// seats as given; log entries are placeholders that stay in place.
pub async fn seed_with_log(
    store: &dyn GameStore,
    seats: &[Seat],
    current_turn: u32,
    logged_moves: u32,
) -> Seeded {
    let mut txn = store.begin().await.expect("begin");
    let game = txn
        .insert_game(NewGame {
            name: backend_test_support::unique_helpers::unique_str("game"),
        })
        .await
        .expect("insert game");

    let mut players = Vec::with_capacity(seats.len());
    for seat in seats {
        let player = txn
            .insert_player(NewPlayer {
                game_id: game.id,
                user_id: seat.user_id,
                role: seat.role,
                current_position: seat.position,
                tickets: seat.tickets,
            })
            .await
            .expect("insert player");
        players.push(player);
    }
    let roster = Roster::new(players);
    let players = roster.players().to_vec();

    for turn in 0..logged_moves {
        let mover = &players[turn as usize % players.len()];
        txn.insert_move(NewMove {
            game_id: game.id,
            player_id: mover.id,
            turn_number: turn,
            from_position: mover.current_position,
            to_position: mover.current_position,
            ticket: Some(TicketKind::Taxi),
            revealed: false,
        })
        .await
        .expect("insert move");
    }

    let mut update = GameUpdate::new(game.id, 0)
        .expect_status(GameStatus::Waiting)
        .with_status(GameStatus::InProgress)
        .with_current_turn(current_turn);
    if let Some(evader) = roster.evader() {
        update = update.with_hidden_role_player(evader.id);
    }
    txn.update_game(update).await.expect("start game");
    txn.commit().await.expect("commit seed");

    Seeded {
        game_id: game.id,
        players,
    }
}
