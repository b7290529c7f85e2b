//! Process-local store.
//!
//! A transaction reads a private copy of each game it touches and records its
//! writes as a list of operations. `commit` replays those operations against
//! live state under one write lock, re-running every guard, so a transaction
//! that read a stale turn counter fails with `Conflict` and leaves nothing
//! behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio::sync::Barrier;
use tracing::{debug, warn};

use super::{
    GameStore, GameUpdate, NewGame, NewMove, NewPlayer, PlayerUpdate, StoreError, StoreTxn,
};
use crate::domain::model::{Game, GameStatus, Move, Player};
use crate::realtime::{ChangeEntity, ChangeEvent, ChangeOp, ChangePublisher};

#[derive(Clone, Debug)]
struct GameRecord {
    game: Game,
    players: Vec<Player>,
    moves: Vec<Move>,
}

#[derive(Default)]
struct Inner {
    games: HashMap<i64, GameRecord>,
}

/// Id sequences. Like database sequences, values burned by a rolled back
/// transaction are not reused.
struct Sequences {
    game: AtomicI64,
    player: AtomicI64,
    mv: AtomicI64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            game: AtomicI64::new(1),
            player: AtomicI64::new(1),
            mv: AtomicI64::new(1),
        }
    }
}

/// Failure injection for tests.
#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    failing_commits: AtomicUsize,
    commit_gate: Mutex<Option<Arc<Barrier>>>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    ids: Arc<Sequences>,
    faults: Arc<Faults>,
    publisher: Option<Arc<dyn ChangePublisher>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a change event for every committed write.
    pub fn with_publisher(mut self, publisher: Arc<dyn ChangePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// While set, `begin` and `commit` fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` commits with `Unavailable`.
    pub fn fail_next_commits(&self, n: usize) {
        self.faults.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Make every commit wait on `gate` before applying its writes.
    pub fn set_commit_gate(&self, gate: Option<Arc<Barrier>>) {
        *self.faults.commit_gate.lock() = gate;
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        Ok(Box::new(InMemoryTxn {
            inner: Arc::clone(&self.inner),
            ids: Arc::clone(&self.ids),
            faults: Arc::clone(&self.faults),
            publisher: self.publisher.clone(),
            working: HashMap::new(),
            ops: Vec::new(),
        }))
    }
}

#[derive(Clone, Debug)]
enum Op {
    InsertGame(Game),
    InsertPlayer(Player),
    InsertMove(Move),
    UpdatePlayer(PlayerUpdate),
    DeletePlayer { game_id: i64, player_id: i64 },
    UpdateGame(GameUpdate),
}

impl Op {
    fn game_id(&self) -> i64 {
        match self {
            Op::InsertGame(g) => g.id,
            Op::InsertPlayer(p) => p.game_id,
            Op::InsertMove(m) => m.game_id,
            Op::UpdatePlayer(u) => u.game_id,
            Op::DeletePlayer { game_id, .. } => *game_id,
            Op::UpdateGame(u) => u.game_id,
        }
    }

    fn event(&self) -> ChangeEvent {
        let (entity, op) = match self {
            Op::InsertGame(_) => (ChangeEntity::Game, ChangeOp::Insert),
            Op::InsertPlayer(_) => (ChangeEntity::Player, ChangeOp::Insert),
            Op::InsertMove(_) => (ChangeEntity::Move, ChangeOp::Insert),
            Op::UpdatePlayer(_) => (ChangeEntity::Player, ChangeOp::Update),
            Op::DeletePlayer { .. } => (ChangeEntity::Player, ChangeOp::Delete),
            Op::UpdateGame(_) => (ChangeEntity::Game, ChangeOp::Update),
        };
        ChangeEvent::new(self.game_id(), entity, op)
    }

    /// Apply to one game's record, enforcing the same guards a database
    /// would (unique keys, conditional update).
    fn apply(&self, slot: &mut Option<GameRecord>) -> Result<(), StoreError> {
        if let Op::InsertGame(game) = self {
            if slot.is_some() {
                return Err(StoreError::Duplicate(format!("game {} exists", game.id)));
            }
            *slot = Some(GameRecord {
                game: game.clone(),
                players: Vec::new(),
                moves: Vec::new(),
            });
            return Ok(());
        }

        let game_id = self.game_id();
        let record = slot
            .as_mut()
            .ok_or_else(|| StoreError::NotFound(format!("game {game_id}")))?;

        match self {
            Op::InsertGame(_) => Ok(()),
            Op::InsertPlayer(player) => {
                if record.players.iter().any(|p| p.user_id == player.user_id) {
                    return Err(StoreError::Duplicate(format!(
                        "user {} already in game {game_id}",
                        player.user_id
                    )));
                }
                record.players.push(player.clone());
                Ok(())
            }
            Op::InsertMove(mv) => {
                if record.moves.iter().any(|m| m.turn_number == mv.turn_number) {
                    return Err(StoreError::Conflict {
                        expected_turn: mv.turn_number,
                        actual_turn: Some(record.game.current_turn),
                    });
                }
                record.moves.push(mv.clone());
                Ok(())
            }
            Op::UpdatePlayer(update) => {
                let player = record
                    .players
                    .iter_mut()
                    .find(|p| p.id == update.player_id)
                    .ok_or_else(|| StoreError::NotFound(format!("player {}", update.player_id)))?;
                if let Some(pos) = update.current_position {
                    player.current_position = pos;
                }
                if let Some(tickets) = update.tickets {
                    player.tickets = tickets;
                }
                if let Some(active) = update.is_active {
                    player.is_active = active;
                }
                Ok(())
            }
            Op::DeletePlayer { player_id, .. } => {
                let before = record.players.len();
                record.players.retain(|p| p.id != *player_id);
                if record.players.len() == before {
                    return Err(StoreError::NotFound(format!("player {player_id}")));
                }
                Ok(())
            }
            Op::UpdateGame(update) => {
                if !update.matches(&record.game) {
                    return Err(StoreError::Conflict {
                        expected_turn: update.expected_turn,
                        actual_turn: Some(record.game.current_turn),
                    });
                }
                update.apply(&mut record.game);
                Ok(())
            }
        }
    }
}

pub struct InMemoryTxn {
    inner: Arc<RwLock<Inner>>,
    ids: Arc<Sequences>,
    faults: Arc<Faults>,
    publisher: Option<Arc<dyn ChangePublisher>>,
    /// Private copy of every game read so far; `None` when absent.
    working: HashMap<i64, Option<GameRecord>>,
    ops: Vec<Op>,
}

impl InMemoryTxn {
    fn slot(&mut self, game_id: i64) -> &mut Option<GameRecord> {
        let inner = &self.inner;
        self.working
            .entry(game_id)
            .or_insert_with(|| inner.read().games.get(&game_id).cloned())
    }

    fn stage(&mut self, op: Op) -> Result<(), StoreError> {
        op.apply(self.slot(op.game_id()))?;
        self.ops.push(op);
        Ok(())
    }

    /// Replay staged writes on live state; all or nothing.
    fn apply_to_live(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        let mut touched: HashMap<i64, Option<GameRecord>> = HashMap::new();
        for op in &self.ops {
            let slot = touched
                .entry(op.game_id())
                .or_insert_with(|| guard.games.get(&op.game_id()).cloned());
            op.apply(slot)?;
        }
        for (game_id, record) in touched {
            match record {
                Some(record) => {
                    guard.games.insert(game_id, record);
                }
                None => {
                    guard.games.remove(&game_id);
                }
            }
        }
        Ok(())
    }

    fn check_commit_faults(&self) -> Result<(), StoreError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        let failed = self
            .faults
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTxn for InMemoryTxn {
    async fn find_game(&mut self, game_id: i64) -> Result<Option<Game>, StoreError> {
        Ok(self.slot(game_id).as_ref().map(|r| r.game.clone()))
    }

    async fn players_in_game(&mut self, game_id: i64) -> Result<Vec<Player>, StoreError> {
        Ok(self
            .slot(game_id)
            .as_ref()
            .map(|r| r.players.clone())
            .unwrap_or_default())
    }

    async fn moves_in_game(&mut self, game_id: i64) -> Result<Vec<Move>, StoreError> {
        let mut moves = self
            .slot(game_id)
            .as_ref()
            .map(|r| r.moves.clone())
            .unwrap_or_default();
        moves.sort_by_key(|m| m.turn_number);
        Ok(moves)
    }

    async fn insert_game(&mut self, game: NewGame) -> Result<Game, StoreError> {
        let game = Game {
            id: self.ids.game.fetch_add(1, Ordering::SeqCst),
            name: game.name,
            status: GameStatus::Waiting,
            current_turn: 0,
            hidden_role_player_id: None,
            winner: None,
            roster_version: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        self.stage(Op::InsertGame(game.clone()))?;
        Ok(game)
    }

    async fn insert_player(&mut self, player: NewPlayer) -> Result<Player, StoreError> {
        let player = Player {
            id: self.ids.player.fetch_add(1, Ordering::SeqCst),
            game_id: player.game_id,
            user_id: player.user_id,
            role: player.role,
            current_position: player.current_position,
            is_active: true,
            tickets: player.tickets,
            joined_at: OffsetDateTime::now_utc(),
        };
        self.stage(Op::InsertPlayer(player.clone()))?;
        Ok(player)
    }

    async fn insert_move(&mut self, mv: NewMove) -> Result<Move, StoreError> {
        let mv = Move {
            id: self.ids.mv.fetch_add(1, Ordering::SeqCst),
            game_id: mv.game_id,
            player_id: mv.player_id,
            turn_number: mv.turn_number,
            from_position: mv.from_position,
            to_position: mv.to_position,
            ticket: mv.ticket,
            revealed: mv.revealed,
            created_at: OffsetDateTime::now_utc(),
        };
        self.stage(Op::InsertMove(mv.clone()))?;
        Ok(mv)
    }

    async fn update_player(&mut self, update: PlayerUpdate) -> Result<(), StoreError> {
        self.stage(Op::UpdatePlayer(update))
    }

    async fn delete_player(&mut self, game_id: i64, player_id: i64) -> Result<(), StoreError> {
        self.stage(Op::DeletePlayer { game_id, player_id })
    }

    async fn update_game(&mut self, update: GameUpdate) -> Result<(), StoreError> {
        self.stage(Op::UpdateGame(update))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.check_commit_faults()?;

        let gate = self.faults.commit_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        self.apply_to_live()?;
        debug!(ops = self.ops.len(), "In-memory transaction committed");

        if let Some(publisher) = &self.publisher {
            let mut events: Vec<ChangeEvent> = self.ops.iter().map(Op::event).collect();
            events.dedup();
            for event in events {
                if let Err(err) = publisher.publish(event).await {
                    warn!(game_id = event.game_id, error = %err, "Change notification failed");
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        debug!(ops = self.ops.len(), "In-memory transaction rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Role;
    use crate::domain::tickets::{TicketKind, Tickets};
    use crate::realtime::ChangeHub;

    async fn seeded() -> (InMemoryStore, i64, i64) {
        let store = InMemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        let game = txn.insert_game(NewGame { name: "g".into() }).await.unwrap();
        let player = txn
            .insert_player(NewPlayer {
                game_id: game.id,
                user_id: 1,
                role: Role::Evader,
                current_position: 10,
                tickets: Tickets::new(4, 3, 3, 5),
            })
            .await
            .unwrap();
        txn.commit().await.unwrap();
        (store, game.id, player.id)
    }

    fn new_move(game_id: i64, player_id: i64, turn: u32) -> NewMove {
        NewMove {
            game_id,
            player_id,
            turn_number: turn,
            from_position: 10,
            to_position: 15,
            ticket: Some(TicketKind::Taxi),
            revealed: false,
        }
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let (store, game_id, player_id) = seeded().await;

        let mut writer = store.begin().await.unwrap();
        writer
            .update_player(PlayerUpdate::new(game_id, player_id).with_position(15))
            .await
            .unwrap();

        let mut reader = store.begin().await.unwrap();
        let players = reader.players_in_game(game_id).await.unwrap();
        assert_eq!(players[0].current_position, 10);

        writer.commit().await.unwrap();
        let mut reader = store.begin().await.unwrap();
        let players = reader.players_in_game(game_id).await.unwrap();
        assert_eq!(players[0].current_position, 15);
    }

    #[tokio::test]
    async fn stale_turn_fails_at_commit_and_leaves_nothing() {
        let (store, game_id, player_id) = seeded().await;

        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        for txn in [&mut a, &mut b] {
            txn.find_game(game_id).await.unwrap();
        }

        b.insert_move(new_move(game_id, player_id, 0)).await.unwrap();
        b.update_game(GameUpdate::new(game_id, 0).with_current_turn(1))
            .await
            .unwrap();
        b.commit().await.unwrap();

        a.update_player(PlayerUpdate::new(game_id, player_id).with_position(99))
            .await
            .unwrap();
        a.update_game(GameUpdate::new(game_id, 0).with_current_turn(1))
            .await
            .unwrap();
        let err = a.commit().await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected_turn: 0,
                actual_turn: Some(1)
            }
        );

        let mut reader = store.begin().await.unwrap();
        assert_eq!(reader.players_in_game(game_id).await.unwrap()[0].current_position, 10);
        assert_eq!(reader.moves_in_game(game_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conditional_update_checks_the_private_copy() {
        let (store, game_id, _) = seeded().await;
        let mut txn = store.begin().await.unwrap();
        let err = txn
            .update_game(GameUpdate::new(game_id, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected_turn: 3, .. }));
    }

    #[tokio::test]
    async fn roster_change_fails_a_second_seat_write_at_commit() {
        let (store, game_id, _) = seeded().await;
        let seat_change = GameUpdate::new(game_id, 0)
            .expect_status(GameStatus::Waiting)
            .expect_roster_version(0)
            .bump_roster_version();

        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.update_game(seat_change.clone()).await.unwrap();
        b.update_game(seat_change).await.unwrap();
        a.commit().await.unwrap();

        let err = b.commit().await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected_turn: 0,
                actual_turn: Some(0)
            }
        );
        let mut reader = store.begin().await.unwrap();
        let game = reader.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.roster_version, 1);
    }

    #[tokio::test]
    async fn duplicate_user_and_turn_are_rejected() {
        let (store, game_id, player_id) = seeded().await;
        let mut txn = store.begin().await.unwrap();
        let err = txn
            .insert_player(NewPlayer {
                game_id,
                user_id: 1,
                role: Role::Seeker,
                current_position: 20,
                tickets: Tickets::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        txn.insert_move(new_move(game_id, player_id, 0)).await.unwrap();
        let err = txn
            .insert_move(new_move(game_id, player_id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_unavailable() {
        let (store, game_id, player_id) = seeded().await;
        store.fail_next_commits(1);
        let mut txn = store.begin().await.unwrap();
        txn.update_player(PlayerUpdate::new(game_id, player_id).with_active(false))
            .await
            .unwrap();
        assert!(matches!(
            txn.commit().await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(true);
        assert!(matches!(store.begin().await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn committed_writes_notify_subscribers() {
        let hub = ChangeHub::new();
        let store = InMemoryStore::new().with_publisher(Arc::new(hub.clone()));
        let mut txn = store.begin().await.unwrap();
        let game = txn.insert_game(NewGame { name: "g".into() }).await.unwrap();
        let mut sub = hub.subscribe(game.id);
        txn.commit().await.unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.entity, ChangeEntity::Game);
        assert_eq!(event.op, ChangeOp::Insert);
    }
}
