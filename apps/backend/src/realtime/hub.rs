use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::AppError;
use crate::realtime::{ChangeEvent, ChangePublisher};

/// Pending signals kept per subscriber. A full queue already guarantees a
/// refresh, so further events are dropped.
const SUBSCRIBER_QUEUE: usize = 64;

type Registry = DashMap<i64, DashMap<Uuid, mpsc::Sender<ChangeEvent>>>;

/// In-process fan-out of change events to per-game subscribers.
#[derive(Clone, Default)]
pub struct ChangeHub {
    subscribers: Arc<Registry>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, game_id: i64) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let token = Uuid::new_v4();
        self.subscribers
            .entry(game_id)
            .or_default()
            .insert(token, tx);
        debug!(game_id, %token, "Change subscription registered");
        Subscription {
            game_id,
            token,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self, game_id: i64) -> usize {
        self.subscribers
            .get(&game_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    pub fn broadcast(&self, event: ChangeEvent) {
        let Some(entry) = self.subscribers.get(&event.game_id) else {
            return;
        };
        let mut closed = Vec::new();
        for sub in entry.iter() {
            match sub.value().try_send(event) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => closed.push(*sub.key()),
            }
        }
        drop(entry);
        for token in closed {
            unregister(&self.subscribers, event.game_id, token);
        }
        trace!(game_id = event.game_id, entity = ?event.entity, op = ?event.op, "Change broadcast");
    }
}

#[async_trait]
impl ChangePublisher for ChangeHub {
    async fn publish(&self, event: ChangeEvent) -> Result<(), AppError> {
        self.broadcast(event);
        Ok(())
    }
}

fn unregister(subscribers: &Registry, game_id: i64, token: Uuid) {
    if let Some(entry) = subscribers.get(&game_id) {
        entry.remove(&token);
        if entry.is_empty() {
            drop(entry);
            subscribers.remove_if(&game_id, |_, subs| subs.is_empty());
        }
    }
}

/// Live subscription to one game. Unregisters on drop.
pub struct Subscription {
    game_id: i64,
    token: Uuid,
    rx: mpsc::Receiver<ChangeEvent>,
    subscribers: Arc<Registry>,
}

impl Subscription {
    pub fn game_id(&self) -> i64 {
        self.game_id
    }

    /// Wait for the next signal. `None` once the hub side is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Discard every signal already queued; returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while self.rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        unregister(&self.subscribers, self.game_id, self.token);
        debug!(game_id = self.game_id, token = %self.token, "Change subscription dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{ChangeEntity, ChangeOp};

    #[tokio::test]
    async fn events_reach_only_the_matching_game() {
        let hub = ChangeHub::new();
        let mut a = hub.subscribe(1);
        let mut b = hub.subscribe(2);

        hub.broadcast(ChangeEvent::new(1, ChangeEntity::Move, ChangeOp::Insert));

        assert_eq!(a.recv().await.map(|e| e.entity), Some(ChangeEntity::Move));
        assert_eq!(b.drain(), 0);
    }

    #[tokio::test]
    async fn drop_unregisters() {
        let hub = ChangeHub::new();
        let sub = hub.subscribe(5);
        assert_eq!(hub.subscriber_count(5), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(5), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_extra_signals() {
        let hub = ChangeHub::new();
        let mut sub = hub.subscribe(3);
        for _ in 0..(SUBSCRIBER_QUEUE + 10) {
            hub.broadcast(ChangeEvent::new(3, ChangeEntity::Game, ChangeOp::Update));
        }
        assert_eq!(sub.drain(), SUBSCRIBER_QUEUE);
    }
}
