//! Change notifications.
//!
//! Notifications are invalidation signals only. Subscribers never apply the
//! payload; they re-fetch authoritative state from the store. Delivery is
//! at-least-once, so duplicates are harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub mod broker;
pub mod hub;

pub use broker::RealtimeBroker;
pub use hub::{ChangeHub, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEntity {
    Game,
    Player,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub game_id: i64,
    pub entity: ChangeEntity,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn new(game_id: i64, entity: ChangeEntity, op: ChangeOp) -> Self {
        Self {
            game_id,
            entity,
            op,
        }
    }
}

/// Sink for committed changes.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    async fn publish(&self, event: ChangeEvent) -> Result<(), AppError>;
}
