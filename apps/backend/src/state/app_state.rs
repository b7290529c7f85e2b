use std::sync::Arc;

use crate::config::rules::GameRules;
use crate::domain::graph::TransportGraph;
use crate::realtime::ChangeHub;
use crate::store::GameStore;

/// Shared collaborators every service and session works against.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GameStore>,
    pub graph: Arc<dyn TransportGraph>,
    /// Local fan-out of change notifications.
    pub hub: ChangeHub,
    pub rules: Arc<GameRules>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn GameStore>,
        graph: Arc<dyn TransportGraph>,
        hub: ChangeHub,
        rules: GameRules,
    ) -> Self {
        Self {
            store,
            graph,
            hub,
            rules: Arc::new(rules),
        }
    }
}
