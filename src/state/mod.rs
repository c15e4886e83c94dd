mod cleanup;
mod connections;
mod game;
mod registry;
mod room;

pub use cleanup::{schedule_room_deletion, spawn_idle_sweeper, sweep_expired_rooms};
pub use connections::ConnectionHub;
pub use registry::{normalize_code, RoomRegistry};
pub use room::{generate_session_token, Notice, Room};

use crate::abuse::AbuseConfig;
use crate::config::RoomConfig;
use crate::history::HistorySink;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Rooms, sessions and retired codes; one lock so every operation is atomic
    pub registry: Arc<RwLock<RoomRegistry>>,
    pub connections: ConnectionHub,
    pub history: Arc<dyn HistorySink>,
    pub config: Arc<RoomConfig>,
    pub abuse: Arc<AbuseConfig>,
    /// Max rows served by `GET /history`
    pub history_limit: u32,
}

impl AppState {
    pub fn new(history: Arc<dyn HistorySink>, config: RoomConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RoomRegistry::new())),
            connections: ConnectionHub::new(),
            history,
            config: Arc::new(config),
            abuse: Arc::new(AbuseConfig::default()),
            history_limit: 50,
        }
    }

    pub fn with_abuse(mut self, abuse: AbuseConfig) -> Self {
        self.abuse = Arc::new(abuse);
        self
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    pub async fn room_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Snapshot of a room, for inspection
    pub async fn get_room(&self, code: &str) -> Option<Room> {
        self.registry.read().await.lookup(code).cloned()
    }
}
