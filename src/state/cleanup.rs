use super::AppState;
use crate::types::{RoomCode, RoomId};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Delete a completed room once `delay` has passed.
///
/// Only the room identified by `id` is removed; if it is already gone the
/// task does nothing.
pub fn schedule_room_deletion(
    state: AppState,
    code: RoomCode,
    id: RoomId,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if state.registry.write().await.expire_if(&code, &id) {
            tracing::info!(room = %code, "Completed room deleted");
        }
    })
}

/// Delete every room older than the idle ceiling. Returns the deleted codes.
pub async fn sweep_expired_rooms(state: &AppState) -> Vec<RoomCode> {
    let expired = state
        .registry
        .write()
        .await
        .sweep(Instant::now(), state.config.idle_ttl);

    if let Some(ref limiter) = state.abuse.rate_limiter {
        limiter.cleanup().await;
        let tracked = limiter.tracked().await;
        tracing::debug!(tracked, "Rate limiter pruned");
    }

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), rooms = ?expired, "Expired idle rooms");
    }
    let rooms = state.room_count().await;
    let connections = state.connections.len().await;
    tracing::debug!(
        rooms,
        connections,
        "Idle sweep finished"
    );
    expired
}

/// Spawn a background task that sweeps idle rooms on a fixed interval
pub fn spawn_idle_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.sweep_interval);
        // First tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            sweep_expired_rooms(&state).await;
        }
    })
}
