//! HTTP API endpoints.
//!
//! Read-only views for the lobby browser and the results page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::time::Instant;

use crate::state::AppState;
use crate::types::RoomSummary;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(recent_games))
        .route("/rooms", get(joinable_rooms))
}

/// Recent completed games, newest first.
///
/// GET /history
pub async fn recent_games(State(state): State<Arc<AppState>>) -> Response {
    match state.history.recent(state.history_limit).await {
        Ok(games) => Json(games).into_response(),
        Err(e) => {
            tracing::error!("Failed to load game history: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history").into_response()
        }
    }
}

/// Rooms with a challenge set and a free guesser seat.
///
/// GET /rooms
pub async fn joinable_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    let rooms = state.registry.read().await.list_joinable(Instant::now());
    Json(rooms)
}
