// Public API for integration tests and potential library usage

pub mod abuse;
pub mod api;
pub mod commitment;
pub mod config;
pub mod error;
pub mod history;
pub mod protocol;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Full application router: WebSocket, HTTP API and static files
pub fn app(state: Arc<state::AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::routes())
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
