//! API routes for vitrine-relay

pub mod health;
pub mod rooms;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Create the combined router
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ws", get(ws::handle_ws))
        .route("/api/rooms/{room}", get(rooms::get_room))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
