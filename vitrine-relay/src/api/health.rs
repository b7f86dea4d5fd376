//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::state::RelayState;

pub async fn health_check(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "vitrine-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "rooms": state.hub.room_count(),
    }))
}
