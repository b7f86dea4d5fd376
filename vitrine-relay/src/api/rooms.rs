//! Room inspection

use axum::extract::{Path, State};
use shared::RoomCode;
use shared::error::{ApiResponse, AppResult};

use crate::hub::RoomSnapshot;
use crate::state::RelayState;

/// GET /api/rooms/{room}: canonical document, revision and member count
pub async fn get_room(
    State(state): State<RelayState>,
    Path(room): Path<String>,
) -> AppResult<ApiResponse<RoomSnapshot>> {
    let room = RoomCode::new(&room)?;
    let snapshot = state.hub.snapshot(&room)?;
    Ok(ApiResponse::success(snapshot))
}
