//! vitrine-relay: room relay and canonical state owner
//!
//! Surfaces connect over WebSocket, join a room by code, and propose whole
//! documents against the room's current revision. The relay commits or
//! rejects each proposal and fans committed documents and remote commands out
//! to the rest of the room.

pub mod api;
pub mod config;
pub mod hub;
pub mod logger;
pub mod state;

pub use config::Config;
pub use hub::RoomHub;
pub use state::RelayState;

use tokio::net::TcpListener;

/// Serve the relay on an already bound listener until the future is dropped
/// or the server fails.
pub async fn serve(listener: TcpListener, state: RelayState) -> std::io::Result<()> {
    let app = api::create_router(state);
    axum::serve(listener, app).await
}
