//! Shared relay state

use crate::config::Config;
use crate::hub::RoomHub;

/// Shared application state handed to every route
#[derive(Clone)]
pub struct RelayState {
    pub hub: RoomHub,
    pub environment: String,
}

impl RelayState {
    pub fn new(config: &Config) -> Self {
        Self {
            hub: RoomHub::new(config.room_channel_capacity),
            environment: config.environment.clone(),
        }
    }
}
