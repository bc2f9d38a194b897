//! Shared application state: the room registry plus the pure game domain.

pub mod hub;
pub mod rooms;
pub mod scoring;
pub mod session;

use std::sync::Arc;

use self::rooms::RoomManager;

/// Cheaply cloneable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state handed to every route handler.
pub struct AppState {
    rooms: RoomManager,
}

impl AppState {
    /// Construct the state wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(rooms: RoomManager) -> SharedState {
        Arc::new(Self { rooms })
    }

    /// The room registry.
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }
}
