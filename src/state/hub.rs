//! Per-room broadcast channel.

use tokio::sync::broadcast;

use crate::dto::events::RoomEvent;

/// Simple broadcast hub fanning one room's events out to its subscribers.
pub struct RoomHub {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: RoomEvent) {
        let _ = self.sender.send(event);
    }
}
