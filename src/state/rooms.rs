//! Registry of live rooms and the handles used to reach their actors.

use std::sync::Arc;

use dashmap::{DashMap, Entry};
use tokio::sync::mpsc;
use tracing::info;

use crate::services::room_service::{self, RoomCommand, RoomDeps};

/// Cheap, cloneable address of one room's actor task.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: Arc<str>,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Room code this handle addresses.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Queue a command on the room's actor.
    ///
    /// On failure the command is handed back so the caller can report or
    /// retry against a fresh room.
    pub fn send(&self, command: RoomCommand) -> Result<(), RoomCommand> {
        self.tx.send(command).map_err(|err| err.0)
    }

    /// Whether the actor behind this handle has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether both handles address the same actor incarnation.
    pub fn same_channel(&self, other: &RoomHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Owns the room registry and spawns an actor per room code.
///
/// Every room is a single task that serialises its commands; the registry
/// only hands out addresses. A room whose actor has exited is replaced on
/// the next `open` for its code.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<String, RoomHandle>>,
    deps: RoomDeps,
}

impl RoomManager {
    /// Build an empty registry sharing `deps` across all future rooms.
    pub fn new(deps: RoomDeps) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            deps,
        }
    }

    /// Fetch the room called `room_id`, creating it when absent.
    pub fn open(&self, room_id: &str) -> RoomHandle {
        loop {
            match self.rooms.entry(room_id.to_string()) {
                Entry::Occupied(occupied) => {
                    if occupied.get().is_closed() {
                        // Stale registration from an actor that already
                        // exited; replace it with a fresh room.
                        occupied.remove();
                        continue;
                    }
                    return occupied.get().clone();
                }
                Entry::Vacant(vacant) => {
                    let handle = self.spawn(room_id);
                    vacant.insert(handle.clone());
                    return handle;
                }
            }
        }
    }

    /// Fetch the room called `room_id` only if it is currently alive.
    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Number of registered rooms, stale entries included.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is registered at all.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn spawn(&self, room_id: &str) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            room_id: Arc::from(room_id),
            tx,
        };
        info!(room_id, "opening room");
        let registry = self.rooms.clone();
        let registration = handle.clone();
        let deps = self.deps.clone();
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            room_service::run_room(room_id.clone(), rx, deps).await;
            // Only drop our own registration; a replacement room spawned
            // under the same code stays.
            registry.remove_if(&room_id, |_, current| current.same_channel(&registration));
            info!(room_id, "room closed");
        });
        handle
    }
}
