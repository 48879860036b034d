//! Room manager: creates, tracks, and disposes rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use skirmish_protocol::{RoomId, RoomMetadata};
use skirmish_session::ClientRegistry;
use tokio::sync::broadcast;

use crate::room::spawn_room;
use crate::{LobbyEvent, LobbyPublisher, RoomConfig, RoomError, RoomHandle};

/// Counter for generating unique room IDs, process-wide.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Default lobby broadcast capacity.
const DEFAULT_LOBBY_CAPACITY: usize = 256;

/// Manages all active rooms in the process.
///
/// Every room it spawns shares the same [`ClientRegistry`] (so the
/// one-room-per-identity invariant holds across rooms) and the same
/// [`LobbyPublisher`] (so one subscription observes every room).
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
    registry: Arc<ClientRegistry>,
    lobby: LobbyPublisher,
    /// Template applied to every room this manager creates.
    config: RoomConfig,
}

impl RoomManager {
    /// Creates a manager with a fresh registry and the given room
    /// configuration template.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_registry(config, Arc::new(ClientRegistry::new()))
    }

    /// Creates a manager sharing an existing registry. Useful when
    /// several managers (or tests) must enforce one-room-per-identity
    /// across all of them.
    pub fn with_registry(config: RoomConfig, registry: Arc<ClientRegistry>) -> Self {
        Self {
            rooms: HashMap::new(),
            registry,
            lobby: LobbyPublisher::new(DEFAULT_LOBBY_CAPACITY),
            config,
        }
    }

    /// Spawns a new empty room and returns its handle.
    pub fn create_room(&mut self) -> RoomHandle {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            self.config.clone(),
            Arc::clone(&self.registry),
            self.lobby.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(room_id, handle.clone());
        tracing::info!(%room_id, "room created");
        handle
    }

    /// Returns the handle for a room.
    pub fn room(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Disposes a room: releases its identities, settles its
    /// reconnection windows, and stops its actor.
    pub async fn dispose_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        // An already-dead actor has nothing left to release.
        let _ = handle.dispose().await;

        tracing::info!(%room_id, "room removed");
        Ok(())
    }

    /// Lists metadata for every room still accepting players.
    ///
    /// Queries each room actor; rooms that fail to respond are skipped.
    pub async fn joinable_rooms(&self) -> Vec<(RoomId, RoomMetadata)> {
        let mut listings = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(snapshot) = handle.snapshot().await {
                let metadata = snapshot.metadata(&self.config);
                if metadata.is_joinable() {
                    listings.push((snapshot.room_id, metadata));
                }
            }
        }
        listings
    }

    /// Opens a subscription to lobby events for every room this
    /// manager spawns.
    pub fn subscribe_lobby(&self) -> broadcast::Receiver<LobbyEvent> {
        self.lobby.subscribe()
    }

    /// The shared identity registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
