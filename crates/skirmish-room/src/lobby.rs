//! Lobby publishing: the channel rooms use to make themselves
//! discoverable.
//!
//! The lobby itself (the browsing UI, the listing service) is an
//! external collaborator; this module only defines the event stream it
//! consumes. A tokio broadcast channel fans every event out to all
//! current subscribers, and lagging or absent subscribers never block a
//! room.

use skirmish_protocol::{RoomId, RoomMetadata};
use tokio::sync::broadcast;

/// A change to the set of discoverable rooms.
#[derive(Debug, Clone)]
pub enum LobbyEvent {
    /// A room appeared or its metadata changed. The first `Updated` for
    /// a room id is the "add".
    Updated {
        room_id: RoomId,
        metadata: RoomMetadata,
    },
    /// A room was disposed and should drop out of listings.
    Removed { room_id: RoomId },
}

/// Cheap-to-clone handle for publishing and subscribing to lobby events.
#[derive(Debug, Clone)]
pub struct LobbyPublisher {
    tx: broadcast::Sender<LobbyEvent>,
}

impl LobbyPublisher {
    /// Creates a publisher whose subscribers buffer up to `capacity`
    /// events before lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Opens a new subscription. Only events published after this call
    /// are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.tx.subscribe()
    }

    /// Publishes a metadata add/update for a room.
    pub fn updated(&self, room_id: RoomId, metadata: RoomMetadata) {
        // Err means no subscribers, which is fine.
        let _ = self.tx.send(LobbyEvent::Updated { room_id, metadata });
    }

    /// Publishes a removal for a room.
    pub fn removed(&self, room_id: RoomId) {
        let _ = self.tx.send(LobbyEvent::Removed { room_id });
    }
}
