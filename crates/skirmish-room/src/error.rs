//! Error types for the room layer.
//!
//! Admission failures abort the join with no state mutated.
//! Reconnection window expiry and consented leave are not errors; they
//! are expected terminal outcomes of the leave flow.

use skirmish_protocol::{ClientId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Join options carried no usable client identity.
    #[error("a non-empty clientId is required to join")]
    MissingIdentity,

    /// The client identity is registered to a different room.
    #[error("client {0} is already in another room")]
    IdentityBoundElsewhere(ClientId),

    /// The client identity is already present among this room's players.
    #[error("client {0} is already in room {1}")]
    DuplicateIdentity(ClientId, RoomId),

    /// The room has no free slot, or the match already started.
    #[error("room {0} is not accepting players")]
    NotAccepting(RoomId),

    /// A reconnect was attempted with no open reconnection window.
    #[error("no pending reconnection for client {0}")]
    NoPendingReconnect(ClientId),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room's command channel is closed or full.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
