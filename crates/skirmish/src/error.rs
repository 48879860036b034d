//! Unified error type for the Skirmish server.

use skirmish_protocol::ProtocolError;
use skirmish_room::RoomError;
use skirmish_session::SessionError;
use skirmish_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad reconnection token).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (admission, reconnection, lookup).
    #[error(transparent)]
    Room(#[from] RoomError),
}
