//! Shared contracts for Skirmish.
//!
//! This crate defines everything the match coordination core and its
//! collaborators agree on:
//!
//! - **Identity** ([`ClientId`], [`SessionId`], [`RoomId`]) — the stable
//!   client identity, the per-connection session identity, and room ids.
//! - **Messages** ([`ClientRequest`], [`ServerEvent`], [`GameCommand`]) —
//!   what travels between a client and the server.
//! - **Metadata** ([`RoomMetadata`], [`RoomStatus`]) — the discoverable
//!   room summary consumed by the lobby.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become
//!   bytes and back.
//!
//! The protocol layer knows nothing about connections or rooms; it only
//! defines shapes. Field names serialize in camelCase to match the
//! browser client.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientId, ClientRequest, GameCommand, JoinOptions, PlayerEntry, RoomId,
    RoomMetadata, RoomStatus, ServerEvent, SessionId, StartingPlayer,
};
