//! Match room lifecycle management for Skirmish.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! player set, lifecycle status, tick counter, and reconnection windows.
//! The only state a room shares with the rest of the process is the
//! [`ClientRegistry`](skirmish_session::ClientRegistry), consulted on
//! join and released on eviction.
//!
//! # Key types
//!
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomManager`] — creates/disposes rooms, owns the lobby publisher
//! - [`RoomConfig`] — capacity, tick rate, map size, reconnect window
//! - [`LobbyPublisher`] — fan-out of room metadata to browsing clients

mod config;
mod error;
mod lobby;
mod manager;
mod room;
mod tick;

pub use config::{player_color, RoomConfig, PLAYER_COLORS, STARTING_RESOURCES};
pub use error::RoomError;
pub use lobby::{LobbyEvent, LobbyPublisher};
pub use manager::RoomManager;
pub use room::{spawn_room, Player, PlayerSender, RoomHandle, RoomSnapshot};
pub use tick::Ticker;
