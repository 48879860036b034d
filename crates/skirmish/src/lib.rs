//! # Skirmish
//!
//! Real-time 1v1 match coordination server: rooms, reconnection
//! tickets, and a lobby, speaking JSON over WebSocket.
//!
//! Skirmish keeps the authoritative record of which player identity is
//! in which room. Each room runs as its own Tokio task; a process-wide
//! identity registry enforces one room per player, and bounded
//! reconnection windows let a dropped player resume their seat.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skirmish::{SkirmishServer, SkirmishError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SkirmishError> {
//!     skirmish::init_tracing();
//!     let server = SkirmishServer::builder()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::SkirmishError;
pub use server::{SkirmishServer, SkirmishServerBuilder};

pub use skirmish_protocol::{
    ClientId, ClientRequest, JoinOptions, RoomId, RoomMetadata, RoomStatus, ServerEvent, SessionId,
};
pub use skirmish_room::{RoomConfig, RoomError};

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info`.
///
/// Call once at startup; a second call panics, so binaries embedding
/// their own subscriber should skip this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
