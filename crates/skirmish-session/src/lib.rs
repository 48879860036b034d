//! Identity bookkeeping for Skirmish.
//!
//! Two pieces live here, both keyed on the stable client identity:
//!
//! 1. **Identity registry** ([`ClientRegistry`]) — the process-wide
//!    mapping from client identity to the room it currently occupies.
//!    This is the one invariant that crosses room boundaries: a client
//!    identity belongs to at most one room at a time.
//! 2. **Reconnection tokens** ([`SessionManager`]) — opaque one-shot
//!    credentials a client can redeem to resume a specific room/session
//!    pairing after a transient disconnect.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← consults/updates the registry on join/evict
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below) ← provides ClientId, RoomId
//! ```

mod error;
mod manager;
mod registry;

pub use error::SessionError;
pub use manager::{SessionManager, SessionTicket};
pub use registry::ClientRegistry;
