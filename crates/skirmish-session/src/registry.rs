//! The process-wide client identity registry.
//!
//! Every room consults this before admitting a player and releases its
//! claim on permanent eviction or disposal. The registry is the only
//! state shared across room actors, so it must tolerate concurrent
//! access; everything else about a room is single-actor-owned.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use skirmish_protocol::{ClientId, RoomId};

/// Maps each client identity to the room it currently occupies.
///
/// All operations are synchronous, non-blocking, and O(1); none may
/// suspend, so a plain `std::sync::Mutex` is the right primitive here
/// (the lock is never held across an `.await`).
///
/// Constructed once at process start and handed to every room by
/// reference (`Arc<ClientRegistry>`), not reached through a global, so
/// tests can build isolated instances.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: Mutex<HashMap<ClientId, RoomId>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `client_id` for `room_id`.
    ///
    /// Returns `true` if the identity was unmapped (claim created) or
    /// already mapped to `room_id` (idempotent re-assert, used on
    /// reconnect). Returns `false` without mutating anything if the
    /// identity is mapped to a *different* room — an existing mapping
    /// is never silently overwritten.
    pub fn register(&self, client_id: &ClientId, room_id: RoomId) -> bool {
        let mut map = self.lock();
        match map.get(client_id) {
            Some(existing) if *existing != room_id => false,
            _ => {
                map.insert(client_id.clone(), room_id);
                true
            }
        }
    }

    /// Releases the claim on `client_id`, but only if it currently
    /// points to `room_id`.
    ///
    /// The conditional guards against a stale release racing a fresh
    /// registration for the same identity in a new room, which makes
    /// this safe to call unconditionally during cleanup.
    pub fn unregister(&self, client_id: &ClientId, room_id: RoomId) {
        let mut map = self.lock();
        if map.get(client_id) == Some(&room_id) {
            map.remove(client_id);
        }
    }

    /// Returns `true` if the identity currently occupies any room.
    pub fn is_registered(&self, client_id: &ClientId) -> bool {
        self.lock().contains_key(client_id)
    }

    /// Returns the room the identity currently occupies, if any.
    pub fn room_of(&self, client_id: &ClientId) -> Option<RoomId> {
        self.lock().get(client_id).copied()
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no identities are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, RoomId>> {
        // A poisoned lock means a panic elsewhere; the map itself is
        // still coherent (every mutation is a single insert/remove).
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =========================================================================
// Tests
// =========================================================================
