//! Reconnection token bookkeeping.
//!
//! When a client joins a room, the server hands it an opaque token.
//! If the connection drops, the client presents the token on a fresh
//! connection to resume the same room/session pairing instead of
//! re-joining from scratch. Tokens are redeemable exactly once; a
//! successful resume issues a new one.

use std::collections::HashMap;

use rand::Rng;
use skirmish_protocol::{ClientId, RoomId};

use crate::SessionError;

/// What a redeemed token resolves to: which client identity may resume,
/// and in which room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub client_id: ClientId,
    pub room_id: RoomId,
}

/// Issues and redeems reconnection tokens.
///
/// Not thread-safe by itself; the server owns one behind a mutex at a
/// higher level. At most one outstanding token per client identity:
/// issuing a new one invalidates the previous.
#[derive(Debug, Default)]
pub struct SessionManager {
    /// Outstanding tokens.
    tickets: HashMap<String, SessionTicket>,
    /// Index from client identity to its current token, kept in sync
    /// with `tickets` so re-issue and invalidation are O(1).
    by_client: HashMap<ClientId, String>,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for `client_id` in `room_id`, invalidating
    /// any previously issued token for that identity.
    pub fn issue(&mut self, client_id: ClientId, room_id: RoomId) -> String {
        if let Some(old) = self.by_client.remove(&client_id) {
            self.tickets.remove(&old);
        }

        let token = generate_token();
        self.tickets.insert(
            token.clone(),
            SessionTicket {
                client_id: client_id.clone(),
                room_id,
            },
        );
        self.by_client.insert(client_id.clone(), token.clone());

        tracing::debug!(%client_id, %room_id, "reconnection token issued");
        token
    }

    /// Redeems a token, consuming it.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownToken`] if the token was never
    /// issued or was already redeemed.
    pub fn redeem(&mut self, token: &str) -> Result<SessionTicket, SessionError> {
        let ticket = self
            .tickets
            .remove(token)
            .ok_or(SessionError::UnknownToken)?;
        self.by_client.remove(&ticket.client_id);
        tracing::debug!(client_id = %ticket.client_id, "reconnection token redeemed");
        Ok(ticket)
    }

    /// Drops any outstanding token for `client_id`. Called when a player
    /// is permanently evicted, so a stale token can't name a dead session.
    pub fn invalidate_client(&mut self, client_id: &ClientId) {
        if let Some(token) = self.by_client.remove(client_id) {
            self.tickets.remove(&token);
        }
    }

    /// Number of outstanding tokens.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Returns `true` if no tokens are outstanding.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy),
/// enough that guessing a live token is infeasible.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
