//! Core protocol types for Skirmish.
//!
//! Two distinct notions of identity run through the whole system and are
//! easy to confuse, so they get separate newtypes:
//!
//! - [`ClientId`] — a stable, caller-supplied string identifying a human.
//!   It survives reconnects and is the key the identity registry and the
//!   eviction logic operate on.
//! - [`SessionId`] — the transport-assigned identifier for one physical
//!   connection. A new one is minted on every reconnect.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identity of a human player, supplied by the client at join time.
///
/// Opaque to the server: never generated, parsed, or interpreted here,
/// only compared. `#[serde(transparent)]` keeps it a plain JSON string
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one physical connection, minted by the transport layer.
///
/// Invalidated by every reconnect; room logic that must survive a
/// reconnect keys on [`ClientId`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Returns the session identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a room (one match instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room status and metadata
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
///
/// ```text
/// waiting ──(2nd player joins)──→ running ──(match concludes)──→ finished
/// ```
///
/// The transition out of `Waiting` fires exactly once: admission control
/// rejects joins from then on, so there is no path back. A disconnect
/// during `Running` does not regress the status — it reflects match
/// progress, not current occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Running,
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Discoverable room summary, published to the lobby on every membership
/// or status change.
///
/// `player_count` counts *connected* players only — a room with one
/// player mid-reconnect advertises a count of 1, not 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    pub player_count: usize,
    pub max_players: usize,
    pub status: RoomStatus,
    pub map_width: u32,
    pub map_height: u32,
}

impl RoomMetadata {
    /// The listing rule: a room is joinable while it is still waiting
    /// and has a free slot.
    pub fn is_joinable(&self) -> bool {
        self.status == RoomStatus::Waiting && self.player_count < self.max_players
    }
}

// ---------------------------------------------------------------------------
// Join options
// ---------------------------------------------------------------------------

/// Caller-supplied options for joining or creating a room.
///
/// `client_id` is required by admission control but optional on the wire
/// so a missing field decodes cleanly and is rejected with a descriptive
/// cause instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl JoinOptions {
    /// Extracts a usable client identity, treating a missing or empty
    /// string as absent.
    pub fn identity(&self) -> Option<ClientId> {
        self.client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(ClientId::from)
    }
}

// ---------------------------------------------------------------------------
// Player snapshots
// ---------------------------------------------------------------------------

/// One entry of a `playerList` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    /// Current session identity (changes across reconnects).
    pub id: SessionId,
    /// Stable client identity.
    pub client_id: ClientId,
    pub name: String,
    pub color: String,
    pub resources: u32,
    pub connected: bool,
}

/// Reduced player view broadcast in `gameStarted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingPlayer {
    pub id: SessionId,
    pub name: String,
    pub color: String,
}

// ---------------------------------------------------------------------------
// Game commands (stubs)
// ---------------------------------------------------------------------------

/// In-match commands from a client.
///
/// The simulation itself (movement, combat, economy) is not part of the
/// coordination core — these are accepted and logged so clients have a
/// stable wire shape to build against, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameCommand {
    #[serde(rename_all = "camelCase")]
    Move {
        unit_ids: Vec<String>,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    Attack {
        unit_ids: Vec<String>,
        target_id: String,
    },
}

// ---------------------------------------------------------------------------
// Client → server requests
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "joinRoom", "roomId": 3, "options": { "clientId": "c-1" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Create a fresh room and join it.
    CreateRoom { options: JoinOptions },

    /// Join a specific room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        options: JoinOptions,
    },

    /// Resume a disconnected session using a reconnection token.
    Resume { token: String },

    /// Voluntarily leave the current room (consented leave — skips the
    /// reconnection window).
    Leave,

    /// Start receiving lobby add/update/remove events.
    SubscribeLobby,

    /// An in-match command, routed to the current room.
    Game { command: GameCommand },
}

// ---------------------------------------------------------------------------
// Server → client events
// ---------------------------------------------------------------------------

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Acknowledges a successful join, create, or resume.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        session_id: SessionId,
        /// Opaque credential, redeemable once to resume this session.
        reconnect_token: String,
    },

    /// Full ordered player list. Sent to a joining client right after
    /// admission and broadcast to all occupants after every membership
    /// or connectivity change.
    PlayerList { players: Vec<PlayerEntry> },

    /// Broadcast exactly once, at the waiting → running transition.
    GameStarted { players: Vec<StartingPlayer> },

    /// A room appeared in or changed inside the lobby listing.
    #[serde(rename_all = "camelCase")]
    LobbyUpdate {
        room_id: RoomId,
        metadata: RoomMetadata,
    },

    /// A room left the lobby listing.
    #[serde(rename_all = "camelCase")]
    LobbyRemoved { room_id: RoomId },

    /// A request failed; `message` carries the cause.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
