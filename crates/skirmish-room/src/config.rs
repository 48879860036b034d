//! Room configuration.

use std::time::Duration;

/// Fixed color palette, assigned round-robin by join order: the first
/// joiner gets index 0, the second index 1. Clients rely on this
/// color-to-join-order correspondence, so the tie-break is part of the
/// contract, not a cosmetic detail.
pub const PLAYER_COLORS: [&str; 2] = ["#ff0000", "#0000ff"];

/// Starting resource counter for every player.
pub const STARTING_RESOURCES: u32 = 1000;

/// Returns the palette color for the given occupancy index.
pub fn player_color(index: usize) -> &'static str {
    PLAYER_COLORS[index % PLAYER_COLORS.len()]
}

/// Configuration for a room instance.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Players needed to start, and the hard occupancy cap. A 1v1 match
    /// is exactly two.
    pub max_players: usize,

    /// Simulation tick rate in Hz. 0 disables the tick loop.
    pub tick_rate_hz: u32,

    /// Map dimensions, advertised in room metadata.
    pub map_width: u32,
    pub map_height: u32,

    /// How long a disconnected player may take to reconnect before
    /// being evicted.
    ///
    /// `None` means the window never expires on its own; it only closes
    /// through an explicit rejection or a superseding consented leave.
    /// This matches deployments where matches wait indefinitely for the
    /// human to return.
    pub reconnect_window: Option<Duration>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            tick_rate_hz: 10,
            map_width: 40,
            map_height: 22,
            reconnect_window: None,
        }
    }
}
