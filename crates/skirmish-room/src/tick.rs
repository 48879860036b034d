//! Fixed-rate tick source for the room loop.

use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Fires at a fixed rate, or never if the rate is zero.
///
/// Missed ticks are skipped rather than bursted, so a room that stalls
/// under load resumes at the configured cadence instead of replaying
/// the backlog.
#[derive(Debug)]
pub struct Ticker {
    interval: Option<Interval>,
}

impl Ticker {
    /// Creates a ticker firing `rate_hz` times per second. A rate of 0
    /// yields a ticker that never fires.
    pub fn new(rate_hz: u32) -> Self {
        let interval = if rate_hz == 0 {
            None
        } else {
            let mut interval = interval(Duration::from_secs(1) / rate_hz);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(interval)
        };
        Self { interval }
    }

    /// Completes on the next tick. Pends forever for a zero-rate ticker,
    /// which makes it safe to poll inside a `select!` arm.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
