//! Tick scheduling
//!
//! Ticks fall on multiples of the period measured from the Unix epoch, not
//! from process start. When the loop falls behind by several periods only
//! one tick fires; the boundary then skips ahead past `now`.

use std::time::Duration;

/// Epoch-aligned fixed-period tick scheduler
#[derive(Debug, Clone)]
pub struct TickScheduler {
    period_ms: u64,
    next_tick_ms: u64,
}

impl TickScheduler {
    /// Create a scheduler whose first tick is the next boundary after `now_ms`
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            period_ms,
            next_tick_ms: now_ms + (period_ms - now_ms % period_ms),
        }
    }

    /// Tick period in milliseconds
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Nominal timestamp of the next tick
    pub fn next_tick_ms(&self) -> u64 {
        self.next_tick_ms
    }

    /// Time left until the next tick, zero if it is already due
    pub fn time_until_next(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.next_tick_ms.saturating_sub(now_ms))
    }

    /// How long the multiplexer may block, capped at `max_wait`
    pub fn wait_budget(&self, now_ms: u64, max_wait: Duration) -> Duration {
        self.time_until_next(now_ms).min(max_wait)
    }

    /// Fire the tick if it is due
    ///
    /// Returns the nominal timestamp of the tick that fired and advances the
    /// boundary to the first one strictly after `now_ms`.
    pub fn poll_tick(&mut self, now_ms: u64) -> Option<u64> {
        if now_ms < self.next_tick_ms {
            return None;
        }

        let fired = self.next_tick_ms;
        let behind = (now_ms - self.next_tick_ms) / self.period_ms + 1;
        self.next_tick_ms += behind * self.period_ms;

        if behind > 1 {
            tracing::debug!(
                "Tick {} fired late at {}, skipped {} boundaries",
                fired,
                now_ms,
                behind - 1
            );
        }

        Some(fired)
    }
}
