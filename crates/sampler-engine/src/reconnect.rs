//! Reconnect policy for disconnected sources

use std::time::Duration;

/// Fixed-interval retry policy
///
/// A source that has never been tried is retried immediately; afterwards at
/// most one attempt is allowed per interval. There is no backoff growth and
/// no attempt limit.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSupervisor {
    interval_ms: u64,
}

impl ReconnectSupervisor {
    /// Create a supervisor with the given retry interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Retry interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Whether a disconnected source whose last attempt was at
    /// `last_attempt_ms` may try again at `now_ms`
    pub fn should_attempt(&self, last_attempt_ms: Option<u64>, now_ms: u64) -> bool {
        match last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_attempts(supervisor: &ReconnectSupervisor, clock: impl Iterator<Item = u64>) -> usize {
        let mut last = None;
        let mut attempts = 0;
        for now in clock {
            if supervisor.should_attempt(last, now) {
                last = Some(now);
                attempts += 1;
            }
        }
        attempts
    }

    #[test]
    fn test_first_attempt_is_immediate() {
        let supervisor = ReconnectSupervisor::default();
        assert!(supervisor.should_attempt(None, 0));
        assert!(supervisor.should_attempt(None, 1_700_000_000_000));
    }

    #[test]
    fn test_interval_respected() {
        let supervisor = ReconnectSupervisor::default();
        assert!(!supervisor.should_attempt(Some(5000), 5000));
        assert!(!supervisor.should_attempt(Some(5000), 5999));
        assert!(supervisor.should_attempt(Some(5000), 6000));
    }

    #[test]
    fn test_clock_stepping_backwards_does_not_retry() {
        let supervisor = ReconnectSupervisor::default();
        assert!(!supervisor.should_attempt(Some(5000), 4000));
    }

    #[test]
    fn test_five_second_outage() {
        let supervisor = ReconnectSupervisor::default();
        let start = 1_700_000_000_000u64;

        // Every millisecond
        let attempts = count_attempts(&supervisor, start..start + 5000);
        assert!((4..=5).contains(&attempts), "attempts = {attempts}");

        // Loop woken at an interval that does not divide the retry interval
        let jittered = (start..start + 5000).step_by(23);
        let attempts = count_attempts(&supervisor, jittered);
        assert!((4..=5).contains(&attempts), "attempts = {attempts}");
    }
}
