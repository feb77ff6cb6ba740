//! Receive silence watchdog

use std::time::{Duration, Instant};

/// Tracks time since the receive lane last heard from the peer (or last
/// flushed), and says when stale audio should be flushed with silence.
#[derive(Debug, Clone)]
pub struct SilenceWatchdog {
    threshold: Duration,
    last_activity: Instant,
}

impl SilenceWatchdog {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_activity: now,
        }
    }

    /// Strictly longer than the threshold has passed
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.threshold
    }

    /// Restart the silence interval, after a datagram or a flush
    pub fn feed(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strict() {
        let start = Instant::now();
        let watchdog = SilenceWatchdog::new(Duration::from_millis(100), start);
        assert!(!watchdog.expired(start));
        assert!(!watchdog.expired(start + Duration::from_millis(100)));
        assert!(watchdog.expired(start + Duration::from_millis(101)));
    }

    #[test]
    fn test_feed_restarts_interval() {
        let start = Instant::now();
        let mut watchdog = SilenceWatchdog::new(Duration::from_millis(100), start);
        watchdog.feed(start + Duration::from_millis(150));
        assert!(!watchdog.expired(start + Duration::from_millis(200)));
        assert!(watchdog.expired(start + Duration::from_millis(251)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_expiry() {
        let start = Instant::now() + Duration::from_secs(1);
        let watchdog = SilenceWatchdog::new(Duration::from_millis(100), start);
        assert!(!watchdog.expired(start - Duration::from_millis(500)));
    }
}
