//! Outbound heartbeat pacing
//!
//! The next heartbeat is due one interval after the previous send, measured
//! from when the send actually happened. A late send therefore pushes the
//! schedule back instead of firing a catch-up burst.

use std::time::Duration;
use tokio::time::Instant;

/// Default interval between outbound heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Tracks when the last heartbeat went out and when the next one is due.
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval: Duration,
    last_sent_at: Option<Instant>,
}

impl HeartbeatScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_sent_at: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    /// Time left until the next heartbeat is due.
    ///
    /// A full interval before the first send, otherwise what remains of the
    /// interval since the last send (never negative).
    pub fn delay(&self, now: Instant) -> Duration {
        match self.last_sent_at {
            None => self.interval,
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Absolute deadline of the next heartbeat.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        now + self.delay(now)
    }

    /// Record a completed send.
    pub fn record_sent(&mut self, at: Instant) {
        self.last_sent_at = Some(at);
    }
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_delay_is_full_interval() {
        let scheduler = HeartbeatScheduler::default();
        assert_eq!(scheduler.delay(Instant::now()), Duration::from_millis(1000));
    }

    #[test]
    fn delay_shrinks_with_elapsed_time() {
        let start = Instant::now();
        let mut scheduler = HeartbeatScheduler::new(Duration::from_millis(1000));
        scheduler.record_sent(start);

        assert_eq!(scheduler.delay(start + Duration::from_millis(300)), Duration::from_millis(700));
        assert_eq!(scheduler.delay(start + Duration::from_millis(1500)), Duration::ZERO);
        assert_eq!(scheduler.next_deadline(start), start + Duration::from_millis(1000));
    }

    proptest! {
        /// Sends that happen whenever the deadline is reached, plus arbitrary
        /// lateness, are never closer together than the interval and the
        /// schedule does not drift once lateness stops.
        #[test]
        fn sends_are_spaced_at_least_one_interval(
            interval_ms in 10u64..2000,
            lateness_ms in proptest::collection::vec(0u64..500, 1..20),
        ) {
            let interval = Duration::from_millis(interval_ms);
            let mut scheduler = HeartbeatScheduler::new(interval);
            let mut now = Instant::now();
            let mut sends = Vec::new();

            for late in lateness_ms {
                now = scheduler.next_deadline(now) + Duration::from_millis(late);
                scheduler.record_sent(now);
                sends.push(now);
            }

            for pair in sends.windows(2) {
                prop_assert!(pair[1] - pair[0] >= interval);
            }

            // On-time sends return to exact spacing
            let last = *sends.last().unwrap();
            let next = scheduler.next_deadline(last);
            prop_assert_eq!(next - last, interval);
        }
    }
}
