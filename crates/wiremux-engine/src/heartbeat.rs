use std::time::{Duration, Instant};

/// Liveness watchdog for an open session.
///
/// The peer probes every `interval`; a probe may be late by up to `timeout`.
/// The deadline is therefore `last_liveness + interval + timeout`, and it is
/// checked by polling; the monitor fires its timeout at most once per
/// `start`, then deactivates.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    window: Option<Window>,
}

#[derive(Debug)]
struct Window {
    last_liveness: Instant,
    interval: Duration,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin watching, with `now` as the first liveness confirmation.
    pub fn start(&mut self, now: Instant, interval: Duration, timeout: Duration) {
        self.window = Some(Window {
            last_liveness: now,
            interval,
            timeout,
        });
    }

    /// Record a liveness confirmation (a probe arrived).
    pub fn on_liveness(&mut self, now: Instant) {
        if let Some(window) = self.window.as_mut() {
            window.last_liveness = now;
        }
    }

    /// Deactivate without firing.
    pub fn stop(&mut self) {
        self.window = None;
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// The instant past which the session is considered dead, while active.
    pub fn deadline(&self) -> Option<Instant> {
        self.window
            .as_ref()
            .map(|w| w.last_liveness + w.interval + w.timeout)
    }

    /// Poll the deadline. Returns true exactly once when it has passed,
    /// deactivating the monitor.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline() else {
            return false;
        };
        if now > deadline {
            self.window = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(25_000);
    const TIMEOUT: Duration = Duration::from_millis(5_000);

    #[test]
    fn test_deadline_is_interval_plus_timeout() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new();
        monitor.start(start, INTERVAL, TIMEOUT);

        assert_eq!(monitor.deadline(), Some(start + Duration::from_millis(30_000)));
        assert!(!monitor.tick(start + Duration::from_millis(30_000)));
        assert!(monitor.tick(start + Duration::from_millis(30_001)));
    }

    #[test]
    fn test_liveness_resets_deadline() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new();
        monitor.start(start, INTERVAL, TIMEOUT);

        monitor.on_liveness(start + Duration::from_millis(10_000));
        assert_eq!(monitor.deadline(), Some(start + Duration::from_millis(40_000)));
        assert!(!monitor.tick(start + Duration::from_millis(35_000)));
        assert!(monitor.tick(start + Duration::from_millis(40_001)));
    }

    #[test]
    fn test_fires_at_most_once() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new();
        monitor.start(start, INTERVAL, TIMEOUT);

        let late = start + Duration::from_millis(60_000);
        assert!(monitor.tick(late));
        assert!(!monitor.tick(late));
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_stop_deactivates_without_firing() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new();
        monitor.start(start, INTERVAL, TIMEOUT);

        monitor.stop();
        assert!(!monitor.is_active());
        assert!(!monitor.tick(start + Duration::from_millis(60_000)));
    }
}
