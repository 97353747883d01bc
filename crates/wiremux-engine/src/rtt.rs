use std::time::{Duration, Instant};

/// Rough round-trip estimate from keep-alive probe timing.
///
/// The peer probes every advertised interval; a probe arriving later than
/// that carries the network delay in its lateness. This is a health signal,
/// not a measurement, since there is no echo to time against.
#[derive(Debug, Default)]
pub struct PingRttTracker {
    interval: Option<Duration>,
    last_ping: Option<Instant>,
    rtt: Option<Duration>,
}

impl PingRttTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected probe spacing from the handshake.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    /// Record a probe arrival.
    pub fn on_ping(&mut self, now: Instant) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_ping) {
            let elapsed = now.duration_since(last);
            if elapsed > interval {
                self.rtt = Some(elapsed - interval);
            }
        }
        self.last_ping = Some(now);
    }

    /// The current estimate, once two probes have been observed.
    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    /// Forget all timing state (used on disconnect).
    pub fn reset(&mut self) {
        self.last_ping = None;
        self.rtt = None;
    }
}
