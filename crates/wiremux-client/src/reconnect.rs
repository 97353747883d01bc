//! Backoff-delayed reconnection scheduling.
//!
//! One scheduler per client, alive for the client's whole lifetime: the
//! only object whose identity survives reconnect cycles, which is what
//! makes start/stop idempotent and race-free across them. Polled, never
//! self-scheduling: each tick returns a step command for the owner to act
//! on, so the scheduler never needs a handle back into the client.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

/// Floor applied to jittered delays so perturbation can't produce a
/// zero or negative wait.
const MIN_JITTERED_DELAY: Duration = Duration::from_millis(100);

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Factor applied per attempt (2.0 doubles each time).
    pub multiplier: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Attempt limit; zero or negative means unlimited.
    pub max_attempts: i32,
    /// Random perturbation as a fraction of the delay, `0.0..=0.5`.
    pub jitter_fraction: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: -1,
            jitter_fraction: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Fast retry with short delays, for local development.
    pub fn aggressive() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            jitter_fraction: 0.1,
            ..Self::default()
        }
    }

    /// Slower retry with longer delays, easier on production peers.
    pub fn conservative() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            multiplier: 2.5,
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.15,
            ..Self::default()
        }
    }
}

/// What the owner should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Nothing due.
    Idle,
    /// Fire a reconnection attempt now (1-based attempt number).
    Attempt(u32),
    /// The attempt budget is spent; the scheduler has stopped for good.
    Exhausted,
}

pub struct ReconnectScheduler {
    config: ReconnectConfig,
    enabled: bool,
    attempt: u32,
    next_attempt_at: Instant,
    rng: XorShift,
}

impl ReconnectScheduler {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            enabled: false,
            attempt: 0,
            next_attempt_at: Instant::now(),
            rng: XorShift::from_clock(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.enabled
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Begin scheduling attempts. Idempotent: while already running, the
    /// attempt counter and the pending schedule are left untouched;
    /// duplicate concurrent reconnection loops are the failure mode this
    /// guards against. The attempt counter carries over from a previous
    /// stop, so a flapping connection keeps backing off; only
    /// [`ReconnectScheduler::reset`] zeroes it.
    pub fn start(&mut self, now: Instant) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.schedule_next(now);
    }

    /// Halt without resetting the attempt count.
    pub fn stop(&mut self) {
        self.enabled = false;
    }

    /// Halt and zero the attempt count (confirmed successful reconnect).
    pub fn reset(&mut self) {
        self.enabled = false;
        self.attempt = 0;
    }

    /// Poll the schedule.
    pub fn tick(&mut self, now: Instant) -> ReconnectStep {
        if !self.enabled {
            return ReconnectStep::Idle;
        }

        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts as u32 {
            info!(max_attempts = self.config.max_attempts, "reconnect attempts exhausted");
            self.stop();
            return ReconnectStep::Exhausted;
        }

        if now < self.next_attempt_at {
            return ReconnectStep::Idle;
        }

        self.attempt += 1;
        debug!(attempt = self.attempt, "reconnect attempt due");
        self.schedule_next(now);
        ReconnectStep::Attempt(self.attempt)
    }

    fn schedule_next(&mut self, now: Instant) {
        let mut delay = self.base_delay(self.attempt);

        if self.config.jitter_fraction > 0.0 {
            let jitter = delay.as_secs_f64() * self.config.jitter_fraction;
            let offset = (self.rng.next_f64() * 2.0 - 1.0) * jitter;
            let jittered = (delay.as_secs_f64() + offset).max(MIN_JITTERED_DELAY.as_secs_f64());
            delay = Duration::from_secs_f64(jittered);
        }

        self.next_attempt_at = now + delay;
        debug!(attempt = self.attempt + 1, ?delay, "next reconnect scheduled");
    }

    /// Un-jittered delay ahead of attempt number `attempt + 1`:
    /// `min(initial_delay * multiplier^attempt, max_delay)`.
    fn base_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay.as_secs_f64()
            * self.config.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::from_secs_f64(base.min(self.config.max_delay.as_secs_f64()))
    }
}

/// Minimal xorshift PRNG for jitter. Not security-relevant; seeded from
/// the wall clock so separate clients desynchronize.
struct XorShift(u64);

impl XorShift {
    fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e37_79b9_7f4a_7c15);
        Self(seed | 1)
    }

    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}
