//! Acknowledgement correlation.
//!
//! A correlated emit registers a callback here under a freshly minted id;
//! the peer's Ack (or BinaryAck) resolves it. Unresolved entries expire
//! silently: an expired or unknown id is a normal protocol occurrence,
//! never an error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use wiremux_packet::ArgValue;

use crate::dispatch::Dispatcher;

/// What an acknowledgement hands back to its callback.
#[derive(Debug, Clone)]
pub enum AckPayload {
    /// Raw encoded argument list from a plain Ack.
    Text(Option<String>),
    /// Substituted argument list from a BinaryAck.
    Binary(Vec<ArgValue>),
}

pub type AckCallback = Box<dyn FnOnce(AckPayload) + Send>;

struct PendingAck {
    callback: AckCallback,
    expires_at: Instant,
}

/// Maps correlation ids to pending callbacks with absolute expiries.
///
/// Ids are positive, minted monotonically from 1, and wrap past `i64::MAX`
/// back to 1; 0 and negative values are never valid.
#[derive(Default)]
pub struct AckTracker {
    pending: HashMap<i64, PendingAck>,
    next_id: i64,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id and store the callback with `expiry = now + timeout`.
    pub fn register(&mut self, callback: AckCallback, timeout: Duration, now: Instant) -> i64 {
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id <= 0 {
            self.next_id = 1;
        }
        let id = self.next_id;

        self.pending.insert(
            id,
            PendingAck {
                callback,
                expires_at: now + timeout,
            },
        );
        trace!(id, ?timeout, "ack registered");
        id
    }

    /// Remove the entry and defer its callback onto the dispatch queue.
    /// Returns false when `id` is unknown: already resolved, expired, or
    /// never minted.
    pub fn resolve(&mut self, id: i64, payload: AckPayload, dispatcher: &Dispatcher) -> bool {
        let Some(entry) = self.pending.remove(&id) else {
            trace!(id, "ack not found (expired or already resolved)");
            return false;
        };
        let callback = entry.callback;
        dispatcher.enqueue(move || callback(payload));
        trace!(id, "ack resolved");
        true
    }

    /// Discard every entry whose expiry has passed, without firing.
    pub fn sweep_expired(&mut self, now: Instant) {
        if self.pending.is_empty() {
            return;
        }
        self.pending.retain(|id, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                debug!(id, "ack expired");
            }
            keep
        });
    }

    /// Discard every entry without firing (used on disconnect).
    pub fn purge_all(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "purging pending acks");
            self.pending.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn noop() -> AckCallback {
        Box::new(|_| {})
    }

    #[test]
    fn test_ids_mint_from_one() {
        let now = Instant::now();
        let mut tracker = AckTracker::new();
        assert_eq!(tracker.register(noop(), TIMEOUT, now), 1);
        assert_eq!(tracker.register(noop(), TIMEOUT, now), 2);
    }

    #[test]
    fn test_id_wraps_past_max_to_one() {
        let now = Instant::now();
        let mut tracker = AckTracker::new();
        tracker.next_id = i64::MAX - 1;

        assert_eq!(tracker.register(noop(), TIMEOUT, now), i64::MAX);
        // Never 0 or negative.
        assert_eq!(tracker.register(noop(), TIMEOUT, now), 1);
        assert_eq!(tracker.register(noop(), TIMEOUT, now), 2);
    }

    #[test]
    fn test_resolve_fires_through_dispatcher() {
        let now = Instant::now();
        let dispatcher = Dispatcher::new();
        let mut tracker = AckTracker::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let id = tracker.register(
            Box::new(move |payload| {
                assert!(matches!(payload, AckPayload::Text(Some(_))));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            TIMEOUT,
            now,
        );

        assert!(tracker.resolve(id, AckPayload::Text(Some("[\"ok\"]".into())), &dispatcher));
        // Deferred until the tick drains the queue.
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        dispatcher.drain();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Second resolution of the same id is a no-op.
        assert!(!tracker.resolve(id, AckPayload::Text(None), &dispatcher));
    }

    #[test]
    fn test_expired_entries_swept_without_firing() {
        let now = Instant::now();
        let dispatcher = Dispatcher::new();
        let mut tracker = AckTracker::new();
        let id = tracker.register(
            Box::new(|_| panic!("expired ack must not fire")),
            TIMEOUT,
            now,
        );

        tracker.sweep_expired(now + TIMEOUT + Duration::from_millis(1));
        assert!(tracker.is_empty());
        assert!(!tracker.resolve(id, AckPayload::Text(None), &dispatcher));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_sweep_keeps_live_entries() {
        let now = Instant::now();
        let mut tracker = AckTracker::new();
        tracker.register(noop(), Duration::from_secs(1), now);
        tracker.register(noop(), Duration::from_secs(10), now);

        tracker.sweep_expired(now + Duration::from_secs(5));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_purge_discards_everything_silently() {
        let now = Instant::now();
        let dispatcher = Dispatcher::new();
        let mut tracker = AckTracker::new();
        let id = tracker.register(
            Box::new(|_| panic!("purged ack must not fire")),
            TIMEOUT,
            now,
        );

        tracker.purge_all();
        assert!(!tracker.resolve(id, AckPayload::Text(None), &dispatcher));
        assert!(dispatcher.is_empty());
    }
}
