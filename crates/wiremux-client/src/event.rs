//! Event-handler tables.
//!
//! An inbound event carries either a decoded-text payload or raw attachment
//! bytes, so handlers register against (event name, payload kind); text
//! and binary handlers live in separate tables. Registration hands back a
//! [`HandlerId`]; removal goes by id, and each registration is distinct, so
//! the same closure body can never be double-registered under one id.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::dispatch::Dispatcher;

/// Opaque handle identifying one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type TextHandler = Arc<dyn Fn(Option<&str>) + Send + Sync>;
type BinaryHandler = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Ordered handler lists per event name, split by payload kind.
#[derive(Default)]
pub struct EventRegistry {
    text: HashMap<String, Vec<(HandlerId, TextHandler)>>,
    binary: HashMap<String, Vec<(HandlerId, BinaryHandler)>>,
    next_id: u64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    /// Register a text-payload handler for `event`.
    pub fn on(
        &mut self,
        event: &str,
        handler: impl Fn(Option<&str>) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.mint();
        self.text
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Register a binary-payload handler for `event`.
    pub fn on_binary(
        &mut self,
        event: &str,
        handler: impl Fn(&Bytes) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.mint();
        self.binary
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one registration by id. Returns whether anything was removed.
    pub fn off(&mut self, event: &str, id: HandlerId) -> bool {
        let mut removed = false;
        if let Some(list) = self.text.get_mut(event) {
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            removed |= list.len() != before;
        }
        if let Some(list) = self.binary.get_mut(event) {
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Defer every text handler for `event` onto the dispatch queue.
    pub fn emit(&self, event: &str, payload: Option<String>, dispatcher: &Dispatcher) {
        let Some(list) = self.text.get(event) else {
            return;
        };
        for (_, handler) in list {
            let handler = Arc::clone(handler);
            let payload = payload.clone();
            dispatcher.enqueue(move || handler(payload.as_deref()));
        }
    }

    /// Defer every binary handler for `event` onto the dispatch queue.
    pub fn emit_binary(&self, event: &str, data: Bytes, dispatcher: &Dispatcher) {
        let Some(list) = self.binary.get(event) else {
            return;
        };
        for (_, handler) in list {
            let handler = Arc::clone(handler);
            let data = data.clone();
            dispatcher.enqueue(move || handler(&data));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let mut registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.on("chat", move |payload| {
                seen.lock().unwrap().push((tag, payload.map(str::to_owned)));
            });
        }

        registry.emit("chat", Some("hi".into()), &dispatcher);
        dispatcher.drain();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("first", Some("hi".to_string())));
        assert_eq!(seen[1], ("second", Some("hi".to_string())));
    }

    #[test]
    fn test_off_removes_only_that_registration() {
        let dispatcher = Dispatcher::new();
        let mut registry = EventRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let keep = Arc::clone(&count);
        registry.on("e", move |_| {
            keep.fetch_add(1, Ordering::SeqCst);
        });
        let drop_me = Arc::clone(&count);
        let id = registry.on("e", move |_| {
            drop_me.fetch_add(10, Ordering::SeqCst);
        });

        assert!(registry.off("e", id));
        assert!(!registry.off("e", id));

        registry.emit("e", None, &dispatcher);
        dispatcher.drain();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_text_and_binary_tables_are_independent() {
        let dispatcher = Dispatcher::new();
        let mut registry = EventRegistry::new();
        let text_hits = Arc::new(AtomicUsize::new(0));
        let binary_hits = Arc::new(AtomicUsize::new(0));

        let t = Arc::clone(&text_hits);
        registry.on("data", move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        let b = Arc::clone(&binary_hits);
        registry.on_binary("data", move |bytes| {
            assert_eq!(bytes.as_ref(), b"\x01");
            b.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit_binary("data", Bytes::from_static(b"\x01"), &dispatcher);
        dispatcher.drain();
        assert_eq!(text_hits.load(Ordering::SeqCst), 0);
        assert_eq!(binary_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_for_unknown_event_is_noop() {
        let dispatcher = Dispatcher::new();
        let registry = EventRegistry::new();
        registry.emit("nobody", None, &dispatcher);
        assert!(dispatcher.is_empty());
    }
}
