//! One named channel's session over the shared connection.
//!
//! A channel joins, receives events, and acknowledges independently of the
//! transport session: the connection being open says nothing about whether
//! a given channel is connected, and a rejected channel leaves the rest of
//! the session untouched.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, trace, warn};
use wiremux_packet::{ArgValue, BinaryMessage, Packet, PacketKind};

use crate::ack::{AckCallback, AckPayload, AckTracker};
use crate::dispatch::Dispatcher;
use crate::event::{EventRegistry, HandlerId};

/// Synthetic local event fired when the channel connects.
pub const EVENT_CONNECT: &str = "connect";
/// Synthetic local event fired when the peer rejects the channel.
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

/// Per-channel connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    /// Connect request sent, answer pending.
    Connecting,
    Connected,
    /// The peer refused the join (the authentication-rejection path).
    Rejected,
}

pub struct Channel {
    path: String,
    /// Connection-time only; immutable for the channel's whole life.
    auth: Option<Value>,
    state: ChannelState,
    events: EventRegistry,
    acks: AckTracker,
}

impl Channel {
    pub(crate) fn new(path: impl Into<String>, auth: Option<Value>) -> Self {
        Self {
            path: path.into(),
            auth,
            state: ChannelState::Disconnected,
            events: EventRegistry::new(),
            acks: AckTracker::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Number of acknowledgements still awaiting an answer.
    pub fn pending_ack_count(&self) -> usize {
        self.acks.len()
    }

    /// Register a text-payload handler. See [`EVENT_CONNECT`] and
    /// [`EVENT_CONNECT_ERROR`] for the synthetic lifecycle events.
    pub fn on(
        &mut self,
        event: &str,
        handler: impl Fn(Option<&str>) + Send + Sync + 'static,
    ) -> HandlerId {
        self.events.on(event, handler)
    }

    /// Register a binary-payload handler.
    pub fn on_binary(
        &mut self,
        event: &str,
        handler: impl Fn(&Bytes) + Send + Sync + 'static,
    ) -> HandlerId {
        self.events.on_binary(event, handler)
    }

    /// Remove a handler registration.
    pub fn off(&mut self, event: &str, id: HandlerId) -> bool {
        self.events.off(event, id)
    }

    // ---- packet construction (sending goes through the owning client) ----

    /// Build this channel's Connect request and mark it Connecting.
    /// No-op when already connected.
    pub(crate) fn connect_packet(&mut self) -> Option<Packet> {
        if self.state == ChannelState::Connected {
            return None;
        }
        debug!(path = %self.path, "joining channel");
        self.state = ChannelState::Connecting;
        Some(Packet::connect(self.path.clone(), self.auth.as_ref()))
    }

    /// Build an Event packet, minting a correlation id when an ack callback
    /// is supplied. No-op when the channel is not connected.
    pub(crate) fn emit(
        &mut self,
        event: &str,
        payload: &Value,
        ack: Option<AckCallback>,
        timeout: Duration,
        now: Instant,
    ) -> Option<Packet> {
        if self.state != ChannelState::Connected {
            trace!(path = %self.path, event, "emit dropped, channel not connected");
            return None;
        }

        let correlation_id = ack.map(|callback| self.acks.register(callback, timeout, now));
        let args = serde_json::json!([event, payload]);
        Some(Packet::event(self.path.clone(), correlation_id, args.to_string()))
    }

    // ---- inbound handling ----

    pub(crate) fn handle_connect(&mut self, dispatcher: &Dispatcher) {
        if self.state == ChannelState::Connected {
            return;
        }
        debug!(path = %self.path, "channel connected");
        self.state = ChannelState::Connected;
        self.events.emit(EVENT_CONNECT, None, dispatcher);
    }

    pub(crate) fn handle_connect_error(&mut self, payload: Option<String>, dispatcher: &Dispatcher) {
        warn!(path = %self.path, payload = payload.as_deref(), "channel rejected");
        self.state = ChannelState::Rejected;
        self.events.emit(EVENT_CONNECT_ERROR, payload, dispatcher);
    }

    /// Dispatch an inbound Event payload: a JSON array whose first element
    /// is the event name. Malformed payloads are dropped, not fatal.
    pub(crate) fn handle_event(&mut self, payload: Option<&str>, dispatcher: &Dispatcher) {
        let Some(raw) = payload else {
            return;
        };
        let args: Vec<Value> = match serde_json::from_str(raw) {
            Ok(args) => args,
            Err(err) => {
                debug!(path = %self.path, %err, "dropping malformed event payload");
                return;
            }
        };

        let Some(Value::String(event)) = args.first() else {
            trace!(path = %self.path, "event payload without a name");
            return;
        };
        let data = args.get(1).and_then(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        self.events.emit(event, data, dispatcher);
    }

    pub(crate) fn handle_ack(
        &mut self,
        id: i64,
        payload: AckPayload,
        dispatcher: &Dispatcher,
    ) -> bool {
        self.acks.resolve(id, payload, dispatcher)
    }

    /// Route a completed binary reassembly. BinaryEvents dispatch their
    /// first attachment to binary handlers; BinaryAcks resolve the pending
    /// correlation like a plain Ack.
    pub(crate) fn handle_binary(&mut self, message: &BinaryMessage, dispatcher: &Dispatcher) {
        match message.kind {
            PacketKind::BinaryEvent => {
                let Some(event) = message.event.as_deref() else {
                    trace!(path = %self.path, "binary event without a name");
                    return;
                };
                let Some(bytes) = message.args.iter().find_map(ArgValue::as_binary) else {
                    trace!(path = %self.path, event, "binary event without attachments");
                    return;
                };
                self.events.emit_binary(event, bytes.clone(), dispatcher);
            }
            PacketKind::BinaryAck => {
                let Some(id) = message.correlation_id else {
                    trace!(path = %self.path, "binary ack without correlation id");
                    return;
                };
                self.acks
                    .resolve(id, AckPayload::Binary(message.args.clone()), dispatcher);
            }
            _ => {}
        }
    }

    /// Local or remote disconnect: an outstanding request must not fire
    /// after its channel is gone.
    pub(crate) fn handle_disconnect(&mut self) {
        self.state = ChannelState::Disconnected;
        self.acks.purge_all();
    }

    /// Periodic upkeep: drop expired acknowledgements.
    pub(crate) fn tick(&mut self, now: Instant) {
        self.acks.sweep_expired(now);
    }
}
