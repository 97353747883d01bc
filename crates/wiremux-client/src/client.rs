//! The client façade.
//!
//! Composes the engine session, channel registry, binary reassembly,
//! acknowledgement tracking, and reconnection scheduling behind one
//! tick-driven surface. This is the only place that knows how to tear a
//! session down and build a fresh one: every reconnect attempt starts from
//! an empty session and re-joins channels from scratch, so stale state
//! cannot leak across connection generations. The reconnect scheduler is
//! the one component whose identity survives those generations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use wiremux_engine::{EngineSession, SessionEvent, SessionState, TransportFactory};
use wiremux_packet::{BinaryAssembler, Packet, PacketKind, DEFAULT_CHANNEL};

use crate::ack::{AckCallback, AckPayload};
use crate::channel::Channel;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::event::HandlerId;
use crate::reconnect::{ReconnectConfig, ReconnectScheduler, ReconnectStep};
use crate::registry::ChannelRegistry;

/// Ack expiry applied when the caller does not pick one.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct LifecycleHooks {
    connected: Vec<LifecycleHandler>,
    disconnected: Vec<LifecycleHandler>,
    error: Vec<ErrorHandler>,
}

impl LifecycleHooks {
    fn fire_connected(&self, dispatcher: &Dispatcher) {
        for handler in &self.connected {
            let handler = Arc::clone(handler);
            dispatcher.enqueue(move || handler());
        }
    }

    fn fire_disconnected(&self, dispatcher: &Dispatcher) {
        for handler in &self.disconnected {
            let handler = Arc::clone(handler);
            dispatcher.enqueue(move || handler());
        }
    }

    fn fire_error(&self, dispatcher: &Dispatcher, message: String) {
        for handler in &self.error {
            let handler = Arc::clone(handler);
            let message = message.clone();
            dispatcher.enqueue(move || handler(&message));
        }
    }
}

pub struct Client {
    factory: TransportFactory,
    engine: EngineSession,
    channels: ChannelRegistry,
    assembler: BinaryAssembler,
    reconnect: ReconnectScheduler,
    dispatcher: Dispatcher,
    hooks: LifecycleHooks,
    last_address: Option<String>,
    intentional_disconnect: bool,
}

impl Client {
    /// A client with the default reconnect behavior.
    pub fn new(factory: TransportFactory) -> Self {
        Self::with_config(factory, ReconnectConfig::default())
    }

    pub fn with_config(factory: TransportFactory, reconnect: ReconnectConfig) -> Self {
        let engine = EngineSession::new(factory());
        Self {
            factory,
            engine,
            channels: ChannelRegistry::new(),
            assembler: BinaryAssembler::new(),
            reconnect: ReconnectScheduler::new(reconnect),
            dispatcher: Dispatcher::new(),
            hooks: LifecycleHooks::default(),
            last_address: None,
            intentional_disconnect: false,
        }
    }

    // ---- lifecycle ----

    /// Open a connection to `address` (`http`/`https`/`ws`/`wss`).
    pub fn connect(&mut self, address: &str) -> Result<()> {
        info!(address, "connecting");
        self.last_address = Some(address.to_string());
        self.intentional_disconnect = false;
        if self.engine.state() != SessionState::Idle {
            self.rebuild_session();
        }
        self.engine.connect(address)?;
        Ok(())
    }

    /// Intentional disconnect: suppresses auto-reconnect, purges pending
    /// acknowledgements, and aborts in-flight binary reassembly.
    pub fn disconnect(&mut self) {
        debug!("intentional disconnect");
        self.intentional_disconnect = true;
        self.reconnect.stop();
        let was_open = self.engine.is_open();
        if self.engine.state() == SessionState::Open
            || self.engine.state() == SessionState::Connecting
        {
            self.engine.close();
        }
        // A session that never reached Open was never announced as
        // connected, so it must not be announced as disconnected either.
        if was_open {
            self.hooks.fire_disconnected(&self.dispatcher);
        }
        for channel in self.channels.values_mut() {
            channel.handle_disconnect();
        }
        self.assembler.abort();
    }

    /// Disconnect and stop all scheduling, delivering any final callbacks.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.dispatcher.drain();
    }

    /// Whether the transport session is open. Individual channels track
    /// their own connected state on top of this.
    pub fn is_connected(&self) -> bool {
        self.engine.is_open()
    }

    /// Run once per host tick: drains the transport, routes packets,
    /// expires acknowledgements, drives reconnection, and fires every
    /// queued application callback.
    pub fn tick(&mut self) {
        let now = Instant::now();

        let events = self.engine.tick(now);
        for event in events {
            self.handle_session_event(event, now);
        }

        for channel in self.channels.values_mut() {
            channel.tick(now);
        }

        match self.reconnect.tick(now) {
            ReconnectStep::Attempt(attempt) => self.attempt_reconnect(attempt),
            ReconnectStep::Exhausted => {
                self.hooks
                    .fire_error(&self.dispatcher, "reconnect attempts exhausted".to_string());
            }
            ReconnectStep::Idle => {}
        }

        self.dispatcher.drain();
    }

    // ---- hooks ----

    pub fn on_connected(&mut self, handler: impl Fn() + Send + Sync + 'static) {
        self.hooks.connected.push(Arc::new(handler));
    }

    pub fn on_disconnected(&mut self, handler: impl Fn() + Send + Sync + 'static) {
        self.hooks.disconnected.push(Arc::new(handler));
    }

    pub fn on_error(&mut self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.error.push(Arc::new(handler));
    }

    // ---- channels ----

    /// The channel at `path`, created on first request. A channel created
    /// while the session is already open joins immediately rather than
    /// waiting for the next reconnect. `auth` is honored only at creation.
    pub fn channel(&mut self, path: &str, auth: Option<Value>) -> &mut Channel {
        let is_new = !self.channels.contains(path);
        let session_open = self.engine.is_open();

        let channel = self.channels.get_or_create(path, auth);
        if is_new && path != DEFAULT_CHANNEL && session_open {
            if let Some(packet) = channel.connect_packet() {
                let text = wiremux_packet::encode(&packet);
                self.engine.send_message(&text);
            }
        }
        channel
    }

    /// Leave `path`: notify the peer and drop the channel's session state.
    /// The default channel cannot be left.
    pub fn leave(&mut self, path: &str) {
        if path == DEFAULT_CHANNEL {
            return;
        }
        let Some(channel) = self.channels.get_mut(path) else {
            return;
        };
        if channel.is_connected() {
            let text = wiremux_packet::encode(&Packet::disconnect(path));
            self.engine.send_message(&text);
        }
        channel.handle_disconnect();
    }

    // ---- default-channel conveniences ----

    pub fn on(
        &mut self,
        event: &str,
        handler: impl Fn(Option<&str>) + Send + Sync + 'static,
    ) -> HandlerId {
        self.channels.get_or_create(DEFAULT_CHANNEL, None).on(event, handler)
    }

    pub fn on_binary(
        &mut self,
        event: &str,
        handler: impl Fn(&Bytes) + Send + Sync + 'static,
    ) -> HandlerId {
        self.channels
            .get_or_create(DEFAULT_CHANNEL, None)
            .on_binary(event, handler)
    }

    pub fn off(&mut self, event: &str, id: HandlerId) -> bool {
        self.channels
            .get_mut(DEFAULT_CHANNEL)
            .map(|channel| channel.off(event, id))
            .unwrap_or(false)
    }

    /// Fire-and-forget emit on the default channel.
    pub fn emit(&mut self, event: &str, payload: Value) {
        self.emit_to(DEFAULT_CHANNEL, event, payload);
    }

    /// Correlated emit on the default channel.
    pub fn emit_with_ack(
        &mut self,
        event: &str,
        payload: Value,
        timeout: Duration,
        callback: impl FnOnce(AckPayload) + Send + 'static,
    ) {
        self.emit_inner(DEFAULT_CHANNEL, event, payload, Some(Box::new(callback)), timeout);
    }

    /// Fire-and-forget emit on any channel.
    pub fn emit_to(&mut self, path: &str, event: &str, payload: Value) {
        self.emit_inner(path, event, payload, None, DEFAULT_ACK_TIMEOUT);
    }

    /// Correlated emit on any channel.
    pub fn emit_to_with_ack(
        &mut self,
        path: &str,
        event: &str,
        payload: Value,
        timeout: Duration,
        callback: impl FnOnce(AckPayload) + Send + 'static,
    ) {
        self.emit_inner(path, event, payload, Some(Box::new(callback)), timeout);
    }

    fn emit_inner(
        &mut self,
        path: &str,
        event: &str,
        payload: Value,
        ack: Option<AckCallback>,
        timeout: Duration,
    ) {
        let now = Instant::now();
        let Some(channel) = self.channels.get_mut(path) else {
            warn!(path, "emit to unknown channel dropped");
            return;
        };
        if let Some(packet) = channel.emit(event, &payload, ack, timeout, now) {
            let text = wiremux_packet::encode(&packet);
            self.engine.send_message(&text);
        }
    }

    // ---- telemetry ----

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn pending_ack_count(&self) -> usize {
        self.channels
            .get(DEFAULT_CHANNEL)
            .map(Channel::pending_ack_count)
            .unwrap_or(0)
    }

    pub fn ping_rtt(&self) -> Option<Duration> {
        self.engine.ping_rtt()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.engine.session_id()
    }

    // ---- internals ----

    fn handle_session_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Opened(handshake) => {
                debug!(sid = %handshake.sid, "session open, joining default channel");
                // The transport-level attempt succeeded, so scheduling
                // stops; the counter only zeroes once the default channel
                // confirms. If this session dies before that, the next
                // start continues the backoff where it left off.
                self.reconnect.stop();
                let packet = self
                    .channels
                    .get_mut(DEFAULT_CHANNEL)
                    .and_then(Channel::connect_packet);
                if let Some(packet) = packet {
                    let text = wiremux_packet::encode(&packet);
                    self.engine.send_message(&text);
                }
            }
            SessionEvent::Message(raw) => match wiremux_packet::decode(&raw) {
                Ok(packet) => self.handle_packet(packet),
                Err(err) => {
                    // Malformed packets are contained: reported, dropped,
                    // never fatal to the session.
                    warn!(%err, "dropping malformed packet");
                    self.hooks
                        .fire_error(&self.dispatcher, format!("packet parse error: {err}"));
                }
            },
            SessionEvent::Binary(data) => self.handle_attachment(data),
            SessionEvent::Error(message) => {
                self.hooks.fire_error(&self.dispatcher, message);
            }
            SessionEvent::Closed => self.handle_closed(now),
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        trace!(kind = ?packet.kind, channel = %packet.channel, "routing packet");
        let dispatcher = self.dispatcher.clone();

        match packet.kind {
            PacketKind::Connect => {
                self.channels.route_mut(&packet.channel).handle_connect(&dispatcher);
                if packet.channel == DEFAULT_CHANNEL {
                    // The session round-trip is confirmed; the backoff
                    // counter starts over and late-created channels join.
                    self.reconnect.reset();
                    self.hooks.fire_connected(&dispatcher);

                    let mut joins = Vec::new();
                    for channel in self.channels.values_mut() {
                        if channel.path() != DEFAULT_CHANNEL {
                            if let Some(packet) = channel.connect_packet() {
                                joins.push(wiremux_packet::encode(&packet));
                            }
                        }
                    }
                    for text in joins {
                        self.engine.send_message(&text);
                    }
                }
            }
            PacketKind::ConnectError => {
                self.channels
                    .route_mut(&packet.channel)
                    .handle_connect_error(packet.payload, &dispatcher);
            }
            PacketKind::Event => {
                self.channels
                    .route_mut(&packet.channel)
                    .handle_event(packet.payload.as_deref(), &dispatcher);
            }
            PacketKind::Ack => {
                let Some(id) = packet.correlation_id else {
                    debug!(channel = %packet.channel, "ack without correlation id");
                    return;
                };
                self.channels.route_mut(&packet.channel).handle_ack(
                    id,
                    AckPayload::Text(packet.payload),
                    &dispatcher,
                );
            }
            PacketKind::Disconnect => {
                self.channels.route_mut(&packet.channel).handle_disconnect();
            }
            PacketKind::BinaryEvent | PacketKind::BinaryAck => {
                // No overlapping reassemblies: a new header preempts.
                if self.assembler.is_waiting() {
                    warn!("binary header while reassembly incomplete, aborting previous");
                    self.assembler.abort();
                }
                self.assembler.begin(&packet);
            }
        }
    }

    fn handle_attachment(&mut self, data: Bytes) {
        if !self.assembler.is_waiting() {
            trace!(len = data.len(), "stray binary frame dropped");
            return;
        }
        if self.assembler.add(data) {
            if let Some(message) = self.assembler.build() {
                let dispatcher = self.dispatcher.clone();
                self.channels
                    .route_mut(&message.channel)
                    .handle_binary(&message, &dispatcher);
            }
        }
    }

    fn handle_closed(&mut self, now: Instant) {
        debug!("session closed");
        self.hooks.fire_disconnected(&self.dispatcher);
        for channel in self.channels.values_mut() {
            channel.handle_disconnect();
        }
        self.assembler.abort();

        if !self.intentional_disconnect && !self.reconnect.is_running() {
            self.reconnect.start(now);
        }
    }

    fn attempt_reconnect(&mut self, attempt: u32) {
        let Some(address) = self.last_address.clone() else {
            self.reconnect.stop();
            return;
        };
        info!(attempt, "reconnecting");
        self.rebuild_session();
        if let Err(err) = self.engine.connect(&address) {
            warn!(%err, "reconnect attempt failed to open transport");
            self.hooks.fire_error(&self.dispatcher, err.to_string());
        }
    }

    /// Replace the session with a fresh one from the factory. The old
    /// transport may own threads or sockets, so it is closed, never just
    /// dropped. Channels persist (with their handler tables); their
    /// connection state was already reset when the old session closed.
    fn rebuild_session(&mut self) {
        self.engine.close();
        self.engine = EngineSession::new((self.factory)());
        self.assembler.abort();
    }
}
